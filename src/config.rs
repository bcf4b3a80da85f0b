//! Engine configuration
//!
//! All thresholds have defaults matching the device's tuned values and can be
//! overridden through `TAPFLOW_*` environment variables.

use std::time::Duration;

/// Minimum press duration before a pointer becomes a hold
pub const MIN_HOLD_TIME: Duration = Duration::from_millis(200);

/// Minimum separation between two emitted gesture-start events
pub const MIN_GESTURE_SEPARATION: Duration = Duration::from_millis(500);

/// Longest press still counted as a single-finger tap
pub const TAP_TIMEOUT: Duration = Duration::from_millis(180);

/// Window after a tap in which a second tap collapses into a double tap
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);

/// Longest second-finger contact still counted as a two-finger tap
pub const TWO_FINGER_TAP_MAX: Duration = Duration::from_millis(200);

const DEFAULT_SYSTEM_PROMPT: &str = "You are a hands-free voice assistant. \
Answer in one or two short spoken sentences. Use the available tools when the \
user asks for something they can do.";

/// Timing thresholds for gesture classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub min_hold_time: Duration,
    pub min_gesture_separation: Duration,
    pub tap_timeout: Duration,
    /// Zero disables double-tap detection; single taps are then emitted on release
    pub double_tap_window: Duration,
    pub two_finger_tap_max: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_hold_time: MIN_HOLD_TIME,
            min_gesture_separation: MIN_GESTURE_SEPARATION,
            tap_timeout: TAP_TIMEOUT,
            double_tap_window: DOUBLE_TAP_WINDOW,
            two_finger_tap_max: TWO_FINGER_TAP_MAX,
        }
    }
}

/// Settings passed to the language model on every round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationConfig {
    pub system_prompt: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub gesture: GestureConfig,
    pub conversation: ConversationConfig,
    /// Capacity of the flow event channel
    pub event_buffer: usize,
    /// Capacity of the notification broadcast channel
    pub notify_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gesture: GestureConfig::default(),
            conversation: ConversationConfig::default(),
            event_buffer: 32,
            notify_buffer: 128,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };
        let count = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };

        let gesture = GestureConfig {
            min_hold_time: millis("TAPFLOW_MIN_HOLD_MS", defaults.gesture.min_hold_time),
            min_gesture_separation: millis(
                "TAPFLOW_MIN_GESTURE_SEPARATION_MS",
                defaults.gesture.min_gesture_separation,
            ),
            tap_timeout: millis("TAPFLOW_TAP_TIMEOUT_MS", defaults.gesture.tap_timeout),
            double_tap_window: millis(
                "TAPFLOW_DOUBLE_TAP_WINDOW_MS",
                defaults.gesture.double_tap_window,
            ),
            two_finger_tap_max: millis(
                "TAPFLOW_TWO_FINGER_TAP_MAX_MS",
                defaults.gesture.two_finger_tap_max,
            ),
        };

        let conversation = ConversationConfig {
            system_prompt: lookup("TAPFLOW_SYSTEM_PROMPT")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.conversation.system_prompt),
        };

        Self {
            gesture,
            conversation,
            event_buffer: count("TAPFLOW_EVENT_BUFFER", defaults.event_buffer),
            notify_buffer: count("TAPFLOW_NOTIFY_BUFFER", defaults.notify_buffer),
        }
    }
}

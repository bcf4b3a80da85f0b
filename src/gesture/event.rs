//! Gesture and pointer event types

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Semantic gesture classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    SingleTap,
    DoubleTap,
    HoldStart,
    HoldEnd,
    FingerDown,
    GestureCancel,
}

impl GestureKind {
    /// Gesture-start events are subject to debounce
    pub fn is_gesture_start(self) -> bool {
        matches!(self, Self::SingleTap | Self::DoubleTap | Self::HoldStart)
    }
}

/// A classified gesture, produced once and consumed once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub finger_count: u32,
    pub duration_ms: u64,
    /// When the gesture was recognized
    pub at: Instant,
}

impl GestureEvent {
    pub fn new(kind: GestureKind, finger_count: u32, at: Instant) -> Self {
        Self {
            kind,
            finger_count: finger_count.max(1),
            duration_ms: 0,
            at,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Raw pointer action reported by the touch surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerAction {
    Down,
    Move,
    Up,
    /// The platform aborted the whole touch sequence
    Cancel,
}

/// One raw pointer sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub pointer_id: u32,
    pub at: Instant,
}

impl PointerEvent {
    pub fn down(pointer_id: u32, at: Instant) -> Self {
        Self {
            action: PointerAction::Down,
            pointer_id,
            at,
        }
    }

    pub fn up(pointer_id: u32, at: Instant) -> Self {
        Self {
            action: PointerAction::Up,
            pointer_id,
            at,
        }
    }

    pub fn moved(pointer_id: u32, at: Instant) -> Self {
        Self {
            action: PointerAction::Move,
            pointer_id,
            at,
        }
    }

    pub fn cancel(at: Instant) -> Self {
        Self {
            action: PointerAction::Cancel,
            pointer_id: 0,
            at,
        }
    }
}

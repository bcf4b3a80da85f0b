//! Gesture classification state machine
//!
//! Pure with respect to time: every input carries its own timestamp and timers
//! are deadlines fired by [`GestureRecognizer::on_tick`]. Malformed input (an up
//! for an untracked pointer, a duplicate down) is ignored.

use super::event::{GestureEvent, GestureKind, PointerAction, PointerEvent};
use super::tap::{TapDetector, TapOutcome};
use crate::config::GestureConfig;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct HoldTimer {
    fires_at: Instant,
    finger_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    started_at: Instant,
    finger_count: u32,
}

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: GestureConfig,
    active_pointers: BTreeSet<u32>,
    /// Start of the current hold candidate
    sequence_start: Option<Instant>,
    second_down_at: Option<Instant>,
    hold_timer: Option<HoldTimer>,
    holding: Option<Hold>,
    /// The current touch sequence already produced its gesture
    resolved: bool,
    last_gesture_start: Option<Instant>,
    tap: TapDetector,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active_pointers: BTreeSet::new(),
            sequence_start: None,
            second_down_at: None,
            hold_timer: None,
            holding: None,
            resolved: false,
            last_gesture_start: None,
            tap: TapDetector::new(config.tap_timeout, config.double_tap_window),
        }
    }

    pub fn is_holding(&self) -> bool {
        self.holding.is_some()
    }

    pub fn active_pointer_count(&self) -> usize {
        self.active_pointers.len()
    }

    /// Earliest pending timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        let hold = self.hold_timer.map(|t| t.fires_at);
        match (hold, self.tap.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Feed one pointer sample. Timers that expired before the sample are fired first.
    pub fn on_pointer(&mut self, event: PointerEvent) -> Vec<GestureEvent> {
        let mut out = self.on_tick(event.at);
        let at = event.at;

        match event.action {
            PointerAction::Down => {
                if !self.active_pointers.insert(event.pointer_id) {
                    tracing::trace!(pointer = event.pointer_id, "Duplicate pointer down ignored");
                    return out;
                }
                match self.active_pointers.len() {
                    1 => self.begin_sequence(at, &mut out),
                    2 => self.second_pointer_down(at),
                    _ => {}
                }
            }
            PointerAction::Up => {
                let before = self.active_pointers.len();
                if !self.active_pointers.remove(&event.pointer_id) {
                    tracing::trace!(pointer = event.pointer_id, "Up for untracked pointer ignored");
                    return out;
                }
                match (before, self.active_pointers.len()) {
                    (1, 0) => self.last_pointer_up(at, &mut out),
                    (2, 1) => self.two_to_one(at, &mut out),
                    _ => {}
                }
            }
            PointerAction::Move => {}
            PointerAction::Cancel => self.abort_sequence(at, &mut out),
        }

        out
    }

    /// Fire every timer due at or before `now`, earliest first
    pub fn on_tick(&mut self, now: Instant) -> Vec<GestureEvent> {
        let mut out = Vec::new();
        loop {
            let hold_due = self.hold_timer.filter(|t| t.fires_at <= now);
            let tap_due = self.tap.next_deadline().filter(|d| *d <= now);
            match (hold_due, tap_due) {
                (Some(timer), Some(tap_at)) if tap_at < timer.fires_at => {
                    self.confirm_tap(now, &mut out);
                }
                (Some(timer), _) => {
                    self.hold_timer = None;
                    self.fire_hold(timer, &mut out);
                }
                (None, Some(_)) => self.confirm_tap(now, &mut out),
                (None, None) => break,
            }
        }
        out
    }

    fn begin_sequence(&mut self, at: Instant, out: &mut Vec<GestureEvent>) {
        self.sequence_start = Some(at);
        self.second_down_at = None;
        self.resolved = false;

        let tap = self.tap.on_down(at);
        if let Some(TapOutcome::SingleTap { at: confirmed_at }) = tap {
            self.emit_tap(GestureKind::SingleTap, 1, confirmed_at, out);
        }

        out.push(GestureEvent::new(GestureKind::FingerDown, 1, at));

        if let Some(TapOutcome::DoubleTap { at }) = tap {
            self.emit_tap(GestureKind::DoubleTap, 1, at, out);
            self.resolved = true;
            return;
        }

        self.hold_timer = Some(HoldTimer {
            fires_at: at + self.config.min_hold_time,
            finger_count: 1,
        });
    }

    fn second_pointer_down(&mut self, at: Instant) {
        self.hold_timer = None;
        self.tap.abort_press();
        self.second_down_at = Some(at);
        if self.holding.is_none() && !self.resolved {
            self.hold_timer = Some(HoldTimer {
                fires_at: at + self.config.min_hold_time,
                finger_count: 2,
            });
        }
    }

    fn last_pointer_up(&mut self, at: Instant, out: &mut Vec<GestureEvent>) {
        self.hold_timer = None;
        let was_multi_finger = self.second_down_at.take().is_some();

        if let Some(hold) = self.holding.take() {
            out.push(hold_end(hold, at));
        } else if !self.resolved {
            let outcome = if was_multi_finger {
                self.tap.abort_press();
                TapOutcome::NotATap
            } else {
                self.tap.on_up(at)
            };
            match outcome {
                TapOutcome::Pending => {}
                TapOutcome::SingleTap { at } => {
                    self.emit_tap(GestureKind::SingleTap, 1, at, out);
                }
                TapOutcome::DoubleTap { at } => {
                    self.emit_tap(GestureKind::DoubleTap, 1, at, out);
                }
                TapOutcome::NotATap => {
                    out.push(GestureEvent::new(GestureKind::GestureCancel, 1, at));
                }
            }
        } else {
            // A double tap's second press ends here
            self.tap.on_up(at);
        }

        self.sequence_start = None;
        self.resolved = true;
    }

    fn two_to_one(&mut self, at: Instant, out: &mut Vec<GestureEvent>) {
        self.hold_timer = None;

        if let Some(hold) = self.holding.take() {
            out.push(hold_end(hold, at));
        } else if !self.resolved {
            let within_tap = self
                .second_down_at
                .is_some_and(|down| at.saturating_duration_since(down) < self.config.two_finger_tap_max);
            if within_tap {
                self.emit_tap(GestureKind::SingleTap, 2, at, out);
            } else {
                out.push(GestureEvent::new(GestureKind::GestureCancel, 2, at));
            }
        }

        self.resolved = true;
    }

    fn abort_sequence(&mut self, at: Instant, out: &mut Vec<GestureEvent>) {
        let had_pointers = !self.active_pointers.is_empty();
        self.active_pointers.clear();
        self.hold_timer = None;
        self.second_down_at = None;
        self.sequence_start = None;
        self.tap.abort_press();

        if let Some(hold) = self.holding.take() {
            out.push(hold_end(hold, at));
        } else if had_pointers && !self.resolved {
            out.push(GestureEvent::new(GestureKind::GestureCancel, 1, at));
        }
        self.resolved = true;
    }

    fn fire_hold(&mut self, timer: HoldTimer, out: &mut Vec<GestureEvent>) {
        let count_matches = u32::try_from(self.active_pointers.len())
            .is_ok_and(|n| n == timer.finger_count);
        if !count_matches || self.holding.is_some() || self.resolved {
            return;
        }

        let started_at = if timer.finger_count == 1 {
            self.sequence_start
        } else {
            self.second_down_at
        }
        .unwrap_or(timer.fires_at);

        if self.emit_start(GestureKind::HoldStart, timer.finger_count, timer.fires_at, out) {
            self.holding = Some(Hold {
                started_at,
                finger_count: timer.finger_count,
            });
        } else {
            // Swallow the rest of the sequence so no orphan HoldEnd follows
            self.resolved = true;
        }
    }

    fn confirm_tap(&mut self, now: Instant, out: &mut Vec<GestureEvent>) {
        if let Some(TapOutcome::SingleTap { at }) = self.tap.on_tick(now) {
            self.emit_tap(GestureKind::SingleTap, 1, at, out);
        }
    }

    /// A debounced tap still ends its sequence, as a cancel
    fn emit_tap(&mut self, kind: GestureKind, finger_count: u32, at: Instant, out: &mut Vec<GestureEvent>) {
        if !self.emit_start(kind, finger_count, at, out) {
            out.push(GestureEvent::new(GestureKind::GestureCancel, finger_count, at));
        }
    }

    /// Emit a gesture-start event unless it falls inside the debounce window
    fn emit_start(
        &mut self,
        kind: GestureKind,
        finger_count: u32,
        at: Instant,
        out: &mut Vec<GestureEvent>,
    ) -> bool {
        if let Some(last) = self.last_gesture_start {
            let since = at.saturating_duration_since(last);
            if since < self.config.min_gesture_separation {
                tracing::debug!(
                    ?kind,
                    since_ms = millis(since),
                    "Gesture suppressed by debounce"
                );
                return false;
            }
        }
        self.last_gesture_start = Some(at);
        tracing::debug!(?kind, finger_count, "Gesture recognized");
        out.push(GestureEvent::new(kind, finger_count, at));
        true
    }
}

fn hold_end(hold: Hold, at: Instant) -> GestureEvent {
    let duration = at.saturating_duration_since(hold.started_at);
    GestureEvent::new(GestureKind::HoldEnd, hold.finger_count, at).with_duration_ms(millis(duration))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

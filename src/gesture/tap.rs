//! Single-finger tap and double-tap detection
//!
//! Fed only while exactly one pointer is involved in a touch sequence. A short
//! press becomes a pending tap; it is confirmed as a single tap once the
//! double-tap window passes, or collapses into a double tap if a second press
//! lands inside the window.

use std::time::Duration;
use tokio::time::Instant;

/// What the detector concluded from an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Short press recorded, waiting for the double-tap window to close
    Pending,
    SingleTap { at: Instant },
    DoubleTap { at: Instant },
    /// The press was too long to be a tap
    NotATap,
}

#[derive(Debug, Clone)]
pub struct TapDetector {
    tap_timeout: Duration,
    double_tap_window: Duration,
    /// Release time of a tap awaiting confirmation
    pending_up: Option<Instant>,
    press_started: Option<Instant>,
    /// The current press already produced a double tap
    press_consumed: bool,
}

impl TapDetector {
    pub fn new(tap_timeout: Duration, double_tap_window: Duration) -> Self {
        Self {
            tap_timeout,
            double_tap_window,
            pending_up: None,
            press_started: None,
            press_consumed: false,
        }
    }

    /// Pointer went down. Returns a double tap, or a stale pending tap that must
    /// be flushed before the new press is considered.
    pub fn on_down(&mut self, at: Instant) -> Option<TapOutcome> {
        self.press_started = Some(at);
        self.press_consumed = false;

        let first_up = self.pending_up.take()?;
        if at.saturating_duration_since(first_up) <= self.double_tap_window {
            self.press_consumed = true;
            Some(TapOutcome::DoubleTap { at })
        } else {
            Some(TapOutcome::SingleTap {
                at: first_up + self.double_tap_window,
            })
        }
    }

    /// Pointer went up
    pub fn on_up(&mut self, at: Instant) -> TapOutcome {
        let Some(started) = self.press_started.take() else {
            return TapOutcome::NotATap;
        };
        if std::mem::take(&mut self.press_consumed) {
            return TapOutcome::Pending;
        }
        if at.saturating_duration_since(started) >= self.tap_timeout {
            return TapOutcome::NotATap;
        }
        if self.double_tap_window.is_zero() {
            TapOutcome::SingleTap { at }
        } else {
            self.pending_up = Some(at);
            TapOutcome::Pending
        }
    }

    /// Confirm a pending tap whose window has closed
    pub fn on_tick(&mut self, now: Instant) -> Option<TapOutcome> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        self.pending_up = None;
        Some(TapOutcome::SingleTap { at: deadline })
    }

    /// Forget the current press, e.g. when a second finger joins
    pub fn abort_press(&mut self) {
        self.press_started = None;
        self.press_consumed = false;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_up.map(|up| up + self.double_tap_window)
    }
}

//! Gesture recognition
//!
//! Turns raw pointer events into discrete gestures. The recognizer itself is a
//! synchronous state machine driven by pointer events and clock ticks;
//! [`GestureSession`] runs it on a task and owns its timers.

mod event;
mod recognizer;
mod session;
mod tap;

#[cfg(test)]
mod proptests;

pub use event::{GestureEvent, GestureKind, PointerAction, PointerEvent};
pub use recognizer::GestureRecognizer;
pub use session::{GestureSession, GestureStream};
pub use tap::{TapDetector, TapOutcome};

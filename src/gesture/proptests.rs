//! Property-based tests for gesture recognition
//!
//! Random pointer scripts are replayed through the recognizer and the emitted
//! gesture stream is checked against the timing invariants.

use super::*;
use crate::config::GestureConfig;
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Step {
    Down(u32),
    Up(u32),
    Move(u32),
    Wait(u64),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u32..3).prop_map(Step::Down),
        (0u32..3).prop_map(Step::Up),
        (0u32..3).prop_map(Step::Move),
        (0u64..700).prop_map(Step::Wait),
    ]
}

/// Replay a script, ticking at every wait so timers fire on time
fn replay(config: GestureConfig, steps: &[Step]) -> Vec<GestureEvent> {
    let t0 = Instant::now();
    let mut now = t0;
    let mut rec = GestureRecognizer::new(config);
    let mut out = Vec::new();

    for step in steps {
        match *step {
            Step::Down(id) => out.extend(rec.on_pointer(PointerEvent::down(id, now))),
            Step::Up(id) => out.extend(rec.on_pointer(PointerEvent::up(id, now))),
            Step::Move(id) => out.extend(rec.on_pointer(PointerEvent::moved(id, now))),
            Step::Wait(ms) => {
                let until = now + Duration::from_millis(ms);
                while let Some(deadline) = rec.next_deadline().filter(|d| *d <= until) {
                    out.extend(rec.on_tick(deadline));
                }
                now = until;
            }
        }
    }
    out.extend(rec.on_tick(now + Duration::from_secs(10)));
    out
}

proptest! {
    // Gesture starts are never closer than the separation window
    #[test]
    fn prop_gesture_starts_are_debounced(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let config = GestureConfig::default();
        let events = replay(config, &steps);
        let starts: Vec<Instant> = events
            .iter()
            .filter(|e| e.kind.is_gesture_start())
            .map(|e| e.at)
            .collect();
        for pair in starts.windows(2) {
            prop_assert!(
                pair[1].saturating_duration_since(pair[0]) >= config.min_gesture_separation,
                "gesture starts too close: {:?}", events
            );
        }
    }

    // A short single-finger press never becomes a hold
    #[test]
    fn prop_short_press_never_holds(press_ms in 0u64..200) {
        let events = replay(
            GestureConfig::default(),
            &[Step::Down(0), Step::Wait(press_ms), Step::Up(0)],
        );
        prop_assert!(events.iter().all(|e| e.kind != GestureKind::HoldStart));
    }

    // A long single-finger press holds exactly once
    #[test]
    fn prop_long_press_holds_once(press_ms in 200u64..3000) {
        let events = replay(
            GestureConfig::default(),
            &[Step::Down(0), Step::Wait(press_ms)],
        );
        let holds = events.iter().filter(|e| e.kind == GestureKind::HoldStart).count();
        prop_assert_eq!(holds, 1);
    }

    // Every announced hold is eventually ended, and never ended twice
    #[test]
    fn prop_holds_are_balanced(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let mut steps = steps;
        // Lift every finger at the end
        steps.extend([Step::Up(0), Step::Up(1), Step::Up(2)]);
        let events = replay(GestureConfig::default(), &steps);

        let mut open = false;
        for event in &events {
            match event.kind {
                GestureKind::HoldStart => {
                    prop_assert!(!open, "nested hold: {:?}", events);
                    open = true;
                }
                GestureKind::HoldEnd => {
                    prop_assert!(open, "orphan hold end: {:?}", events);
                    open = false;
                }
                _ => {}
            }
            prop_assert!(event.finger_count >= 1);
        }
        prop_assert!(!open, "hold never ended: {:?}", events);
    }
}

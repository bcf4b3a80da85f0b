//! Property-based tests for the flow state machine
//!
//! Random event sequences are driven through [`transition`] by a small model
//! of the runtime: follow-up events are queued the way the executor queues
//! them, and capability events from retired turns are dropped.

use super::*;
use crate::gesture::{GestureEvent, GestureKind};
use crate::llm::LlmError;
use proptest::prelude::*;
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Input {
    Gesture(GestureKind),
    StartListening,
    StartFromText(String),
    Cancel,
    SttPartial { stale: bool },
    SttFinal { stale: bool, text: String },
    SttError { stale: bool },
    Token { stale: bool },
    Complete { stale: bool },
    LlmFailure { stale: bool },
}

fn arb_gesture_kind() -> impl Strategy<Value = GestureKind> {
    prop_oneof![
        Just(GestureKind::SingleTap),
        Just(GestureKind::DoubleTap),
        Just(GestureKind::HoldStart),
        Just(GestureKind::HoldEnd),
        Just(GestureKind::FingerDown),
        Just(GestureKind::GestureCancel),
    ]
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        arb_gesture_kind().prop_map(Input::Gesture),
        Just(Input::StartListening),
        "[a-z ]{0,12}".prop_map(Input::StartFromText),
        Just(Input::Cancel),
        any::<bool>().prop_map(|stale| Input::SttPartial { stale }),
        (any::<bool>(), "[a-z ]{0,12}").prop_map(|(stale, text)| Input::SttFinal { stale, text }),
        any::<bool>().prop_map(|stale| Input::SttError { stale }),
        any::<bool>().prop_map(|stale| Input::Token { stale }),
        any::<bool>().prop_map(|stale| Input::Complete { stale }),
        any::<bool>().prop_map(|stale| Input::LlmFailure { stale }),
    ]
}

/// Minimal stand-in for the executor's bookkeeping
struct Driver {
    state: FlowState,
    next_turn: u64,
    active_turn: Option<TurnId>,
    turns_begun: u64,
    follow_ups: VecDeque<FlowEvent>,
}

impl Driver {
    fn new() -> Self {
        Self {
            state: FlowState::Idle,
            next_turn: 0,
            active_turn: None,
            turns_begun: 0,
            follow_ups: VecDeque::new(),
        }
    }

    fn stamp(&self, stale: bool) -> TurnId {
        match (stale, self.active_turn) {
            (false, Some(turn)) => turn,
            _ => TurnId(u64::MAX),
        }
    }

    fn event_for(&self, input: Input) -> FlowEvent {
        match input {
            Input::Gesture(kind) => FlowEvent::Gesture(GestureEvent::new(kind, 1, Instant::now())),
            Input::StartListening => FlowEvent::StartListening,
            Input::StartFromText(text) => FlowEvent::StartFromText { text },
            Input::Cancel => FlowEvent::Cancel,
            Input::SttPartial { stale } => FlowEvent::SttPartial {
                turn: self.stamp(stale),
                text: "par".into(),
            },
            Input::SttFinal { stale, text } => FlowEvent::SttFinal {
                turn: self.stamp(stale),
                text,
            },
            Input::SttError { stale } => FlowEvent::SttError {
                turn: self.stamp(stale),
                message: "mic".into(),
            },
            Input::Token { stale } => FlowEvent::ResponsePartial {
                turn: self.stamp(stale),
                token: "tok".into(),
            },
            Input::Complete { stale } => FlowEvent::ResponseComplete {
                turn: self.stamp(stale),
                text: "done".into(),
            },
            Input::LlmFailure { stale } => FlowEvent::LlmError {
                turn: self.stamp(stale),
                error: LlmError::network("reset"),
            },
        }
    }

    /// Apply one event and its follow-ups; returns violations found
    fn apply(&mut self, event: FlowEvent) -> Result<(), String> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            if let Some(turn) = event.turn() {
                if Some(turn) != self.active_turn {
                    continue;
                }
            }

            let before = self.state;
            let Ok(result) = transition(before, event) else {
                continue;
            };

            for effect in &result.effects {
                match effect {
                    FlowEffect::BeginTurn => {
                        if before != FlowState::Idle {
                            return Err(format!("turn begun from {before}"));
                        }
                        if self.active_turn.is_some() {
                            return Err("second turn while one is active".into());
                        }
                        self.next_turn += 1;
                        self.turns_begun += 1;
                        self.active_turn = Some(TurnId(self.next_turn));
                    }
                    FlowEffect::InjectTranscript { text } => {
                        if let Some(turn) = self.active_turn {
                            self.follow_ups.push_back(FlowEvent::SttFinal {
                                turn,
                                text: text.clone(),
                            });
                        }
                    }
                    FlowEffect::CompleteCancellation => {
                        self.follow_ups.push_back(FlowEvent::CancellationComplete);
                    }
                    _ => {}
                }
            }

            self.state = result.new_state;
            if matches!(self.state, FlowState::Idle | FlowState::Cancelling) {
                self.active_turn = None;
            }
            queue.extend(self.follow_ups.drain(..));
        }
        Ok(())
    }
}

proptest! {
    // At most one logical turn is ever active
    #[test]
    fn prop_at_most_one_turn(inputs in proptest::collection::vec(arb_input(), 0..60)) {
        let mut driver = Driver::new();
        for input in inputs {
            let event = driver.event_for(input);
            if let Err(violation) = driver.apply(event) {
                prop_assert!(false, "{}", violation);
            }
            // Teardown always completes within the same step
            prop_assert_ne!(driver.state, FlowState::Cancelling);
            prop_assert_eq!(driver.state.is_active(), driver.active_turn.is_some());
        }
    }

    // Rejected requests never change state
    #[test]
    fn prop_rejection_preserves_state(inputs in proptest::collection::vec(arb_input(), 0..40)) {
        let mut driver = Driver::new();
        for input in inputs {
            let event = driver.event_for(input);
            let before = driver.state;
            if event.turn().is_none() && transition(before, event.clone()).is_err() {
                let is_start = matches!(event, FlowEvent::StartListening | FlowEvent::StartFromText { .. });
                prop_assert!(is_start, "unexpected rejection of {:?}", event);
                prop_assert!(before.is_active());
            }
            driver.apply(event).map_err(TestCaseError::fail)?;
        }
    }

    // Any non-HoldEnd gesture or fatal error from an active state ends in Idle
    #[test]
    fn prop_interrupts_return_to_idle(
        setup in proptest::collection::vec(arb_input(), 0..20),
        interrupt in prop_oneof![
            arb_gesture_kind()
                .prop_filter("hold end finalizes", |k| *k != GestureKind::HoldEnd)
                .prop_map(Input::Gesture),
            Just(Input::Cancel),
            Just(Input::SttError { stale: false }),
            Just(Input::LlmFailure { stale: false }),
        ],
    ) {
        let mut driver = Driver::new();
        for input in setup {
            let event = driver.event_for(input);
            driver.apply(event).map_err(TestCaseError::fail)?;
        }
        let was_active = driver.state.is_active();
        let event = driver.event_for(interrupt.clone());
        driver.apply(event).map_err(TestCaseError::fail)?;

        // A hold start from idle legitimately begins a new turn
        let starts_turn = !was_active && matches!(interrupt, Input::Gesture(GestureKind::HoldStart));
        if !starts_turn {
            prop_assert_eq!(driver.state, FlowState::Idle);
        }
    }
}

#[test]
fn test_typed_turn_reaches_speaking() {
    let mut driver = Driver::new();
    driver
        .apply(FlowEvent::StartFromText {
            text: "hello".into(),
        })
        .unwrap();
    assert_eq!(driver.state, FlowState::Processing);

    let turn = driver.active_turn.unwrap();
    driver
        .apply(FlowEvent::ResponsePartial {
            turn,
            token: "Hi".into(),
        })
        .unwrap();
    assert_eq!(driver.state, FlowState::Speaking);
    driver
        .apply(FlowEvent::ResponseComplete {
            turn,
            text: "Hi".into(),
        })
        .unwrap();
    assert_eq!(driver.state, FlowState::Idle);
    assert_eq!(driver.turns_begun, 1);
}

//! Pure state transition function

use super::{FlowEffect, FlowEvent, FlowNotification, FlowState};
use crate::error::ErrorKind;
use crate::gesture::GestureKind;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, PartialEq)]
pub struct TransitionResult {
    pub new_state: FlowState,
    pub effects: Vec<FlowEffect>,
}

impl TransitionResult {
    pub fn new(state: FlowState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: FlowEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = FlowEffect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Request rejected by the state machine. Never changes state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow is busy ({0}), cancel the current turn first")]
    Busy(FlowState),
    #[error("cancellation in progress")]
    CancellationInProgress,
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("flow engine stopped")]
    EngineStopped,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; every side
/// effect is described by the returned effects.
pub fn transition(state: FlowState, event: FlowEvent) -> Result<TransitionResult, FlowError> {
    use FlowState::{Cancelling, Idle, Listening, Processing, Speaking};

    match (state, event) {
        // ============================================================
        // Turn start
        // ============================================================
        (Idle, FlowEvent::StartListening) => Ok(begin_listening()),

        (Idle, FlowEvent::Gesture(g)) if g.kind == GestureKind::HoldStart => {
            Ok(begin_listening())
        }

        // Typed input skips capture but still passes through Listening
        (Idle, FlowEvent::StartFromText { text }) => Ok(TransitionResult::new(Listening)
            .with_effect(FlowEffect::BeginTurn)
            .with_effect(FlowEffect::notify(FlowNotification::ListeningStarted))
            .with_effect(FlowEffect::InjectTranscript { text })),

        // Other gestures and cancel have nothing to act on while idle
        (Idle, FlowEvent::Gesture(_) | FlowEvent::Cancel) => Ok(TransitionResult::new(Idle)),

        (
            Listening | Processing | Speaking,
            FlowEvent::StartListening | FlowEvent::StartFromText { .. },
        ) => Err(FlowError::Busy(state)),

        (Cancelling, FlowEvent::StartListening | FlowEvent::StartFromText { .. }) => {
            Err(FlowError::CancellationInProgress)
        }

        // ============================================================
        // Listening
        // ============================================================

        // Finger lifted: the state changes when STT delivers its final result
        (Listening, FlowEvent::Gesture(g)) if g.kind == GestureKind::HoldEnd => {
            Ok(TransitionResult::new(Listening).with_effect(FlowEffect::FinalizeStt))
        }

        (Listening, FlowEvent::SttPartial { text, .. }) => Ok(TransitionResult::new(Listening)
            .with_effect(FlowEffect::notify(FlowNotification::PartialTranscription { text }))),

        (Listening, FlowEvent::SttFinal { text, .. }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(Idle)
                .with_effect(FlowEffect::notify(FlowNotification::ListeningStopped)))
        }

        (Listening, FlowEvent::SttFinal { text, .. }) => Ok(TransitionResult::new(Processing)
            .with_effect(FlowEffect::notify(FlowNotification::ListeningStopped))
            .with_effect(FlowEffect::notify(FlowNotification::FinalTranscription {
                text: text.clone(),
            }))
            .with_effect(FlowEffect::notify(FlowNotification::ProcessingStarted))
            .with_effect(FlowEffect::RunTurn { text })),

        // ============================================================
        // Processing and speaking
        // ============================================================
        (Processing, FlowEvent::ResponsePartial { token, .. }) => {
            Ok(TransitionResult::new(Speaking)
                .with_effect(FlowEffect::notify(FlowNotification::ProcessingStopped))
                .with_effect(FlowEffect::notify(FlowNotification::SpeakingStarted))
                .with_effects(speak_token(token)))
        }

        (Speaking, FlowEvent::ResponsePartial { token, .. }) => {
            Ok(TransitionResult::new(Speaking).with_effects(speak_token(token)))
        }

        (Speaking, FlowEvent::ResponseComplete { text, .. }) => Ok(TransitionResult::new(Idle)
            .with_effect(FlowEffect::notify(FlowNotification::FinalResponse { text }))
            .with_effect(FlowEffect::notify(FlowNotification::SpeakingStopped))),

        // Nothing was streamed: speak the whole answer at once
        (Processing, FlowEvent::ResponseComplete { text, .. }) => {
            let mut result = TransitionResult::new(Idle)
                .with_effect(FlowEffect::notify(FlowNotification::ProcessingStopped));
            if !text.is_empty() {
                result = result
                    .with_effect(FlowEffect::notify(FlowNotification::SpeakingStarted))
                    .with_effect(FlowEffect::SpeakImmediately { text: text.clone() });
            }
            result = result.with_effect(FlowEffect::notify(FlowNotification::FinalResponse {
                text: text.clone(),
            }));
            if !text.is_empty() {
                result = result.with_effect(FlowEffect::notify(FlowNotification::SpeakingStopped));
            }
            Ok(result)
        }

        // Lifting the finger after capture ended changes nothing
        (Processing | Speaking, FlowEvent::Gesture(g)) if g.kind == GestureKind::HoldEnd => {
            Ok(TransitionResult::new(state))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (Listening | Processing | Speaking, FlowEvent::Gesture(_) | FlowEvent::Cancel) => {
            Ok(teardown(state, None))
        }

        (Listening | Processing | Speaking, FlowEvent::SttError { message, .. }) => {
            Ok(teardown(state, Some((ErrorKind::SpeechRecognition, message))))
        }

        (Listening | Processing | Speaking, FlowEvent::LlmError { error, .. }) => {
            Ok(teardown(state, Some((ErrorKind::LanguageModel, error.to_string()))))
        }

        (Cancelling, FlowEvent::CancellationComplete) => Ok(TransitionResult::new(Idle)),

        // Teardown is already under way
        (Cancelling, FlowEvent::Gesture(_) | FlowEvent::Cancel) => {
            Ok(TransitionResult::new(Cancelling))
        }

        // ============================================================
        // Anything else is a stale or misrouted event
        // ============================================================
        (state, event) => Err(FlowError::InvalidTransition(format!(
            "{} in {state}",
            event.name()
        ))),
    }
}

fn begin_listening() -> TransitionResult {
    TransitionResult::new(FlowState::Listening)
        .with_effect(FlowEffect::BeginTurn)
        .with_effect(FlowEffect::StartStt)
        .with_effect(FlowEffect::notify(FlowNotification::ListeningStarted))
}

fn speak_token(token: String) -> [FlowEffect; 2] {
    [
        FlowEffect::SpeakIncremental {
            token: token.clone(),
        },
        FlowEffect::notify(FlowNotification::PartialResponse { token }),
    ]
}

/// Stop whatever `state` has running, report the error if any, then finish
/// cancelling
fn teardown(state: FlowState, error: Option<(ErrorKind, String)>) -> TransitionResult {
    let stop = match state {
        FlowState::Listening => vec![
            FlowEffect::StopStt,
            FlowEffect::notify(FlowNotification::ListeningStopped),
        ],
        FlowState::Processing => vec![
            FlowEffect::AbortTurn,
            FlowEffect::notify(FlowNotification::ProcessingStopped),
        ],
        FlowState::Speaking => vec![
            FlowEffect::StopSpeaking,
            FlowEffect::AbortTurn,
            FlowEffect::notify(FlowNotification::SpeakingStopped),
        ],
        FlowState::Idle | FlowState::Cancelling => vec![],
    };

    TransitionResult::new(FlowState::Cancelling)
        .with_effects(stop)
        .with_effects(error.map(|(kind, message)| FlowEffect::error(kind, message)))
        .with_effect(FlowEffect::CompleteCancellation)
}

//! Effects produced by flow transitions

use super::FlowState;
use crate::error::ErrorKind;
use serde::Serialize;

/// Work the runtime performs before committing the new state
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEffect {
    /// Allocate a fresh turn id and cancellation scope
    BeginTurn,
    /// Start speech recognition for the current turn
    StartStt,
    /// User finished speaking; ask STT to deliver its final transcript
    FinalizeStt,
    /// Stop speech recognition, discarding anything it still delivers
    StopStt,
    /// Feed text as the current turn's final transcript
    InjectTranscript { text: String },
    /// Hand the transcript to the conversation
    RunTurn { text: String },
    /// Abandon the in-flight conversation turn
    AbortTurn,
    SpeakIncremental { token: String },
    SpeakImmediately { text: String },
    StopSpeaking,
    Notify(FlowNotification),
    /// Queue the event that finishes `Cancelling`
    CompleteCancellation,
}

impl FlowEffect {
    pub fn notify(notification: FlowNotification) -> Self {
        Self::Notify(notification)
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Notify(FlowNotification::Error {
            kind,
            message: message.into(),
        })
    }
}

/// Published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNotification {
    ListeningStarted,
    ListeningStopped,
    ProcessingStarted,
    ProcessingStopped,
    SpeakingStarted,
    SpeakingStopped,
    PartialTranscription { text: String },
    FinalTranscription { text: String },
    PartialResponse { token: String },
    FinalResponse { text: String },
    Error { kind: ErrorKind, message: String },
    StateChanged { from: FlowState, to: FlowState },
}

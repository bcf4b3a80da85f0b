//! Events that drive the flow state machine

use crate::gesture::GestureEvent;
use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical turn. Capability events carry the id of the turn
/// that produced them so events from a retired turn can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum FlowEvent {
    // Caller requests
    Gesture(GestureEvent),
    StartListening,
    StartFromText { text: String },
    Cancel,

    // Speech recognition
    SttPartial { turn: TurnId, text: String },
    SttFinal { turn: TurnId, text: String },
    SttError { turn: TurnId, message: String },

    // Conversation
    ResponsePartial { turn: TurnId, token: String },
    ResponseComplete { turn: TurnId, text: String },
    LlmError { turn: TurnId, error: LlmError },

    /// Generated by the runtime once teardown effects have run
    CancellationComplete,
}

impl FlowEvent {
    /// Turn that produced this event, for capability events
    pub fn turn(&self) -> Option<TurnId> {
        match self {
            Self::SttPartial { turn, .. }
            | Self::SttFinal { turn, .. }
            | Self::SttError { turn, .. }
            | Self::ResponsePartial { turn, .. }
            | Self::ResponseComplete { turn, .. }
            | Self::LlmError { turn, .. } => Some(*turn),
            Self::Gesture(_)
            | Self::StartListening
            | Self::StartFromText { .. }
            | Self::Cancel
            | Self::CancellationComplete => None,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gesture(_) => "gesture",
            Self::StartListening => "start_listening",
            Self::StartFromText { .. } => "start_from_text",
            Self::Cancel => "cancel",
            Self::SttPartial { .. } => "stt_partial",
            Self::SttFinal { .. } => "stt_final",
            Self::SttError { .. } => "stt_error",
            Self::ResponsePartial { .. } => "response_partial",
            Self::ResponseComplete { .. } => "response_complete",
            Self::LlmError { .. } => "llm_error",
            Self::CancellationComplete => "cancellation_complete",
        }
    }
}

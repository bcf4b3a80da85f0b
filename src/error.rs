//! Engine-wide error taxonomy

use crate::flow::FlowError;
use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification carried on every error surfaced to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Speech-to-text failure, fatal to the turn
    SpeechRecognition,
    /// Language model failure, fatal to the turn
    LanguageModel,
    /// Single tool call failure, recovered into a tool message
    ToolExecution,
    /// Invalid request against the flow state machine
    Flow,
}

impl ErrorKind {
    /// Whether this kind ends the current turn
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::SpeechRecognition | Self::LanguageModel)
    }
}

/// Errors surfaced to the embedding binary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("language model failed: {0}")]
    LanguageModel(#[from] LlmError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Kind used when reporting this error to subscribers; I/O is charged to the flow
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LanguageModel(_) => ErrorKind::LanguageModel,
            Self::Flow(_) | Self::Io(_) => ErrorKind::Flow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowState;

    #[test]
    fn test_only_speech_and_model_errors_are_fatal() {
        assert!(ErrorKind::SpeechRecognition.is_fatal());
        assert!(ErrorKind::LanguageModel.is_fatal());
        assert!(!ErrorKind::ToolExecution.is_fatal());
        assert!(!ErrorKind::Flow.is_fatal());
    }

    #[test]
    fn test_kind_is_preserved() {
        let err: EngineError = LlmError::network("connection reset").into();
        assert_eq!(err.kind(), ErrorKind::LanguageModel);

        let err: EngineError = FlowError::Busy(FlowState::Speaking).into();
        assert_eq!(err.kind(), ErrorKind::Flow);
        assert!(err.to_string().contains("speaking"));
    }
}

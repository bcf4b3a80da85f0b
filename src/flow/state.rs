//! Flow state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the device is in the current interaction. Cycles; never terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    /// Speech recognition is capturing the user's utterance
    Listening,
    /// The conversation is reasoning and running tools
    Processing,
    /// Response tokens are being spoken
    Speaking,
    /// Teardown of the current turn; always followed by `Idle`
    Cancelling,
}

impl FlowState {
    /// True in every state except `Idle`
    pub fn is_active(self) -> bool {
        self != Self::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Cancelling => "cancelling",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idle_is_inactive() {
        assert!(!FlowState::Idle.is_active());
        for state in [
            FlowState::Listening,
            FlowState::Processing,
            FlowState::Speaking,
            FlowState::Cancelling,
        ] {
            assert!(state.is_active(), "{state} should be active");
        }
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&FlowState::Speaking).unwrap();
        assert_eq!(json, "\"speaking\"");
        assert_eq!(FlowState::default(), FlowState::Idle);
    }
}

//! Conversation data model shared with the language model capability

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool invocation proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the assistant message that proposed it
    pub id: String,
    pub name: String,
    pub parameters_json: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: &Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters_json: parameters.to_string(),
        }
    }

    /// Parsed parameters; malformed JSON from the model becomes `Null`
    pub fn parameters(&self) -> Value {
        serde_json::from_str(&self.parameters_json).unwrap_or(Value::Null)
    }
}

/// Outcome of one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { text: String },
    Failure { message: String },
}

/// Result correlated to its call by id, produced exactly once per call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Success { text: text.into() },
        }
    }

    pub fn failure(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure { .. })
    }

    /// Text the model sees for this result
    pub fn model_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { text } => text.clone(),
            ToolOutcome::Failure { message } => format!("Error: {message}"),
        }
    }
}

/// One entry of the append-only dialogue history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
    pub timestamp: Instant,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: vec![],
            tool_call_id: None,
            timestamp: Instant::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            timestamp: Instant::now(),
        }
    }

    pub fn tool(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.model_text(),
            tool_calls: vec![],
            tool_call_id: Some(result.call_id.clone()),
            timestamp: Instant::now(),
        }
    }
}

/// Tool description offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the parameters
    pub parameters: Value,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// One round's request
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub history: Vec<ConversationMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Completed model response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: vec![],
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Receives streamed tokens in model order
#[derive(Debug, Clone)]
pub struct TokenSink {
    tx: mpsc::UnboundedSender<String>,
}

impl TokenSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Sink paired with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a partial token. Tokens for an abandoned turn are dropped silently.
    pub fn push(&self, token: impl Into<String>) {
        let _ = self.tx.send(token.into());
    }
}

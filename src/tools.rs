//! Tool execution capability and the built-in tool registry
//!
//! Tools are stateless singletons; per-call context arrives through
//! [`ToolContext`].

mod clock;
mod timer;

pub use clock::CurrentTimeTool;
pub use timer::{CreateTimerTool, TimerBoard, TimerEntry};

use crate::llm::{ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Per-call tool failure. Never fatal to a turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Executes tool calls proposed by the model
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one call. Long-running tools should stop when `cancel` fires.
    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> Result<String, ToolError>;

    /// Definitions offered to the model
    fn definitions(&self) -> Vec<ToolDefinition>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> Result<String, ToolError> {
        (**self).execute(call, cancel).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

/// Context for one tool invocation
#[derive(Clone)]
pub struct ToolContext {
    pub call_id: String,
}

/// A single tool the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// JSON schema for the parameters
    fn parameters(&self) -> Value;

    /// Example utterances that should trigger this tool
    fn examples(&self) -> Vec<String> {
        vec![]
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError>;
}

/// Collection of tools available to a conversation
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the built-in device tools
    pub fn standard(timers: TimerBoard) -> Self {
        Self::empty()
            .with_tool(CurrentTimeTool)
            .with_tool(CreateTimerTool::new(timers))
    }

    pub fn empty() -> Self {
        Self { tools: vec![] }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> Result<String, ToolError> {
        let tool = self
            .find(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        let input: Value = serde_json::from_str(&call.parameters_json)
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        tracing::info!(tool = %call.name, id = %call.id, "Executing tool");
        let ctx = ToolContext {
            call_id: call.id.clone(),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ToolError::Cancelled),
            result = tool.run(input, ctx) => result,
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                parameters: t.parameters(),
                examples: t.examples(),
            })
            .collect()
    }
}

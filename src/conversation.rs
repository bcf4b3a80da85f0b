//! Conversation and tool orchestration
//!
//! One [`Conversation`] per dialogue. A turn sends the history to the model,
//! fans tool calls out concurrently, fans their results back in on this task
//! only, and repeats until the model answers without tool calls. Messages of
//! a turn are staged and committed when the turn ends, so an abandoned turn
//! leaves the history untouched.

mod round;

pub use round::{PendingRound, RoundProgress};

use crate::config::ConversationConfig;
use crate::llm::{
    ConversationMessage, LanguageModel, LlmError, ModelRequest, ModelResponse, TokenSink,
    ToolCall, ToolResult,
};
use crate::tools::ToolExecutor;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Why a turn produced no answer
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Model(#[from] LlmError),
    #[error("turn abandoned")]
    Abandoned,
}

pub struct Conversation<L, X> {
    id: String,
    config: ConversationConfig,
    model: L,
    tools: Arc<X>,
    history: Vec<ConversationMessage>,
}

impl<L, X> Conversation<L, X>
where
    L: LanguageModel,
    X: ToolExecutor + 'static,
{
    pub fn new(config: ConversationConfig, model: L, tools: Arc<X>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            model,
            tools,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Committed messages, oldest first
    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    /// Run one turn for `utterance`, streaming partial tokens to `tokens`.
    ///
    /// A model failure commits the messages staged before it and ends the
    /// turn; tool failures become tool messages and the turn continues.
    pub async fn run_turn(
        &mut self,
        utterance: &str,
        tokens: &TokenSink,
        cancel: &CancellationToken,
    ) -> Result<String, TurnError> {
        let mut staged = vec![ConversationMessage::user(utterance)];
        let mut round_index = 0u32;

        loop {
            round_index += 1;
            let request = self.request_with(&staged);

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.abandon(round_index)),
                response = self.model.generate(&request, tokens) => response,
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        conv_id = %self.id,
                        round = round_index,
                        error = %e,
                        "Language model failed, ending turn"
                    );
                    self.history.extend(staged);
                    return Err(e.into());
                }
            };

            let ModelResponse { text, tool_calls } = response;
            if tool_calls.is_empty() {
                staged.push(ConversationMessage::assistant(text.clone(), vec![]));
                self.history.extend(staged);
                tracing::info!(conv_id = %self.id, rounds = round_index, "Turn complete");
                return Ok(text);
            }

            let round = PendingRound::new(&tool_calls);
            staged.push(ConversationMessage::assistant(text, round.issued()));

            let results = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.abandon(round_index)),
                results = self.execute_round(round, cancel) => results,
            };

            staged.extend(results.iter().map(ConversationMessage::tool));
        }
    }

    fn request_with(&self, staged: &[ConversationMessage]) -> ModelRequest {
        ModelRequest {
            system: self.config.system_prompt.clone(),
            history: self.history.iter().chain(staged).cloned().collect(),
            tools: self.tools.definitions(),
        }
    }

    fn abandon(&self, round: u32) -> TurnError {
        tracing::info!(conv_id = %self.id, round, "Turn abandoned, staged messages dropped");
        TurnError::Abandoned
    }

    /// Execute every call of a round concurrently and collect results in issue order
    async fn execute_round(&self, mut round: PendingRound, cancel: &CancellationToken) -> Vec<ToolResult> {
        let (result_tx, mut result_rx) = mpsc::channel(round.len().max(1));
        // Dropping the set aborts calls still running when the round is abandoned
        let mut tasks = JoinSet::new();

        tracing::info!(conv_id = %self.id, calls = round.len(), "Fanning out tool calls");

        for call in round.issued() {
            let tools = Arc::clone(&self.tools);
            let result_tx = result_tx.clone();
            let token = cancel.child_token();
            tasks.spawn(async move {
                let result = run_tool(&*tools, &call, token).await;
                let _ = result_tx.send(result).await;
            });
        }
        drop(result_tx);

        while let Some(result) = result_rx.recv().await {
            match round.record(result) {
                RoundProgress::JustCompleted => break,
                RoundProgress::Waiting(remaining) => {
                    tracing::debug!(conv_id = %self.id, remaining, "Tool result recorded");
                }
                RoundProgress::Ignored => {}
            }
        }

        round.into_results()
    }
}

async fn run_tool<X: ToolExecutor + ?Sized>(
    tools: &X,
    call: &ToolCall,
    cancel: CancellationToken,
) -> ToolResult {
    match tools.execute(call, cancel).await {
        Ok(text) => {
            tracing::debug!(tool = %call.name, id = %call.id, "Tool succeeded");
            ToolResult::success(call.id.clone(), text)
        }
        Err(e) => {
            tracing::warn!(tool = %call.name, id = %call.id, error = %e, "Tool failed");
            ToolResult::failure(call.id.clone(), e.to_string())
        }
    }
}

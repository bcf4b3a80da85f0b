//! Language model capability
//!
//! The engine drives any model through [`LanguageModel`]; providers live
//! outside this crate.

mod error;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Streaming language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a response for the full history. Partial tokens go to `tokens`
    /// in model order; the returned response carries the final text and any
    /// tool calls.
    async fn generate(
        &self,
        request: &ModelRequest,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, LlmError>;

    /// Model identifier for logs
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn generate(
        &self,
        request: &ModelRequest,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, LlmError> {
        (**self).generate(request, tokens).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for language models
pub struct LoggingModel<M> {
    inner: M,
}

impl<M: LanguageModel> LoggingModel<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for LoggingModel<M> {
    async fn generate(
        &self,
        request: &ModelRequest,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(request, tokens).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    history_len = request.history.len(),
                    tool_calls = response.tool_calls.len(),
                    "LLM round completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.inner.model_id(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "LLM round failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

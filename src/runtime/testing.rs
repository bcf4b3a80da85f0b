//! Mock implementations for testing
//!
//! These mocks enable integration testing without real devices or models.

use super::traits::*;
use crate::llm::{LanguageModel, LlmError, ModelRequest, ModelResponse, TokenSink, ToolCall, ToolDefinition};
use crate::tools::{ToolError, ToolExecutor};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Language Model
// ============================================================================

struct ScriptedRound {
    tokens: Vec<String>,
    outcome: Result<ModelResponse, LlmError>,
}

/// Language model that replays queued rounds, streaming their tokens
pub struct MockLanguageModel {
    script: Mutex<VecDeque<ScriptedRound>>,
    /// Record of all requests made
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, tokens: &[&str], outcome: Result<ModelResponse, LlmError>) {
        self.script.lock().unwrap().push_back(ScriptedRound {
            tokens: tokens.iter().map(ToString::to_string).collect(),
            outcome,
        });
    }

    /// Queue a response; non-empty text is streamed as one token
    pub fn queue_response(&self, response: ModelResponse) {
        let text = response.text.clone();
        let tokens: Vec<&str> = if text.is_empty() { vec![] } else { vec![text.as_str()] };
        self.push(&tokens, Ok(response));
    }

    /// Queue a text answer streamed token by token
    pub fn queue_tokens(&self, tokens: &[&str]) {
        self.push(tokens, Ok(ModelResponse::text(tokens.concat())));
    }

    /// Queue streamed text that also proposes tool calls
    pub fn queue_streamed(&self, tokens: &[&str], tool_calls: Vec<ToolCall>) {
        let response = ModelResponse {
            text: tokens.concat(),
            tool_calls,
        };
        self.push(tokens, Ok(response));
    }

    /// Queue a text answer delivered without streaming
    pub fn queue_silent(&self, text: &str) {
        self.push(&[], Ok(ModelResponse::text(text)));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.push(&[], Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(
        &self,
        request: &ModelRequest,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let round = self.script.lock().unwrap().pop_front();
        let Some(round) = round else {
            return Err(LlmError::network("No mock response queued"));
        };
        for token in round.tokens {
            tokens.push(token);
            tokio::task::yield_now().await;
        }
        round.outcome
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

struct MockTool {
    output: Result<String, ToolError>,
    delay: Duration,
}

/// Tool executor with predefined outputs and optional delays
pub struct MockToolExecutor {
    tools: HashMap<String, MockTool>,
    /// Names of executed tools, in start order
    executions: Mutex<Vec<String>>,
    completed: AtomicUsize,
    started: Arc<Notify>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            executions: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
            started: Arc::new(Notify::new()),
        }
    }

    pub fn with_tool(self, name: &str, output: Result<&str, ToolError>) -> Self {
        self.with_delayed_tool(name, output, Duration::ZERO)
    }

    /// Tool that finishes after `delay` unless cancelled first
    pub fn with_delayed_tool(
        mut self,
        name: &str,
        output: Result<&str, ToolError>,
        delay: Duration,
    ) -> Self {
        self.tools.insert(
            name.to_string(),
            MockTool {
                output: output.map(ToString::to_string),
                delay,
            },
        );
        self
    }

    /// Notified each time an execution starts
    pub fn execution_started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    pub fn recorded_executions(&self) -> Vec<String> {
        self.executions.lock().unwrap().clone()
    }

    /// Executions that ran to the end of their delay
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, call: &ToolCall, cancel: CancellationToken) -> Result<String, ToolError> {
        self.executions.lock().unwrap().push(call.name.clone());
        self.started.notify_one();

        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        if !tool.delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return Err(ToolError::Cancelled),
                () = tokio::time::sleep(tool.delay) => {}
            }
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        tool.output.clone()
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| ToolDefinition {
                description: format!("Mock {name}"),
                name,
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
                examples: vec![],
            })
            .collect()
    }
}

// ============================================================================
// Mock Speech Capabilities
// ============================================================================

/// Speech recognizer driven by the test
#[derive(Default)]
pub struct MockStt {
    sink: Mutex<Option<SttSink>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_sink(&self) -> Option<SttSink> {
        self.sink.lock().unwrap().take()
    }

    pub async fn deliver_partial(&self, text: &str) -> bool {
        let sink = self.take_sink();
        let Some(sink) = sink else { return false };
        sink.partial(text).await;
        *self.sink.lock().unwrap() = Some(sink);
        true
    }

    pub async fn deliver_final(&self, text: &str) -> bool {
        match self.take_sink() {
            Some(sink) => {
                sink.finish(text).await;
                true
            }
            None => false,
        }
    }

    pub async fn deliver_error(&self, message: &str) -> bool {
        match self.take_sink() {
            Some(sink) => {
                sink.fail(message).await;
                true
            }
            None => false,
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for MockStt {
    async fn start_listening(&self, sink: SttSink) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn stop_listening(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtsCall {
    Incremental(String),
    Immediate(String),
    Stop,
}

/// Speech output that records every call
#[derive(Default)]
pub struct RecordingTts {
    calls: Mutex<Vec<TtsCall>>,
}

impl RecordingTts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TtsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == TtsCall::Stop).count()
    }
}

impl TextToSpeech for RecordingTts {
    fn speak_incremental(&self, token: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TtsCall::Incremental(token.to_string()));
    }

    fn speak_immediately(&self, text: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TtsCall::Immediate(text.to_string()));
    }

    fn stop_speaking(&self) {
        self.calls.lock().unwrap().push(TtsCall::Stop);
    }
}

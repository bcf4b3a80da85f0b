//! Console capabilities and script driver for the `tapflow` binary
//!
//! Speech input comes from `say` lines, speech output goes to the log, and a
//! keyword-matching model stands in for a real language model so the whole
//! flow can be exercised from a terminal.

use crate::flow::FlowState;
use crate::gesture::{GestureSession, PointerEvent};
use crate::llm::{
    ConversationMessage, LanguageModel, LlmError, ModelRequest, ModelResponse, Role, TokenSink,
    ToolCall,
};
use crate::runtime::{FlowHandle, SpeechToText, SttSink, TextToSpeech};
use async_trait::async_trait;
use serde_json::json;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

// ============================================================================
// Script commands
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command} expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

/// One line of a simulator script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Down(u32),
    Up(u32),
    Wait(Duration),
    /// Speech heard by the console recognizer
    Say(String),
    /// Typed input, bypassing speech capture
    Text(String),
    Cancel,
    State,
    Quit,
}

impl FromStr for Command {
    type Err = ScriptError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let pointer = |command| {
            rest.parse().map_err(|_| ScriptError::BadArgument {
                command,
                expected: "a pointer id",
            })
        };
        let text = |command| {
            if rest.is_empty() {
                Err(ScriptError::BadArgument {
                    command,
                    expected: "some text",
                })
            } else {
                Ok(rest.to_string())
            }
        };

        match word {
            "down" => pointer("down").map(Command::Down),
            "up" => pointer("up").map(Command::Up),
            "wait" => rest
                .parse()
                .map(|ms| Command::Wait(Duration::from_millis(ms)))
                .map_err(|_| ScriptError::BadArgument {
                    command: "wait",
                    expected: "milliseconds",
                }),
            "say" => text("say").map(Command::Say),
            "text" => text("text").map(Command::Text),
            "cancel" => Ok(Command::Cancel),
            "state" => Ok(Command::State),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ScriptError::UnknownCommand(other.to_string())),
        }
    }
}

/// Drives a gesture session and a flow from script commands
pub struct ScriptRunner<'a> {
    session: &'a GestureSession,
    handle: &'a FlowHandle,
    stt: &'a ConsoleStt,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(session: &'a GestureSession, handle: &'a FlowHandle, stt: &'a ConsoleStt) -> Self {
        Self {
            session,
            handle,
            stt,
        }
    }

    /// Execute one command. Returns false when the script asked to quit.
    pub async fn execute(&self, command: Command) -> bool {
        match command {
            Command::Down(id) => {
                self.session.send(PointerEvent::down(id, Instant::now())).await;
            }
            Command::Up(id) => {
                self.session.send(PointerEvent::up(id, Instant::now())).await;
            }
            Command::Wait(duration) => tokio::time::sleep(duration).await,
            Command::Say(text) => self.stt.hear(&text).await,
            Command::Text(text) => {
                if let Err(e) = self.handle.start_from_text(text).await {
                    tracing::warn!(error = %e, "Typed input rejected");
                }
            }
            Command::Cancel => {
                if let Err(e) = self.handle.cancel_current_flow().await {
                    tracing::warn!(error = %e, "Cancel failed");
                }
            }
            Command::State => {
                tracing::info!(state = %self.handle.current_flow_state(), "Current state");
            }
            Command::Quit => return false,
        }
        true
    }

    /// Wait until the flow is idle, up to `limit`
    pub async fn settle(&self, limit: Duration) -> bool {
        let mut state = self.handle.watch_state();
        tokio::time::timeout(limit, state.wait_for(|s| *s == FlowState::Idle))
            .await
            .is_ok_and(|r| r.is_ok())
    }
}

// ============================================================================
// Console speech
// ============================================================================

/// Recognizer fed by `say` commands
///
/// Heard text is reported as a partial while listening; stopping delivers
/// everything heard as the final transcript.
#[derive(Default)]
pub struct ConsoleStt {
    sink: Mutex<Option<SttSink>>,
    heard: Mutex<Vec<String>>,
}

impl ConsoleStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn hear(&self, text: &str) {
        let sink = lock(&self.sink).take();
        let Some(sink) = sink else {
            tracing::warn!(%text, "Not listening, speech ignored");
            return;
        };
        lock(&self.heard).push(text.to_string());
        sink.partial(text).await;
        *lock(&self.sink) = Some(sink);
    }
}

#[async_trait]
impl SpeechToText for ConsoleStt {
    async fn start_listening(&self, sink: SttSink) {
        tracing::info!(turn = %sink.turn(), "Microphone open");
        lock(&self.heard).clear();
        *lock(&self.sink) = Some(sink);
    }

    async fn stop_listening(&self) {
        let sink = lock(&self.sink).take();
        let transcript = lock(&self.heard).drain(..).collect::<Vec<_>>().join(" ");
        if let Some(sink) = sink {
            tracing::info!(turn = %sink.turn(), "Microphone closed");
            tokio::spawn(sink.finish(transcript));
        }
    }
}

/// Speech output written to the log
#[derive(Default)]
pub struct ConsoleTts {
    line: Mutex<String>,
}

impl ConsoleTts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextToSpeech for ConsoleTts {
    fn speak_incremental(&self, token: &str) {
        lock(&self.line).push_str(token);
        tracing::debug!(%token, "Speaking token");
    }

    fn speak_immediately(&self, text: &str) {
        tracing::info!(%text, "Speaking");
    }

    fn stop_speaking(&self) {
        let spoken = std::mem::take(&mut *lock(&self.line));
        tracing::info!(%spoken, "Speech stopped");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ============================================================================
// Keyword model
// ============================================================================

/// Offline model that maps a few phrases onto the built-in tools
#[derive(Debug, Default)]
pub struct KeywordModel;

impl KeywordModel {
    fn respond(history: &[ConversationMessage]) -> Result<ModelResponse, LlmError> {
        let Some(last) = history.last() else {
            return Err(LlmError::invalid_request("empty history"));
        };

        match last.role {
            Role::Tool => Ok(Self::summarize_tools(history)),
            Role::User => Ok(Self::plan(&last.content.to_lowercase())),
            Role::Assistant => Err(LlmError::invalid_request(
                "history must end with a user or tool message",
            )),
        }
    }

    fn plan(utterance: &str) -> ModelResponse {
        if utterance.contains("timer") {
            let seconds = parse_duration_seconds(utterance).unwrap_or(60);
            return ModelResponse::with_tool_calls(vec![ToolCall::new(
                uuid::Uuid::new_v4().to_string(),
                "create_timer",
                &json!({ "duration_seconds": seconds }),
            )]);
        }
        if utterance.contains("time") || utterance.contains("date") {
            let part = if utterance.contains("date") { "date" } else { "time" };
            return ModelResponse::with_tool_calls(vec![ToolCall::new(
                uuid::Uuid::new_v4().to_string(),
                "current_time",
                &json!({ "part": part }),
            )]);
        }
        ModelResponse::text(format!("You said: {utterance}"))
    }

    /// Answer from the tool messages that follow the last assistant message
    fn summarize_tools(history: &[ConversationMessage]) -> ModelResponse {
        let results: Vec<&str> = history
            .iter()
            .rev()
            .take_while(|m| m.role == Role::Tool)
            .map(|m| m.content.as_str())
            .collect();

        if let Some(error) = results.iter().find(|r| r.starts_with("Error:")) {
            return ModelResponse::text(format!("Sorry, that didn't work. {error}"));
        }
        if results.iter().any(|r| r.starts_with("Timer set")) {
            return ModelResponse::text("Okay, I've set a timer");
        }
        ModelResponse::text(results.into_iter().rev().collect::<Vec<_>>().join(". "))
    }
}

#[async_trait]
impl LanguageModel for KeywordModel {
    async fn generate(
        &self,
        request: &ModelRequest,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, LlmError> {
        let response = Self::respond(&request.history)?;
        for word in response.text.split_inclusive(' ') {
            tokens.push(word);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(response)
    }

    fn model_id(&self) -> &str {
        "keyword"
    }
}

/// Duration like "5 minutes" or "90 seconds" in an utterance
fn parse_duration_seconds(utterance: &str) -> Option<u64> {
    let words: Vec<&str> = utterance.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let amount: u64 = pair[0].parse().ok()?;
        let unit = pair[1].trim_end_matches(|c: char| !c.is_alphabetic());
        let scale = match unit {
            "second" | "seconds" | "sec" | "secs" => 1,
            "minute" | "minutes" | "min" | "mins" => 60,
            "hour" | "hours" => 3600,
            _ => return None,
        };
        amount.checked_mul(scale)
    })
}

//! Timer tool
//!
//! Timers are recorded on a shared [`TimerBoard`]; ringing them is the device's job.

use super::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const MAX_TIMER_SECONDS: u64 = 24 * 60 * 60;

/// A timer created by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub id: String,
    pub label: Option<String>,
    pub duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub fires_at: DateTime<Utc>,
}

/// Timers shared between the tool and the rest of the device
#[derive(Debug, Clone, Default)]
pub struct TimerBoard {
    timers: Arc<Mutex<Vec<TimerEntry>>>,
}

impl TimerBoard {
    pub fn add(&self, duration_seconds: u64, label: Option<String>, now: DateTime<Utc>) -> TimerEntry {
        let clamped = duration_seconds.min(MAX_TIMER_SECONDS);
        let offset = ChronoDuration::seconds(i64::try_from(clamped).unwrap_or(0));
        let entry = TimerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            duration_seconds,
            created_at: now,
            fires_at: now + offset,
        };
        self.lock().push(entry.clone());
        entry
    }

    /// Timers that have not fired yet at `now`, soonest first
    pub fn active(&self, now: DateTime<Utc>) -> Vec<TimerEntry> {
        let mut timers: Vec<_> = self
            .lock()
            .iter()
            .filter(|t| t.fires_at > now)
            .cloned()
            .collect();
        timers.sort_by_key(|t| t.fires_at);
        timers
    }

    pub fn cancel(&self, id: &str) -> bool {
        let mut timers = self.lock();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        timers.len() != before
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TimerEntry>> {
        self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[derive(Debug, Deserialize)]
struct CreateTimerInput {
    duration_seconds: u64,
    #[serde(default)]
    label: Option<String>,
}

/// Starts a countdown timer
pub struct CreateTimerTool {
    board: TimerBoard,
}

impl CreateTimerTool {
    pub fn new(board: TimerBoard) -> Self {
        Self { board }
    }
}

/// Spoken form of a duration, e.g. "1 hour and 30 minutes"
fn spoken_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let unit = |n: u64, name: &str| {
        if n == 1 {
            format!("1 {name}")
        } else {
            format!("{n} {name}s")
        }
    };

    let parts: Vec<String> = [(hours, "hour"), (minutes, "minute"), (seconds, "second")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, name)| unit(n, name))
        .collect();

    match parts.as_slice() {
        [] => "0 seconds".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[async_trait]
impl Tool for CreateTimerTool {
    fn name(&self) -> &'static str {
        "create_timer"
    }

    fn description(&self) -> String {
        "Start a countdown timer. Convert the requested length to seconds; pass a short label when the user names the timer.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "required": ["duration_seconds"],
            "properties": {
                "duration_seconds": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_TIMER_SECONDS,
                    "description": "Timer length in seconds"
                },
                "label": {
                    "type": "string",
                    "description": "Optional name, e.g. \"pasta\""
                }
            }
        })
    }

    fn examples(&self) -> Vec<String> {
        vec![
            "set a timer for five minutes".to_string(),
            "start a pasta timer for 10 minutes".to_string(),
        ]
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: CreateTimerInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        if input.duration_seconds == 0 || input.duration_seconds > MAX_TIMER_SECONDS {
            return Err(ToolError::InvalidInput(format!(
                "duration_seconds must be between 1 and {MAX_TIMER_SECONDS}"
            )));
        }

        let label = input.label.filter(|l| !l.trim().is_empty());
        let entry = self.board.add(input.duration_seconds, label, Utc::now());
        tracing::info!(
            timer_id = %entry.id,
            call_id = %ctx.call_id,
            duration_seconds = entry.duration_seconds,
            "Timer created"
        );

        let length = spoken_duration(entry.duration_seconds);
        Ok(match &entry.label {
            Some(label) => format!("Timer set: {label}, {length}"),
            None => format!("Timer set for {length}"),
        })
    }
}

//! Wall-clock tool

use super::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;
use serde_json::{json, Value};

/// Tells the model the current local date and time
pub struct CurrentTimeTool;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Time,
    Date,
    #[default]
    Both,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentTimeInput {
    #[serde(default)]
    part: Part,
}

fn describe<Tz: TimeZone>(now: &DateTime<Tz>, part: &Part) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match part {
        Part::Time => format!("It is {}.", now.format("%-I:%M %p")),
        Part::Date => format!("Today is {}.", now.format("%A, %B %-d, %Y")),
        Part::Both => format!(
            "It is {} on {}.",
            now.format("%-I:%M %p"),
            now.format("%A, %B %-d, %Y")
        ),
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        "current_time"
    }

    fn description(&self) -> String {
        "Get the current local time, date, or both. Use whenever the user asks what time or day it is.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "part": {
                    "type": "string",
                    "enum": ["time", "date", "both"],
                    "description": "Which part of the current moment to report"
                }
            }
        })
    }

    fn examples(&self) -> Vec<String> {
        vec!["what time is it".to_string(), "what's the date today".to_string()]
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> Result<String, ToolError> {
        let input: CurrentTimeInput = if input.is_null() {
            CurrentTimeInput::default()
        } else {
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?
        };
        Ok(describe(&Local::now(), &input.part))
    }
}

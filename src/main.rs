//! tapflow simulator
//!
//! Reads a gesture/speech script from stdin and runs it through the full
//! interaction flow with console speech and the built-in tools.

use std::sync::Arc;
use std::time::Duration;
use tapflow::conversation::Conversation;
use tapflow::flow::FlowNotification;
use tapflow::gesture::GestureSession;
use tapflow::llm::LoggingModel;
use tapflow::simulator::{Command, ConsoleStt, ConsoleTts, KeywordModel, ScriptRunner};
use tapflow::tools::{TimerBoard, ToolRegistry};
use tapflow::{EngineConfig, EngineError, FlowRuntime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_LIMIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    init_logging();

    let config = EngineConfig::from_env();
    tracing::info!(
        min_hold = ?config.gesture.min_hold_time,
        separation = ?config.gesture.min_gesture_separation,
        "Starting tapflow simulator"
    );

    let stt = Arc::new(ConsoleStt::new());
    let tools = Arc::new(ToolRegistry::standard(TimerBoard::default()));
    let conversation = Conversation::new(
        config.conversation.clone(),
        LoggingModel::new(KeywordModel),
        tools,
    );
    tracing::info!(conv_id = %conversation.id(), "Conversation created");

    let (runtime, handle) =
        FlowRuntime::new(&config, Arc::clone(&stt), ConsoleTts::new(), conversation);
    let runtime_task = runtime.spawn();

    let (session, gestures) = GestureSession::spawn(config.gesture);
    handle.attach_gestures(gestures);
    tokio::spawn(log_notifications(handle.subscribe()));

    let runner = ScriptRunner::new(&session, &handle, &stt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if !runner.execute(command).await {
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, %line, "Skipping script line"),
        }
    }

    if !runner.settle(SETTLE_LIMIT).await {
        tracing::warn!(state = %handle.current_flow_state(), "Flow still active at exit, cancelling");
        handle.cancel_current_flow().await?;
    }

    session.shutdown();
    drop(handle);
    if tokio::time::timeout(Duration::from_secs(1), runtime_task).await.is_err() {
        tracing::debug!("Flow runtime still draining at exit");
    }
    tracing::info!("Simulator finished");
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tapflow=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var_os("TAPFLOW_LOG_JSON").is_some() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn log_notifications(mut rx: broadcast::Receiver<FlowNotification>) {
    loop {
        match rx.recv().await {
            Ok(notification) => match serde_json::to_string(&notification) {
                Ok(json) => tracing::info!(target: "tapflow::notify", %json, "Notification"),
                Err(e) => tracing::warn!(error = %e, "Unserializable notification"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

//! tapflow - hands-free voice interaction engine
//!
//! Touch gestures drive a single conversation turn through speech capture,
//! language-model reasoning with concurrent tool calls, and spoken output.
//! Any gesture or error cancels the turn cleanly at any stage.

pub mod config;
pub mod conversation;
pub mod error;
pub mod flow;
pub mod gesture;
pub mod llm;
pub mod runtime;
pub mod simulator;
pub mod tools;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};
pub use runtime::{FlowHandle, FlowRuntime};

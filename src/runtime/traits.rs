//! Capability traits consumed by the flow runtime
//!
//! Speech capabilities report back through [`SttSink`], which is stamped
//! with the turn it belongs to.

use super::Envelope;
use crate::flow::{FlowEvent, TurnId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Speech recognition
///
/// `start_listening` must not block on delivering results; implementations
/// report through the sink from their own task.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Begin capturing. Zero or more partials, then exactly one of
    /// [`SttSink::finish`] or [`SttSink::fail`].
    async fn start_listening(&self, sink: SttSink);

    /// Stop capturing. A recognizer that has speech should still finish with
    /// its final transcript.
    async fn stop_listening(&self);
}

/// Speech output. Fire-and-forget.
pub trait TextToSpeech: Send + Sync {
    fn speak_incremental(&self, token: &str);

    fn speak_immediately(&self, text: &str);

    fn stop_speaking(&self);
}

/// Delivers one recognition session's results to the flow
///
/// `finish` and `fail` consume the sink, so a session reports its outcome
/// at most once.
#[derive(Debug)]
pub struct SttSink {
    turn: TurnId,
    tx: mpsc::Sender<Envelope>,
}

impl SttSink {
    pub(crate) fn new(turn: TurnId, tx: mpsc::Sender<Envelope>) -> Self {
        Self { turn, tx }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    pub async fn partial(&self, text: impl Into<String>) {
        self.deliver(FlowEvent::SttPartial {
            turn: self.turn,
            text: text.into(),
        })
        .await;
    }

    pub async fn finish(self, text: impl Into<String>) {
        self.deliver(FlowEvent::SttFinal {
            turn: self.turn,
            text: text.into(),
        })
        .await;
    }

    pub async fn fail(self, message: impl Into<String>) {
        self.deliver(FlowEvent::SttError {
            turn: self.turn,
            message: message.into(),
        })
        .await;
    }

    async fn deliver(&self, event: FlowEvent) {
        if self.tx.send(Envelope::event(event)).await.is_err() {
            tracing::debug!(turn = %self.turn, "Flow runtime gone, dropping speech result");
        }
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    async fn start_listening(&self, sink: SttSink) {
        (**self).start_listening(sink).await;
    }

    async fn stop_listening(&self) {
        (**self).stop_listening().await;
    }
}

impl<T: TextToSpeech + ?Sized> TextToSpeech for Arc<T> {
    fn speak_incremental(&self, token: &str) {
        (**self).speak_incremental(token);
    }

    fn speak_immediately(&self, text: &str) {
        (**self).speak_immediately(text);
    }

    fn stop_speaking(&self) {
        (**self).stop_speaking();
    }
}

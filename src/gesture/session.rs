//! Async gesture session
//!
//! Owns a [`GestureRecognizer`] on a background task. Pointer samples arrive on a
//! channel; hold and tap-confirmation timers are the recognizer's deadlines,
//! re-armed on every loop iteration, so cancelling a timer is just moving the
//! deadline and every timer dies with the task.

use super::event::{GestureEvent, PointerEvent};
use super::recognizer::GestureRecognizer;
use crate::config::GestureConfig;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Lazy, unbounded stream of recognized gestures
pub struct GestureStream {
    inner: UnboundedReceiverStream<GestureEvent>,
}

impl Stream for GestureStream {
    type Item = GestureEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Handle to a running gesture session
pub struct GestureSession {
    pointer_tx: mpsc::Sender<PointerEvent>,
    task: JoinHandle<()>,
}

impl GestureSession {
    /// Start a session and return it with its gesture stream
    pub fn spawn(config: GestureConfig) -> (Self, GestureStream) {
        let (pointer_tx, pointer_rx) = mpsc::channel(64);
        let (gesture_tx, gesture_rx) = mpsc::unbounded_channel();
        let recognizer = GestureRecognizer::new(config);

        let task = tokio::spawn(run(recognizer, pointer_rx, gesture_tx));

        let stream = GestureStream {
            inner: UnboundedReceiverStream::new(gesture_rx),
        };
        (Self { pointer_tx, task }, stream)
    }

    /// Feed one pointer sample. Returns false once the session has stopped.
    pub async fn send(&self, event: PointerEvent) -> bool {
        self.pointer_tx.send(event).await.is_ok()
    }

    /// Stop the session; pending timers are dropped with it
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run(
    mut recognizer: GestureRecognizer,
    mut pointer_rx: mpsc::Receiver<PointerEvent>,
    gesture_tx: mpsc::UnboundedSender<GestureEvent>,
) {
    tracing::debug!("Gesture session started");

    loop {
        let deadline = recognizer.next_deadline();
        let events = tokio::select! {
            sample = pointer_rx.recv() => match sample {
                Some(sample) => recognizer.on_pointer(sample),
                None => break,
            },
            () = sleep_until(deadline) => recognizer.on_tick(Instant::now()),
        };

        for event in events {
            if gesture_tx.send(event).is_err() {
                tracing::debug!("Gesture stream dropped, stopping session");
                return;
            }
        }
    }

    tracing::debug!("Gesture session stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::GestureKind;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_hold_timer_fires_without_further_input() {
        let (session, mut stream) = GestureSession::spawn(GestureConfig::default());
        let t0 = Instant::now();

        assert!(session.send(PointerEvent::down(0, t0)).await);
        assert_eq!(stream.next().await.map(|e| e.kind), Some(GestureKind::FingerDown));

        // Paused clock auto-advances to the hold deadline
        let start = stream.next().await.expect("hold start");
        assert_eq!(start.kind, GestureKind::HoldStart);
        assert_eq!(start.at, t0 + Duration::from_millis(200));

        tokio::time::sleep_until(t0 + Duration::from_millis(500)).await;
        assert!(session.send(PointerEvent::up(0, Instant::now())).await);
        let end = stream.next().await.expect("hold end");
        assert_eq!(end.kind, GestureKind::HoldEnd);
        assert_eq!(end.duration_ms, 500);

        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_confirmed_after_double_tap_window() {
        let (session, mut stream) = GestureSession::spawn(GestureConfig::default());
        let t0 = Instant::now();

        session.send(PointerEvent::down(0, t0)).await;
        session
            .send(PointerEvent::up(0, t0 + Duration::from_millis(150)))
            .await;

        assert_eq!(stream.next().await.map(|e| e.kind), Some(GestureKind::FingerDown));
        let tap = stream.next().await.expect("tap");
        assert_eq!(tap.kind, GestureKind::SingleTap);
        assert_eq!(tap.finger_count, 1);
        assert_eq!(tap.duration_ms, 0);
    }

    #[tokio::test]
    async fn test_stream_ends_when_input_closes() {
        let (session, mut stream) = GestureSession::spawn(GestureConfig::default());
        let GestureSession { pointer_tx, task } = session;
        drop(pointer_tx);
        assert!(stream.next().await.is_none());
        task.await.expect("session task");
    }
}

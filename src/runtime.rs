//! Runtime for the interaction flow
//!
//! [`FlowRuntime`] owns the capabilities and executes effects; callers talk
//! to it through a cloneable [`FlowHandle`].

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::FlowRuntime;
pub use traits::*;

use crate::flow::{FlowError, FlowEvent, FlowNotification, FlowState};
use crate::gesture::GestureEvent;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// An event on its way to the runtime, with an optional reply slot for
/// requests that must be accepted or rejected
#[derive(Debug)]
pub(crate) struct Envelope {
    pub event: FlowEvent,
    pub reply: Option<oneshot::Sender<Result<(), FlowError>>>,
}

impl Envelope {
    pub fn event(event: FlowEvent) -> Self {
        Self { event, reply: None }
    }

    fn request(event: FlowEvent) -> (Self, oneshot::Receiver<Result<(), FlowError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// Handle to interact with a running flow
#[derive(Clone)]
pub struct FlowHandle {
    event_tx: mpsc::Sender<Envelope>,
    state_rx: watch::Receiver<FlowState>,
    notify_tx: broadcast::Sender<FlowNotification>,
}

impl FlowHandle {
    /// Begin a voice turn. Rejected unless the flow is idle.
    pub async fn start_listening(&self) -> Result<(), FlowError> {
        self.request(FlowEvent::StartListening).await
    }

    /// Begin a turn from typed text. Rejected unless the flow is idle.
    pub async fn start_from_text(&self, text: impl Into<String>) -> Result<(), FlowError> {
        self.request(FlowEvent::StartFromText { text: text.into() })
            .await
    }

    /// Tear down the current turn. A no-op while idle.
    pub async fn cancel_current_flow(&self) -> Result<(), FlowError> {
        self.request(FlowEvent::Cancel).await
    }

    pub fn is_flow_active(&self) -> bool {
        self.current_flow_state().is_active()
    }

    pub fn current_flow_state(&self) -> FlowState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every committed state
    pub fn watch_state(&self) -> watch::Receiver<FlowState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowNotification> {
        self.notify_tx.subscribe()
    }

    /// Feed one recognized gesture
    pub async fn send_gesture(&self, gesture: GestureEvent) -> Result<(), FlowError> {
        self.event_tx
            .send(Envelope::event(FlowEvent::Gesture(gesture)))
            .await
            .map_err(|_| FlowError::EngineStopped)
    }

    /// Forward every gesture from `gestures` until it ends or the runtime stops
    pub fn attach_gestures<S>(&self, gestures: S) -> JoinHandle<()>
    where
        S: Stream<Item = GestureEvent> + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut gestures = Box::pin(gestures);
            while let Some(gesture) = gestures.next().await {
                tracing::debug!(kind = ?gesture.kind, fingers = gesture.finger_count, "Gesture");
                if handle.send_gesture(gesture).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Gesture stream detached");
        })
    }

    async fn request(&self, event: FlowEvent) -> Result<(), FlowError> {
        let (envelope, reply) = Envelope::request(event);
        self.event_tx
            .send(envelope)
            .await
            .map_err(|_| FlowError::EngineStopped)?;
        reply.await.map_err(|_| FlowError::EngineStopped)?
    }
}

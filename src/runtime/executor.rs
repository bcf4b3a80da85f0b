//! Flow runtime executor

use super::traits::{SpeechToText, SttSink, TextToSpeech};
use super::{Envelope, FlowHandle};

use crate::config::EngineConfig;
use crate::conversation::{Conversation, TurnError};
use crate::flow::{transition, FlowEffect, FlowError, FlowEvent, FlowNotification, FlowState, TurnId};
use crate::llm::{LanguageModel, TokenSink};
use crate::tools::ToolExecutor;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Generic flow runtime over any speech, model and tool implementations
///
/// The runtime is the only writer of the flow state. Effects of a transition
/// run before its state is published.
pub struct FlowRuntime<S, T, L, X>
where
    S: SpeechToText + 'static,
    T: TextToSpeech + 'static,
    L: LanguageModel + 'static,
    X: ToolExecutor + 'static,
{
    stt: S,
    tts: T,
    conversation: Arc<Mutex<Conversation<L, X>>>,
    event_rx: mpsc::Receiver<Envelope>,
    /// Weak so the runtime stops once every handle is gone
    event_tx: mpsc::WeakSender<Envelope>,
    state_tx: watch::Sender<FlowState>,
    notify_tx: broadcast::Sender<FlowNotification>,
    turn_seq: u64,
    /// Turn whose capability events are accepted
    active_turn: Option<TurnId>,
    /// Cancels the in-flight conversation turn
    turn_cancel: CancellationToken,
}

impl<S, T, L, X> FlowRuntime<S, T, L, X>
where
    S: SpeechToText + 'static,
    T: TextToSpeech + 'static,
    L: LanguageModel + 'static,
    X: ToolExecutor + 'static,
{
    pub fn new(
        config: &EngineConfig,
        stt: S,
        tts: T,
        conversation: Conversation<L, X>,
    ) -> (Self, FlowHandle) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(FlowState::Idle);
        let (notify_tx, _) = broadcast::channel(config.notify_buffer.max(1));

        let handle = FlowHandle {
            event_tx: event_tx.clone(),
            state_rx,
            notify_tx: notify_tx.clone(),
        };

        let runtime = Self {
            stt,
            tts,
            conversation: Arc::new(Mutex::new(conversation)),
            event_rx,
            event_tx: event_tx.downgrade(),
            state_tx,
            notify_tx,
            turn_seq: 0,
            active_turn: None,
            turn_cancel: CancellationToken::new(),
        };

        (runtime, handle)
    }

    /// Shared conversation, for inspection between turns
    pub fn conversation(&self) -> Arc<Mutex<Conversation<L, X>>> {
        Arc::clone(&self.conversation)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!("Starting flow runtime");

        while let Some(Envelope { event, reply }) = self.event_rx.recv().await {
            let outcome = self.process_event(event).await;
            match reply {
                Some(reply) => {
                    let _ = reply.send(outcome);
                }
                None => {
                    if let Err(e) = outcome {
                        tracing::debug!(error = %e, "Event ignored");
                    }
                }
            }
        }

        self.turn_cancel.cancel();
        tracing::info!("Flow runtime stopped");
    }

    async fn process_event(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        // Generated events are processed in a loop - no recursion
        let mut generated = VecDeque::new();
        self.step(event, &mut generated).await?;

        while let Some(next) = generated.pop_front() {
            if let Err(e) = self.step(next, &mut generated).await {
                tracing::warn!(error = %e, "Generated event rejected");
            }
        }

        Ok(())
    }

    async fn step(
        &mut self,
        event: FlowEvent,
        generated: &mut VecDeque<FlowEvent>,
    ) -> Result<(), FlowError> {
        if let Some(turn) = event.turn() {
            if Some(turn) != self.active_turn {
                tracing::debug!(%turn, event = event.name(), "Dropping event from retired turn");
                return Ok(());
            }
        }

        let from = *self.state_tx.borrow();
        let event_name = event.name();
        let result = transition(from, event).inspect_err(|e| {
            tracing::debug!(state = %from, event = event_name, error = %e, "Transition rejected");
        })?;

        for effect in result.effects {
            if let Some(generated_event) = self.execute_effect(effect).await {
                generated.push_back(generated_event);
            }
        }

        self.commit(from, result.new_state);
        Ok(())
    }

    fn commit(&mut self, from: FlowState, to: FlowState) {
        if matches!(to, FlowState::Idle | FlowState::Cancelling) {
            self.active_turn = None;
        }
        if from == to {
            return;
        }
        self.state_tx.send_replace(to);
        tracing::info!(%from, %to, "Flow state changed");
        self.publish(FlowNotification::StateChanged { from, to });
    }

    fn publish(&self, notification: FlowNotification) {
        // No subscribers is fine
        let _ = self.notify_tx.send(notification);
    }

    async fn execute_effect(&mut self, effect: FlowEffect) -> Option<FlowEvent> {
        match effect {
            FlowEffect::BeginTurn => {
                self.turn_seq += 1;
                let turn = TurnId(self.turn_seq);
                self.active_turn = Some(turn);
                std::mem::replace(&mut self.turn_cancel, CancellationToken::new()).cancel();
                tracing::info!(%turn, "Turn started");
                None
            }

            FlowEffect::StartStt => {
                let turn = self.active_turn?;
                let tx = self.event_tx.upgrade()?;
                self.stt.start_listening(SttSink::new(turn, tx)).await;
                None
            }

            FlowEffect::FinalizeStt => {
                tracing::debug!(turn = ?self.active_turn, "Finalizing speech capture");
                self.stt.stop_listening().await;
                None
            }

            FlowEffect::StopStt => {
                tracing::debug!(turn = ?self.active_turn, "Stopping speech capture");
                self.stt.stop_listening().await;
                None
            }

            FlowEffect::InjectTranscript { text } => {
                let turn = self.active_turn?;
                Some(FlowEvent::SttFinal { turn, text })
            }

            FlowEffect::RunTurn { text } => {
                self.spawn_turn(text);
                None
            }

            FlowEffect::AbortTurn => {
                tracing::info!(turn = ?self.active_turn, "Abandoning turn");
                self.turn_cancel.cancel();
                None
            }

            FlowEffect::SpeakIncremental { token } => {
                self.tts.speak_incremental(&token);
                None
            }

            FlowEffect::SpeakImmediately { text } => {
                self.tts.speak_immediately(&text);
                None
            }

            FlowEffect::StopSpeaking => {
                self.tts.stop_speaking();
                None
            }

            FlowEffect::Notify(notification) => {
                if let FlowNotification::Error { kind, message } = &notification {
                    tracing::warn!(?kind, fatal = kind.is_fatal(), %message, "Error reported");
                }
                self.publish(notification);
                None
            }

            FlowEffect::CompleteCancellation => Some(FlowEvent::CancellationComplete),
        }
    }

    fn spawn_turn(&self, text: String) {
        let (Some(turn), Some(tx)) = (self.active_turn, self.event_tx.upgrade()) else {
            return;
        };
        let conversation = Arc::clone(&self.conversation);
        let cancel = self.turn_cancel.clone();
        tokio::spawn(drive_turn(conversation, text, turn, cancel, tx));
    }
}

/// Run one conversation turn, forwarding streamed tokens and the outcome as
/// flow events stamped with `turn`
async fn drive_turn<L, X>(
    conversation: Arc<Mutex<Conversation<L, X>>>,
    text: String,
    turn: TurnId,
    cancel: CancellationToken,
    tx: mpsc::Sender<Envelope>,
) where
    L: LanguageModel,
    X: ToolExecutor + 'static,
{
    // An abandoned turn may still be releasing the conversation
    let mut conversation = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        guard = conversation.lock() => guard,
    };

    let (tokens, mut token_rx) = TokenSink::channel();
    let outcome = {
        let run = conversation.run_turn(&text, &tokens, &cancel);
        tokio::pin!(run);
        loop {
            tokio::select! {
                biased;
                Some(token) = token_rx.recv() => {
                    send(&tx, FlowEvent::ResponsePartial { turn, token }).await;
                }
                outcome = &mut run => break outcome,
            }
        }
    };
    drop(conversation);

    // Tokens pushed in the final poll precede the completion
    while let Ok(token) = token_rx.try_recv() {
        send(&tx, FlowEvent::ResponsePartial { turn, token }).await;
    }

    let event = match outcome {
        Ok(text) => FlowEvent::ResponseComplete { turn, text },
        Err(TurnError::Model(error)) => FlowEvent::LlmError { turn, error },
        Err(TurnError::Abandoned) => {
            tracing::debug!(%turn, "Turn task finished after abandon");
            return;
        }
    };
    send(&tx, event).await;
}

async fn send(tx: &mpsc::Sender<Envelope>, event: FlowEvent) {
    let _ = tx.send(Envelope::event(event)).await;
}

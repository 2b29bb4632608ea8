//! `KeySpaceActor` - exclusive owner of one key-space's storage.
//!
//! Every action against a key-space runs to completion inside this actor
//! before the next message is taken, and the periodic expiry sweep shares the
//! same loop. Nothing else holds the storage, so a nonce consume or a quota
//! increment is a read-modify-write that no other caller can interleave with.

use crate::clock::SharedClock;
use crate::errors::CoordinatorError;
use crate::observability::metrics as prom;
use crate::protocol::{Action, ActionKind, ActionOutput};
use crate::storage::Storage;

use super::messages::{ActionReply, KeySpaceMessage, KeySpaceState};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::KeySpaceId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for key-space mailboxes.
pub const KEYSPACE_CHANNEL_BUFFER: usize = 1024;

/// Handle to a `KeySpaceActor`.
#[derive(Clone)]
pub struct KeySpaceActorHandle {
    keyspace: KeySpaceId,
    sender: mpsc::Sender<KeySpaceMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl std::fmt::Debug for KeySpaceActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySpaceActorHandle")
            .field("keyspace", &self.keyspace)
            .field("mailbox_depth", &self.mailbox.current_depth())
            .finish_non_exhaustive()
    }
}

impl KeySpaceActorHandle {
    /// Key-space served by this actor.
    #[must_use]
    pub fn keyspace(&self) -> &KeySpaceId {
        &self.keyspace
    }

    /// Enqueue a message without waiting for mailbox space.
    ///
    /// The message is handed back on failure so the caller can reply to it or
    /// route it elsewhere.
    ///
    /// # Errors
    ///
    /// `TrySendError::Full` if the mailbox is at capacity, `TrySendError::Closed`
    /// if the actor has stopped.
    pub fn try_send(
        &self,
        message: KeySpaceMessage,
    ) -> Result<(), TrySendError<KeySpaceMessage>> {
        self.mailbox.record_enqueue();
        self.sender.try_send(message).inspect_err(|e| match e {
            TrySendError::Full(_) => self.mailbox.record_drop(),
            TrySendError::Closed(_) => self.mailbox.cancel_enqueue(),
        })
    }

    /// Execute an action and wait for its result. The supervisor forwards
    /// through [`Self::try_send`] instead; this is for driving one actor
    /// directly.
    #[cfg(test)]
    pub async fn execute(&self, action: Action) -> Result<ActionOutput, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self
            .sender
            .send(KeySpaceMessage::Execute {
                action,
                respond_to: tx,
            })
            .await
        {
            self.mailbox.cancel_enqueue();
            return Err(CoordinatorError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current key-space state.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Internal` if the actor is unreachable.
    pub async fn get_state(&self) -> Result<KeySpaceState, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self
            .sender
            .send(KeySpaceMessage::GetState { respond_to: tx })
            .await
        {
            self.mailbox.cancel_enqueue();
            return Err(CoordinatorError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor. Messages already queued are still processed.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `KeySpaceActor` implementation.
pub struct KeySpaceActor {
    keyspace: KeySpaceId,
    receiver: mpsc::Receiver<KeySpaceMessage>,
    cancel_token: CancellationToken,
    storage: Box<dyn Storage>,
    clock: SharedClock,
    sweep_interval: Duration,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
    swept_total: u64,
}

impl KeySpaceActor {
    /// Spawn a key-space actor and return its handle and task handle.
    ///
    /// `cancel_token` should be a child of the supervisor's root token.
    #[must_use]
    pub fn spawn(
        keyspace: KeySpaceId,
        storage: Box<dyn Storage>,
        clock: SharedClock,
        sweep_interval: Duration,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (KeySpaceActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(KEYSPACE_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::KeySpace, keyspace.as_str()));

        let actor = Self {
            keyspace: keyspace.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            storage,
            clock,
            sweep_interval,
            metrics,
            mailbox: Arc::clone(&mailbox),
            swept_total: 0,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = KeySpaceActorHandle {
            keyspace,
            sender,
            cancel_token,
            mailbox,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "coord.actor.keyspace", fields(keyspace = %self.keyspace))]
    async fn run(mut self) {
        info!(
            target: "coord.actor.keyspace",
            keyspace = %self.keyspace,
            "KeySpaceActor started"
        );

        // First tick one full period out; `interval` would fire immediately.
        let mut sweep = tokio::time::interval_at(
            tokio::time::Instant::now() + self.sweep_interval,
            self.sweep_interval,
        );
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "coord.actor.keyspace",
                        keyspace = %self.keyspace,
                        "KeySpaceActor received cancellation signal"
                    );
                    self.drain().await;
                    break;
                }

                _ = sweep.tick() => {
                    self.sweep_expired();
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            debug!(
                                target: "coord.actor.keyspace",
                                keyspace = %self.keyspace,
                                "KeySpaceActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "coord.actor.keyspace",
            keyspace = %self.keyspace,
            entries_remaining = self.storage.len(),
            messages_processed = self.mailbox.messages_processed(),
            "KeySpaceActor stopped"
        );
    }

    /// Finish whatever is already queued, then stop taking messages.
    async fn drain(&mut self) {
        self.receiver.close();
        while let Some(message) = self.receiver.recv().await {
            self.handle_message(message);
            self.mailbox.record_dequeue();
            self.metrics.record_message_processed();
        }
    }

    fn handle_message(&mut self, message: KeySpaceMessage) {
        match message {
            KeySpaceMessage::Execute { action, respond_to } => {
                self.execute(action, respond_to);
            }
            KeySpaceMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state());
            }
        }
    }

    fn execute(&mut self, action: Action, respond_to: ActionReply) {
        let kind = action.kind();
        let start = Instant::now();
        let now_ms = self.clock.now_ms();

        let result = action.execute(self.storage.as_mut(), now_ms);

        let outcome = if result.is_ok() { "ok" } else { "error" };
        prom::record_action(kind.as_str(), outcome, start.elapsed());

        match &result {
            Ok(ActionOutput::NonceValue(value)) if kind == ActionKind::NonceConsume => {
                prom::record_nonce_consume(value.value.is_some());
            }
            Ok(ActionOutput::RateLimit(decision)) => {
                prom::record_ratelimit_decision(decision.success);
            }
            Err(e) if e.status_code().is_server_error() => {
                warn!(
                    target: "coord.actor.keyspace",
                    keyspace = %self.keyspace,
                    action = kind.as_str(),
                    error = %e,
                    "Action failed"
                );
            }
            _ => {}
        }

        debug!(
            target: "coord.actor.keyspace",
            keyspace = %self.keyspace,
            action = kind.as_str(),
            outcome,
            "Action executed"
        );

        // Caller may have timed out and dropped the receiver.
        let _ = respond_to.send(result);
    }

    fn sweep_expired(&mut self) {
        match self.storage.sweep_expired(self.clock.now_ms()) {
            Ok(0) => {}
            Ok(removed) => {
                self.swept_total += u64::try_from(removed).unwrap_or(u64::MAX);
                prom::record_expired_swept(removed);
                debug!(
                    target: "coord.actor.keyspace",
                    keyspace = %self.keyspace,
                    removed,
                    "Swept expired entries"
                );
            }
            Err(e) => {
                warn!(
                    target: "coord.actor.keyspace",
                    keyspace = %self.keyspace,
                    error = %e,
                    "Expiry sweep failed"
                );
            }
        }
    }

    fn state(&self) -> KeySpaceState {
        KeySpaceState {
            keyspace: self.keyspace.clone(),
            entry_count: self.storage.len(),
            actions_processed: self.mailbox.messages_processed(),
            swept_total: self.swept_total,
        }
    }
}

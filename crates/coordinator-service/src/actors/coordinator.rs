//! `CoordinatorActor` - singleton supervisor for key-space actors.
//!
//! - Singleton per coordinator instance
//! - Spawns one `KeySpaceActor` per key-space on first use, up to a limit
//! - Routes each action to its key-space without awaiting the result, so
//!   distinct key-spaces progress in parallel
//! - Owns the root `CancellationToken`
//! - Detects finished key-space tasks (panics) and respawns on next use
//!
//! # Graceful Shutdown
//!
//! On shutdown the supervisor stops accepting actions, cancels every
//! key-space actor (each finishes its queued messages) and waits for them
//! up to the given deadline.

use crate::clock::SharedClock;
use crate::errors::CoordinatorError;
use crate::protocol::{Action, ActionOutput};
use crate::storage::StorageFactory;

use super::keyspace::{KeySpaceActor, KeySpaceActorHandle};
use super::messages::{
    ActionReply, CoordinatorMessage, CoordinatorStatus, KeySpaceMessage, KeySpaceState,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::KeySpaceId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Channel buffer size for the supervisor mailbox.
const COORDINATOR_CHANNEL_BUFFER: usize = 4096;

/// Deadline used when shutdown is triggered by cancellation alone.
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Instance identifier used in logs.
    pub instance_id: String,
    /// Upper bound on live key-space actors.
    pub max_keyspaces: usize,
    /// Period of each key-space's expiry sweep.
    pub sweep_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            instance_id: "coord-local".to_string(),
            max_keyspaces: 1024,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Handle to the `CoordinatorActor`.
///
/// This is the public interface for the actor system. Clones share the same
/// supervisor.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl CoordinatorHandle {
    /// Spawn the supervisor and return a handle to it.
    #[must_use]
    pub fn new(
        settings: CoordinatorSettings,
        storage_factory: StorageFactory,
        clock: SharedClock,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Coordinator,
            settings.instance_id.as_str(),
        ));

        let actor = CoordinatorActor {
            settings,
            receiver,
            cancel_token: cancel_token.clone(),
            keyspaces: HashMap::new(),
            accepting_new: true,
            shutdown_complete: false,
            storage_factory,
            clock,
            metrics,
            mailbox: Arc::clone(&mailbox),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            mailbox,
        }
    }

    async fn send(&self, message: CoordinatorMessage) -> Result<(), CoordinatorError> {
        self.mailbox.record_enqueue();
        self.sender.send(message).await.map_err(|e| {
            self.mailbox.cancel_enqueue();
            CoordinatorError::Internal(format!("channel send failed: {e}"))
        })
    }

    /// Execute an action against `keyspace`.
    ///
    /// # Errors
    ///
    /// Returns the action's own error, `CapacityExceeded` if the key-space
    /// cannot be admitted, or `Internal` if the actor system is unreachable
    /// or draining.
    pub async fn execute(
        &self,
        keyspace: KeySpaceId,
        action: Action,
    ) -> Result<ActionOutput, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::Execute {
            keyspace,
            action,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))?
    }

    /// State of a running key-space actor, or `None` if it is not running.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the actor system is unreachable.
    pub async fn keyspace_state(
        &self,
        keyspace: KeySpaceId,
    ) -> Result<Option<KeySpaceState>, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetKeySpace {
            keyspace,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))
    }

    /// Current supervisor status.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the actor system is unreachable.
    pub async fn status(&self) -> Result<CoordinatorStatus, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))
    }

    /// Gracefully shut down, waiting up to `deadline` for key-space actors.
    ///
    /// Resolves once the supervisor has finished shutting down.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the actor system is unreachable.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoordinatorMessage::Shutdown {
            deadline,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| CoordinatorError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor system (immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed key-space.
struct ManagedKeySpace {
    handle: KeySpaceActorHandle,
    task_handle: JoinHandle<()>,
    created_at: i64,
}

/// The `CoordinatorActor` implementation.
pub struct CoordinatorActor {
    settings: CoordinatorSettings,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    keyspaces: HashMap<KeySpaceId, ManagedKeySpace>,
    accepting_new: bool,
    /// Set once a `Shutdown` message has been fully handled.
    shutdown_complete: bool,
    storage_factory: StorageFactory,
    clock: SharedClock,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl CoordinatorActor {
    #[instrument(
        skip_all,
        name = "coord.actor.coordinator",
        fields(instance_id = %self.settings.instance_id)
    )]
    async fn run(mut self) {
        info!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            max_keyspaces = self.settings.max_keyspaces,
            "CoordinatorActor started"
        );

        loop {
            self.check_keyspace_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "coord.actor.coordinator",
                        instance_id = %self.settings.instance_id,
                        "CoordinatorActor received cancellation signal"
                    );
                    self.graceful_shutdown(DEFAULT_SHUTDOWN_DEADLINE).await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                            if self.shutdown_complete {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "coord.actor.coordinator",
                                instance_id = %self.settings.instance_id,
                                "CoordinatorActor channel closed, exiting"
                            );
                            self.graceful_shutdown(DEFAULT_SHUTDOWN_DEADLINE).await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            messages_processed = self.mailbox.messages_processed(),
            "CoordinatorActor stopped"
        );
    }

    async fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Execute {
                keyspace,
                action,
                respond_to,
            } => {
                self.route(keyspace, action, respond_to).await;
            }

            CoordinatorMessage::GetKeySpace {
                keyspace,
                respond_to,
            } => {
                self.get_keyspace(&keyspace, respond_to);
            }

            CoordinatorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            CoordinatorMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                self.graceful_shutdown(deadline).await;
                self.shutdown_complete = true;
                self.cancel_token.cancel();
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    /// Forward an action to its key-space actor.
    async fn route(&mut self, keyspace: KeySpaceId, action: Action, respond_to: ActionReply) {
        if !self.accepting_new {
            let _ = respond_to.send(Err(CoordinatorError::Internal(
                "coordinator is draining".to_string(),
            )));
            return;
        }

        let message = KeySpaceMessage::Execute { action, respond_to };

        let handle = match self.handle_for(&keyspace) {
            Ok(handle) => handle,
            Err(e) => {
                reject(message, e);
                return;
            }
        };

        let message = match handle.try_send(message) {
            Ok(()) => return,
            Err(TrySendError::Full(message)) => {
                reject(message, CoordinatorError::CapacityExceeded);
                return;
            }
            Err(TrySendError::Closed(message)) => message,
        };

        // The actor stopped between the health check and the send.
        warn!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            keyspace = %keyspace,
            "Key-space actor mailbox closed, respawning"
        );
        self.reap(&keyspace).await;

        match self.handle_for(&keyspace) {
            Ok(handle) => {
                if let Err(e) = handle.try_send(message) {
                    let message = match e {
                        TrySendError::Full(m) | TrySendError::Closed(m) => m,
                    };
                    reject(
                        message,
                        CoordinatorError::Internal("key-space actor unavailable".to_string()),
                    );
                }
            }
            Err(e) => reject(message, e),
        }
    }

    /// Handle for `keyspace`, spawning its actor if it is not running.
    fn handle_for(
        &mut self,
        keyspace: &KeySpaceId,
    ) -> Result<KeySpaceActorHandle, CoordinatorError> {
        if let Some(managed) = self.keyspaces.get(keyspace) {
            return Ok(managed.handle.clone());
        }

        if self.keyspaces.len() >= self.settings.max_keyspaces {
            warn!(
                target: "coord.actor.coordinator",
                instance_id = %self.settings.instance_id,
                max_keyspaces = self.settings.max_keyspaces,
                "Key-space limit reached, rejecting new key-space"
            );
            return Err(CoordinatorError::CapacityExceeded);
        }

        let storage = (self.storage_factory)(keyspace);
        let (handle, task_handle) = KeySpaceActor::spawn(
            keyspace.clone(),
            storage,
            Arc::clone(&self.clock),
            self.settings.sweep_interval,
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
        );

        self.keyspaces.insert(
            keyspace.clone(),
            ManagedKeySpace {
                handle: handle.clone(),
                task_handle,
                created_at: chrono::Utc::now().timestamp(),
            },
        );
        self.metrics.keyspace_created();

        info!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            keyspace = %keyspace,
            total_keyspaces = self.keyspaces.len(),
            "Key-space actor spawned"
        );

        Ok(handle)
    }

    /// Reply with the key-space's state without blocking the message loop.
    fn get_keyspace(
        &self,
        keyspace: &KeySpaceId,
        respond_to: oneshot::Sender<Option<KeySpaceState>>,
    ) {
        match self.keyspaces.get(keyspace) {
            Some(managed) => {
                let handle = managed.handle.clone();
                debug!(
                    target: "coord.actor.coordinator",
                    keyspace = %keyspace,
                    created_at = managed.created_at,
                    "Querying key-space state"
                );
                tokio::spawn(async move {
                    let _ = respond_to.send(handle.get_state().await.ok());
                });
            }
            None => {
                let _ = respond_to.send(None);
            }
        }
    }

    fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            keyspace_count: self.keyspaces.len(),
            messages_processed: self.metrics.messages_processed(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    async fn graceful_shutdown(&mut self, deadline: Duration) {
        info!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            keyspace_count = self.keyspaces.len(),
            deadline_secs = deadline.as_secs(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        for managed in self.keyspaces.values() {
            managed.handle.cancel();
        }

        let deadline_at = tokio::time::Instant::now() + deadline;
        for (keyspace, managed) in self.keyspaces.drain() {
            match tokio::time::timeout_at(deadline_at, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "coord.actor.coordinator",
                        keyspace = %keyspace,
                        "Key-space actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "coord.actor.coordinator",
                        keyspace = %keyspace,
                        error = ?e,
                        "Key-space actor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "coord.actor.coordinator",
                        keyspace = %keyspace,
                        "Key-space actor shutdown timed out"
                    );
                }
            }
            self.metrics.keyspace_removed();
        }

        info!(
            target: "coord.actor.coordinator",
            instance_id = %self.settings.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Remove key-space actors whose tasks have finished.
    async fn check_keyspace_health(&mut self) {
        let finished: Vec<KeySpaceId> = self
            .keyspaces
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(keyspace, _)| keyspace.clone())
            .collect();

        for keyspace in finished {
            warn!(
                target: "coord.actor.coordinator",
                instance_id = %self.settings.instance_id,
                keyspace = %keyspace,
                "Key-space actor task finished unexpectedly"
            );
            self.reap(&keyspace).await;
        }
    }

    /// Remove a key-space entry and record how its task ended.
    async fn reap(&mut self, keyspace: &KeySpaceId) {
        let Some(managed) = self.keyspaces.remove(keyspace) else {
            return;
        };

        managed.handle.cancel();
        match managed.task_handle.await {
            Ok(()) => {
                info!(
                    target: "coord.actor.coordinator",
                    keyspace = %keyspace,
                    "Key-space actor exited cleanly"
                );
            }
            Err(join_error) => {
                if join_error.is_panic() {
                    error!(
                        target: "coord.actor.coordinator",
                        instance_id = %self.settings.instance_id,
                        keyspace = %keyspace,
                        error = ?join_error,
                        "Key-space actor panicked; it will be respawned on next use"
                    );
                    self.metrics.record_panic(ActorType::KeySpace);
                }
            }
        }

        self.metrics.keyspace_removed();
    }
}

/// Reply to a message that could not be delivered.
fn reject(message: KeySpaceMessage, error: CoordinatorError) {
    match message {
        KeySpaceMessage::Execute { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        KeySpaceMessage::GetState { .. } => {}
    }
}

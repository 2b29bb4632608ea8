//! Message types for actor communication.
//!
//! Requests travel over `tokio::sync::mpsc`; replies come back on a
//! `tokio::sync::oneshot` carried inside the message.

use crate::errors::CoordinatorError;
use crate::protocol::{Action, ActionOutput};
use common::types::KeySpaceId;
use std::time::Duration;
use tokio::sync::oneshot;

/// Reply channel for an executed action.
pub type ActionReply = oneshot::Sender<Result<ActionOutput, CoordinatorError>>;

/// Messages sent to `CoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Route an action to the key-space actor, spawning it if needed.
    ///
    /// The supervisor forwards `respond_to` and does not wait for the result.
    Execute {
        keyspace: KeySpaceId,
        action: Action,
        respond_to: ActionReply,
    },

    /// Get the state of a live key-space actor (`None` if not running).
    GetKeySpace {
        keyspace: KeySpaceId,
        respond_to: oneshot::Sender<Option<KeySpaceState>>,
    },

    /// Get supervisor status (for readiness checks).
    GetStatus {
        respond_to: oneshot::Sender<CoordinatorStatus>,
    },

    /// Stop accepting actions and cancel every key-space actor.
    Shutdown {
        /// How long to wait for key-space actors to finish.
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), CoordinatorError>>,
    },
}

/// Messages sent to `KeySpaceActor`.
#[derive(Debug)]
pub enum KeySpaceMessage {
    /// Run one action to completion against this key-space's storage.
    Execute {
        action: Action,
        respond_to: ActionReply,
    },

    /// Get current key-space state (for debugging/health).
    GetState {
        respond_to: oneshot::Sender<KeySpaceState>,
    },
}

/// Snapshot of one key-space actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpaceState {
    pub keyspace: KeySpaceId,
    /// Entries held by storage, including any not yet swept.
    pub entry_count: usize,
    pub actions_processed: u64,
    /// Entries removed by the periodic sweep since start.
    pub swept_total: u64,
}

/// Snapshot of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub keyspace_count: usize,
    /// Messages processed across all actors.
    pub messages_processed: u64,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}

//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth thresholds:
//!
//! | Actor Type  | Normal | Warning   | Critical |
//! |-------------|--------|-----------|----------|
//! | Coordinator | < 500  | 500-2000  | > 2000   |
//! | KeySpace    | < 100  | 100-500   | > 500    |

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for the coordinator supervisor.
pub const COORDINATOR_MAILBOX_NORMAL: usize = 500;
pub const COORDINATOR_MAILBOX_WARNING: usize = 2000;

/// Mailbox depth thresholds for key-space actors.
pub const KEYSPACE_MAILBOX_NORMAL: usize = 100;
pub const KEYSPACE_MAILBOX_WARNING: usize = 500;

/// Actor type for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `CoordinatorActor` (singleton).
    Coordinator,
    /// `KeySpaceActor` (one per key-space).
    KeySpace,
}

impl ActorType {
    /// Returns the actor type as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Coordinator => "coordinator",
            ActorType::KeySpace => "keyspace",
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_WARNING,
            ActorType::KeySpace => KEYSPACE_MAILBOX_WARNING,
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Coordinator => COORDINATOR_MAILBOX_NORMAL,
            ActorType::KeySpace => KEYSPACE_MAILBOX_NORMAL,
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth for one actor.
///
/// Shared between a handle (which records enqueues as it sends) and the actor
/// (which records dequeues as it finishes each message), so depth reflects
/// messages actually waiting in the channel.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Actor identifier (instance id or key-space id).
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    /// Messages rejected because the channel was full.
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        prom::adjust_actor_mailbox_depth(self.actor_type.as_str(), 1.0);

        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        let level = self.level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "coord.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning
            && new_depth == self.actor_type.normal_threshold() + 1
        {
            // Once per crossing
            debug!(
                target: "coord.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message having been processed.
    pub fn record_dequeue(&self) {
        // Saturating: a message enqueued through a stale handle may be
        // processed after the monitor was reset.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)));
        prom::adjust_actor_mailbox_depth(self.actor_type.as_str(), -1.0);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo an enqueue whose send failed because the actor is gone.
    pub fn cancel_enqueue(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_sub(1)));
        prom::adjust_actor_mailbox_depth(self.actor_type.as_str(), -1.0);
    }

    /// Undo an enqueue rejected by a full mailbox, counting it as dropped.
    pub fn record_drop(&self) {
        self.cancel_enqueue();
        prom::record_message_dropped(self.actor_type.as_str());
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: "coord.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            dropped = self.messages_dropped.load(Ordering::Relaxed),
            "Message dropped due to backpressure"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth > self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Aggregated metrics for the actor system, shared by every actor.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    /// Key-space actors currently alive.
    pub active_keyspaces: AtomicUsize,
    /// Total actor panics (indicates bugs).
    pub actor_panics: AtomicU64,
    /// Total messages processed across all actors.
    pub total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keyspace_created(&self) {
        let count = self.active_keyspaces.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_keyspaces_active(count);
    }

    pub fn keyspace_removed(&self) {
        let count = self
            .active_keyspaces
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)))
            .map_or(0, |previous| previous.saturating_sub(1));
        prom::set_keyspaces_active(count);
    }

    /// Record an actor panic.
    pub fn record_panic(&self, actor_type: ActorType) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        prom::record_actor_panic(actor_type.as_str());
        tracing::error!(
            target: "coord.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = self.actor_panics.load(Ordering::Relaxed),
            "Actor panic detected - indicates bug, investigation required"
        );
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn keyspace_count(&self) -> usize {
        self.active_keyspaces.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.total_messages_processed.load(Ordering::Relaxed)
    }
}

//! Actor model for the coordinator.
//!
//! ```text
//! CoordinatorActor (singleton per instance)
//! └── supervises N KeySpaceActors
//!     └── KeySpaceActor (one per key-space)
//!         ├── owns that key-space's Storage
//!         └── runs the periodic expiry sweep
//! ```
//!
//! # Key Design Decisions
//!
//! - **One writer per key-space**: every action against a key-space runs inside
//!   its actor, one message at a time, so read-modify-write sequences need no
//!   locks or compare-and-swap
//! - **Forward, don't await**: the supervisor hands each action (with its reply
//!   channel) to the key-space mailbox and moves on
//! - **CancellationToken propagation**: key-space actors get child tokens of the
//!   supervisor's root token
//! - **Mailbox monitoring**: depth thresholds with metrics (KeySpace: 100/500)
//!
//! # Modules
//!
//! - [`coordinator`] - `CoordinatorActor` supervisor and its public handle
//! - [`keyspace`] - `KeySpaceActor`, exclusive owner of one storage
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod coordinator;
pub mod keyspace;
pub mod messages;
pub mod metrics;

pub use coordinator::{CoordinatorActor, CoordinatorHandle, CoordinatorSettings};
pub use keyspace::{KeySpaceActor, KeySpaceActorHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};

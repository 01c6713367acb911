// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! qsync core: keeps application state and the URL query string in step.
//!
//! Many independent consumers write per-key values; the engine batches them,
//! throttles the resulting history mutations, and fans committed URL changes
//! back out to every consumer.
//!
//! # Pieces
//!
//! - [`EventBus`]: synchronous topic registry. One reserved topic
//!   ([`Topic::UrlChanged`]) plus one topic per query key.
//! - [`UpdateQueue`]: pending per-key writes plus merged [`FlushOptions`].
//!   Enqueueing publishes the key's optimistic value immediately.
//! - Flush scheduler: a single task that owns the throttle timer and is the
//!   only place a history mutation is ever issued.
//! - [`QuerySync`]: the context handle consumers clone; `set`, `subscribe`,
//!   `peek`.
//!
//! # Invariants
//!
//! - At most one flush is in flight at any time.
//! - Flush start instants are at least `throttle` apart.
//! - Per-key events precede the URL-changed event of the flush committing them.
//! - A flush merges into the current URL; keys outside the batch are untouched.

use thiserror::Error;

pub mod bus;
pub mod memory;
pub mod options;
pub mod params;
pub mod port;
pub mod queue;
pub mod scheduler;
pub mod sync;

pub use bus::{EventBus, Handler, SubscriptionId, SyncEvent, Topic};
pub use memory::{MemoryHistory, NavigationRecord};
pub use options::{FlushOptions, HistoryMode};
pub use params::SearchParams;
pub use port::{NavigateOptions, NavigationError, Navigator, UrlReader};
pub use queue::{DrainedBatch, Pending, UpdateQueue};
pub use scheduler::{FlushState, SchedulerConfig, SchedulerStatus, DEFAULT_THROTTLE};
pub use sync::{PendingFlush, QuerySync};

/// Failure observed by a `set` caller awaiting its flush.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The navigation collaborator rejected the history mutation.
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    /// The scheduler task is gone (runtime shut down).
    #[error("flush scheduler is no longer running")]
    SchedulerClosed,
}

/// Result shared by every caller whose update landed in the same flush.
pub type FlushOutcome = Result<SearchParams, SyncError>;

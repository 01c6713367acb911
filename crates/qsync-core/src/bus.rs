// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Synchronous topic bus used for per-key fan-out and URL-change signals.
//!
//! # Dispatch rules
//!
//! - Handlers run synchronously inside [`EventBus::emit`], in registration
//!   order. Emitting to a topic without handlers drops the event.
//! - The registry lock is released before any handler runs; handlers may
//!   subscribe, unsubscribe, emit or enqueue updates re-entrantly. A handler
//!   added during an emit sees the next emit, not the current one.
//! - A panicking handler is caught and logged; the remaining handlers still
//!   run (fail-open).

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::params::SearchParams;

/// Bus topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Reserved: the URL was committed or changed externally.
    UrlChanged,
    /// A query key's value changed (optimistically, before commit).
    Key(String),
}

impl Topic {
    /// Topic for a query key.
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlChanged => f.write_str("<url-changed>"),
            Self::Key(k) => write!(f, "key:{k}"),
        }
    }
}

/// Payload delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Optimistic per-key value; `None` means the key is being removed.
    KeyChanged {
        /// Query key.
        key: String,
        /// Serialized value.
        value: Option<String>,
    },
    /// Parameters now present in the URL.
    UrlChanged {
        /// Committed parameters.
        params: SearchParams,
    },
}

/// Subscriber callback.
pub type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Identity of one registration, returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    topics: RwLock<HashMap<Topic, Vec<Entry>>>,
    next_id: AtomicU64,
}

/// Process-wide topic registry. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Registry>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self
            .inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("topics", &topics.len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on `topic`.
    pub fn on<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut topics = self
            .inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        topics.entry(topic).or_default().push(Entry {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove the registration `id` from `topic`; returns whether it existed.
    pub fn off(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let mut topics = self
            .inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = topics.get_mut(topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Deliver `event` to every handler currently registered on `topic`.
    pub fn emit(&self, topic: &Topic, event: &SyncEvent) {
        let handlers: Vec<Handler> = {
            let topics = self
                .inner
                .topics
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match topics.get(topic) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => return,
            }
        };
        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(%topic, "bus handler panicked; continuing with remaining handlers");
            }
        }
    }

    /// Number of handlers registered on `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }
}

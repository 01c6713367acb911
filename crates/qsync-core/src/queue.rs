// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Staging area for updates that have not reached the URL yet.
//!
//! The queue holds one pending value per key (last write wins) and the merged
//! [`FlushOptions`] of everything queued since the last drain. It is the
//! source of truth for *pending* reads; the URL is the source of truth for
//! *committed* reads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::{EventBus, SyncEvent, Topic};
use crate::options::FlushOptions;

/// Result of [`UpdateQueue::peek`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Nothing queued for the key.
    NotPending,
    /// Queued value; `None` is a pending removal.
    Value(Option<String>),
}

impl Pending {
    /// Whether a value is queued.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Everything removed by one [`UpdateQueue::drain_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedBatch {
    /// Key to serialized value (`None` removes the key).
    pub updates: BTreeMap<String, Option<String>>,
    /// Merged options of every update in the batch.
    pub options: FlushOptions,
    /// Highest enqueue sequence number included in this batch.
    pub through_seq: u64,
}

impl DrainedBatch {
    /// Whether the batch carries no updates.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Updates as borrowed pairs, suitable for [`SearchParams::apply`](crate::SearchParams::apply).
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.updates
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    updates: BTreeMap<String, Option<String>>,
    options: Option<FlushOptions>,
    last_seq: u64,
}

/// Shared pending-update map. Cloning yields another handle to the same queue.
#[derive(Debug, Clone)]
pub struct UpdateQueue {
    state: Arc<Mutex<QueueState>>,
    bus: EventBus,
}

impl UpdateQueue {
    /// Create an empty queue publishing optimistic values on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            bus,
        }
    }

    /// Stage `value` for `key`, merge `options` into the batch and publish the
    /// value on the key's topic. Returns the update's sequence number.
    ///
    /// The event is emitted after the queue lock is released, so handlers can
    /// enqueue again without corrupting the batch.
    pub fn enqueue(&self, key: &str, value: Option<String>, options: FlushOptions) -> u64 {
        let seq = {
            let mut state = self.lock();
            state.updates.insert(key.to_owned(), value.clone());
            state.options = Some(match state.options {
                Some(merged) => merged.merge(options),
                None => options,
            });
            state.last_seq += 1;
            state.last_seq
        };
        tracing::debug!(key, ?value, seq, "queued update");
        self.bus.emit(
            &Topic::key(key),
            &SyncEvent::KeyChanged {
                key: key.to_owned(),
                value,
            },
        );
        seq
    }

    /// Remove and return every pending update with the merged options.
    pub fn drain_all(&self) -> DrainedBatch {
        let mut state = self.lock();
        DrainedBatch {
            updates: std::mem::take(&mut state.updates),
            options: state.options.take().unwrap_or_default(),
            through_seq: state.last_seq,
        }
    }

    /// Pending value for `key`.
    pub fn peek(&self, key: &str) -> Pending {
        self.lock()
            .updates
            .get(key)
            .map_or(Pending::NotPending, |v| Pending::Value(v.clone()))
    }

    /// Merged options of the current batch, if anything is queued.
    pub fn pending_options(&self) -> Option<FlushOptions> {
        self.lock().options
    }

    /// Number of keys pending.
    pub fn len(&self) -> usize {
        self.lock().updates.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().updates.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::options::HistoryMode;
    use std::time::Duration;

    #[test]
    fn later_enqueue_overwrites_same_key() {
        let q = UpdateQueue::new(EventBus::new());
        q.enqueue("page", Some("1".into()), FlushOptions::default());
        q.enqueue("page", Some("2".into()), FlushOptions::default());
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek("page"), Pending::Value(Some("2".into())));
        assert_eq!(q.peek("other"), Pending::NotPending);
    }

    #[test]
    fn drain_returns_merged_options_and_empties() {
        let q = UpdateQueue::new(EventBus::new());
        q.enqueue("a", Some("1".into()), FlushOptions::default().push());
        q.enqueue(
            "b",
            None,
            FlushOptions::default().throttle(Duration::from_millis(10)),
        );
        let batch = q.drain_all();
        assert_eq!(batch.through_seq, 2);
        assert_eq!(batch.options.history, HistoryMode::Push);
        assert_eq!(batch.options.throttle, Some(Duration::from_millis(10)));
        assert_eq!(batch.updates.get("b"), Some(&None));
        assert!(q.is_empty());
        assert!(q.pending_options().is_none());
        assert!(q.drain_all().is_empty());
    }

    #[test]
    fn enqueue_publishes_optimistic_value() {
        let bus = EventBus::new();
        let q = UpdateQueue::new(bus.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.on(Topic::key("q"), move |e| s.lock().unwrap().push(e.clone()));
        q.enqueue("q", Some("rust".into()), FlushOptions::default());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SyncEvent::KeyChanged {
                key: "q".into(),
                value: Some("rust".into())
            }]
        );
    }

    #[test]
    fn handler_can_enqueue_reentrantly() {
        let bus = EventBus::new();
        let q = UpdateQueue::new(bus.clone());
        let inner = q.clone();
        bus.on(Topic::key("a"), move |_| {
            inner.enqueue("b", Some("derived".into()), FlushOptions::default());
        });
        q.enqueue("a", Some("1".into()), FlushOptions::default());
        let batch = q.drain_all();
        assert_eq!(batch.updates.len(), 2);
        assert_eq!(batch.through_seq, 2);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed view of one query key.
//!
//! A [`QueryState`] is what a UI component holds for a key it manages. It is
//! mounted on a [`QuerySync`] context and keeps a cached, parsed value that
//! follows:
//!
//! 1. the pending queue, via the key's optimistic events, and
//! 2. the committed URL, via URL-changed events, unless a write for the key
//!    is still queued.
//!
//! Several states may mount the same key; writes through one are visible in
//! all others before the URL itself changes. Dropping the state unmounts it.

use std::fmt;
use std::sync::Arc;

use qsync_codec::{safe_parse, Parser};
use qsync_core::{FlushOptions, Pending, PendingFlush, QuerySync, SubscriptionId, SyncEvent, Topic};
use tokio::sync::watch;
use tracing::debug;

/// Parsed, cached value of one query key.
pub struct QueryState<P: Parser> {
    sync: QuerySync,
    key: String,
    parser: Arc<P>,
    default: Option<P::Value>,
    options: FlushOptions,
    clear_on_default: bool,
    value: Arc<watch::Sender<Option<P::Value>>>,
    subscriptions: Vec<(Topic, SubscriptionId)>,
}

impl<P: Parser> fmt::Debug for QueryState<P>
where
    P::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("key", &self.key)
            .field("value", &*self.value.borrow())
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl<P: Parser> QueryState<P> {
    /// Mount a consumer of `key` on `sync`.
    ///
    /// The initial value comes from the queue if an update is pending,
    /// otherwise from the URL. Unparsable values read as absent.
    pub fn mount(sync: &QuerySync, key: impl Into<String>, parser: P) -> Self {
        let key = key.into();
        let parser = Arc::new(parser);
        let (tx, _) = watch::channel(None);
        let value = Arc::new(tx);

        let on_key = {
            let (parser, value, key) = (Arc::clone(&parser), Arc::clone(&value), key.clone());
            sync.subscribe(Topic::key(key.clone()), move |event| {
                if let SyncEvent::KeyChanged { value: raw, .. } = event {
                    store(&*parser, &value, &key, raw.as_deref());
                }
            })
        };
        let on_url = {
            let (parser, value, key) = (Arc::clone(&parser), Arc::clone(&value), key.clone());
            let queue = sync.queue().clone();
            sync.subscribe(Topic::UrlChanged, move |event| {
                if let SyncEvent::UrlChanged { params } = event {
                    // A queued write still outranks the committed URL.
                    match queue.peek(&key) {
                        Pending::Value(raw) => store(&*parser, &value, &key, raw.as_deref()),
                        Pending::NotPending => store(&*parser, &value, &key, params.get(&key)),
                    }
                }
            })
        };

        // Subscribed first so nothing published during the initial read is lost.
        let initial = match sync.peek(&key) {
            Pending::Value(raw) => raw,
            Pending::NotPending => sync.search_params().get(&key).map(str::to_owned),
        };
        store(&*parser, &value, &key, initial.as_deref());
        debug!(%key, pending = sync.peek(&key).is_pending(), "query state mounted");

        Self {
            sync: sync.clone(),
            subscriptions: vec![(Topic::key(key.clone()), on_key), (Topic::UrlChanged, on_url)],
            key,
            parser,
            default: None,
            options: FlushOptions::default(),
            clear_on_default: false,
            value,
        }
    }

    /// Value reported by [`get`](Self::get) while the key is absent.
    pub fn with_default(mut self, default: P::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Options attached to every update made through this state.
    pub fn with_options(mut self, options: FlushOptions) -> Self {
        self.options = options;
        self
    }

    /// Remove the key from the URL when set to the default value.
    pub fn clear_on_default(mut self, clear: bool) -> Self {
        self.clear_on_default = clear;
        self
    }

    /// Query key managed by this state.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, falling back to the default.
    pub fn get(&self) -> Option<P::Value> {
        self.value.borrow().clone().or_else(|| self.default.clone())
    }

    /// Current value ignoring the default; `None` means absent from the URL.
    pub fn raw_value(&self) -> Option<P::Value> {
        self.value.borrow().clone()
    }

    /// Receiver notified whenever the cached value changes.
    pub fn watch(&self) -> watch::Receiver<Option<P::Value>> {
        self.value.subscribe()
    }

    /// Write `value` (`None` removes the key). Every state mounted on the
    /// same key observes the new value before this returns.
    pub fn set(&self, value: Option<P::Value>) -> PendingFlush {
        let raw = value.and_then(|v| {
            let is_default = self
                .default
                .as_ref()
                .is_some_and(|d| self.parser.values_equal(d, &v));
            if self.clear_on_default && is_default {
                None
            } else {
                Some(self.parser.serialize(&v))
            }
        });
        self.sync.set(&self.key, raw, self.options)
    }

    /// Functional update from the current value (pending writes included).
    pub fn update<F>(&self, f: F) -> PendingFlush
    where
        F: FnOnce(Option<P::Value>) -> Option<P::Value>,
    {
        self.set(f(self.get()))
    }

    /// Remove the key from the URL.
    pub fn clear(&self) -> PendingFlush {
        self.set(None)
    }
}

impl<P: Parser> Drop for QueryState<P> {
    fn drop(&mut self) {
        for (topic, id) in self.subscriptions.drain(..) {
            self.sync.unsubscribe(&topic, id);
        }
        debug!(key = %self.key, "query state unmounted");
    }
}

fn store<P: Parser>(
    parser: &P,
    value: &watch::Sender<Option<P::Value>>,
    key: &str,
    raw: Option<&str>,
) {
    let next = raw.and_then(|raw| safe_parse(parser, key, raw));
    value.send_if_modified(|current| {
        let same = match (current.as_ref(), next.as_ref()) {
            (Some(a), Some(b)) => parser.values_equal(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            current.clone_from(&next);
        }
        !same
    });
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use qsync_codec::{integer, iso_date, string};
    use qsync_core::{FlushState, MemoryHistory, SchedulerConfig, SearchParams};
    use std::time::Duration;

    fn engine(initial: &str) -> (Arc<MemoryHistory>, QuerySync) {
        let history = Arc::new(MemoryHistory::new(SearchParams::parse(initial)));
        let sync = QuerySync::spawn(Arc::clone(&history), SchedulerConfig::default());
        (history, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn initial_value_comes_from_url_and_bad_values_read_as_absent() {
        let (_h, sync) = engine("page=3&limit=lots");
        let page = QueryState::mount(&sync, "page", integer());
        let limit = QueryState::mount(&sync, "limit", integer()).with_default(20);
        assert_eq!(page.get(), Some(3));
        assert_eq!(limit.get(), Some(20));
        assert_eq!(limit.raw_value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sibling_sees_optimistic_value_before_commit() {
        let (history, sync) = engine("");
        let writer = QueryState::mount(&sync, "q", string());
        let reader = QueryState::mount(&sync, "q", string());
        let pending = writer.set(Some("rust".into()));
        assert_eq!(reader.get().as_deref(), Some("rust"));
        assert!(history.navigations().is_empty());
        pending.await.unwrap();
        assert_eq!(sync.search_params().get("q"), Some("rust"));
    }

    #[tokio::test(start_paused = true)]
    async fn mount_after_enqueue_reads_pending_value() {
        let (_h, sync) = engine("q=old");
        let writer = QueryState::mount(&sync, "q", string());
        let pending = writer.set(Some("new".into()));
        let late = QueryState::mount(&sync, "q", string());
        assert_eq!(late.get().as_deref(), Some("new"));
        pending.await.unwrap();
        assert_eq!(late.get().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_on_default_removes_key() {
        let (_h, sync) = engine("page=2");
        let page = QueryState::mount(&sync, "page", integer())
            .with_default(1)
            .clear_on_default(true);
        let url = page.set(Some(1)).await.unwrap();
        assert!(!url.contains("page"));
        assert_eq!(page.get(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn update_chains_on_pending_value() {
        let (_h, sync) = engine("");
        let count = QueryState::mount(&sync, "n", integer()).with_default(0);
        let first = count.update(|n| n.map(|n| n + 1));
        let second = count.update(|n| n.map(|n| n + 1));
        first.await.unwrap();
        let url = second.await.unwrap();
        assert_eq!(url.get("n"), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn external_navigation_resyncs_consumers() {
        let (history, sync) = engine("");
        let day = QueryState::mount(&sync, "day", iso_date())
            .with_options(FlushOptions::default().push());
        day.set(Some(time::macros::date!(2024 - 05 - 01)))
            .await
            .unwrap();
        day.set(Some(time::macros::date!(2024 - 05 - 02)))
            .await
            .unwrap();
        let mut changes = day.watch();
        assert!(history.back());
        sync.reconcile();
        changes.changed().await.unwrap();
        assert_eq!(day.get(), Some(time::macros::date!(2024 - 05 - 01)));
    }

    #[tokio::test(start_paused = true)]
    async fn write_queued_during_flight_survives_earlier_commit() {
        let history = Arc::new(
            MemoryHistory::new(SearchParams::new()).with_latency(Duration::from_millis(30)),
        );
        let sync = QuerySync::spawn(Arc::clone(&history), SchedulerConfig::default());
        let a = QueryState::mount(&sync, "a", string());
        let b = QueryState::mount(&sync, "b", string());

        let first = a.set(Some("1".into()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = b.set(Some("2".into()));

        let url = first.await.unwrap();
        assert_eq!(url.get("b"), None);
        assert!(sync.peek("b").is_pending());
        assert_eq!(b.get().as_deref(), Some("2"));

        let url = second.await.unwrap();
        assert_eq!(url.get("b"), Some("2"));
        assert_eq!(b.get().as_deref(), Some("2"));
        assert_eq!(history.navigations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_keeps_scheduled_write() {
        let (_h, sync) = engine("q=old");
        let q = QueryState::mount(&sync, "q", string());
        q.set(Some("x".into())).await.unwrap();

        let pending = q.set(Some("new".into()));
        sync.reconcile();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(matches!(sync.status().state, FlushState::Scheduled { .. }));
        assert_eq!(q.get().as_deref(), Some("new"));

        let url = pending.await.unwrap();
        assert_eq!(url.get("q"), Some("new"));
        assert_eq!(q.get().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_removal_survives_url_event() {
        let (_h, sync) = engine("q=old");
        let q = QueryState::mount(&sync, "q", string());
        q.set(Some("x".into())).await.unwrap();
        let pending = q.clear();
        sync.reconcile();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(q.get(), None);
        assert_eq!(pending.await.unwrap().get("q"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_state_unsubscribes() {
        let (_h, sync) = engine("");
        let state = QueryState::mount(&sync, "q", string());
        assert_eq!(sync.bus().subscriber_count(&Topic::key("q")), 1);
        drop(state);
        assert_eq!(sync.bus().subscriber_count(&Topic::key("q")), 0);
        assert_eq!(sync.bus().subscriber_count(&Topic::UrlChanged), 0);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The shared synchronization context handed to every consumer.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, watch};

use crate::bus::{EventBus, SubscriptionId, SyncEvent, Topic};
use crate::options::FlushOptions;
use crate::params::SearchParams;
use crate::port::{Navigator, UrlReader};
use crate::queue::{Pending, UpdateQueue};
use crate::scheduler::{Command, FlushScheduler, SchedulerConfig, SchedulerStatus};
use crate::{FlushOutcome, SyncError};

/// Handle to one application's queue, bus and flush scheduler.
///
/// Construct once at startup with [`QuerySync::spawn`] and clone into each
/// consumer; clones share all state. The scheduler task stops after the last
/// clone is dropped, flushing anything still queued.
#[derive(Clone)]
pub struct QuerySync {
    queue: UpdateQueue,
    bus: EventBus,
    reader: Arc<dyn UrlReader>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SchedulerStatus>,
}

impl fmt::Debug for QuerySync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySync")
            .field("pending", &self.queue.len())
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl QuerySync {
    /// Start the engine over a host that both reads and mutates the URL.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<H>(host: Arc<H>, config: SchedulerConfig) -> Self
    where
        H: Navigator + UrlReader,
    {
        let reader: Arc<dyn UrlReader> = host.clone();
        Self::spawn_with(host, reader, config)
    }

    /// Start the engine with separate navigation and read ports.
    pub fn spawn_with<N: Navigator>(
        navigator: Arc<N>,
        reader: Arc<dyn UrlReader>,
        config: SchedulerConfig,
    ) -> Self {
        let bus = EventBus::new();
        let queue = UpdateQueue::new(bus.clone());
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SchedulerStatus::default());
        let scheduler = FlushScheduler::new(
            queue.clone(),
            bus.clone(),
            navigator,
            Arc::clone(&reader),
            config,
            status_tx,
        );
        tokio::spawn(scheduler.run(rx));
        Self {
            queue,
            bus,
            reader,
            commands,
            status,
        }
    }

    /// Stage `value` for `key` (`None` removes it) and request a flush.
    ///
    /// The update is queued and its optimistic event published before this
    /// returns; the returned future only waits for the commit. Dropping it
    /// does not cancel the flush.
    pub fn set(&self, key: &str, value: Option<String>, options: FlushOptions) -> PendingFlush {
        let seq = self.queue.enqueue(key, value, options);
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Flush { seq, reply }).is_err() {
            tracing::warn!(key, "update queued but the flush scheduler is gone");
        }
        PendingFlush { rx }
    }

    /// Re-read the URL after it changed outside the engine (back/forward) and
    /// publish it to every consumer. Never overlaps an in-flight flush.
    pub fn reconcile(&self) {
        if self.commands.send(Command::Reconcile).is_err() {
            tracing::warn!("reconcile requested but the flush scheduler is gone");
        }
    }

    /// Register `handler` on `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.bus.on(topic, handler)
    }

    /// Remove a registration made with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) -> bool {
        self.bus.off(topic, id)
    }

    /// Value queued for `key` but not yet committed.
    pub fn peek(&self, key: &str) -> Pending {
        self.queue.peek(key)
    }

    /// Committed parameters currently in the URL.
    pub fn search_params(&self) -> SearchParams {
        self.reader.search_params()
    }

    /// Latest scheduler status.
    pub fn status(&self) -> SchedulerStatus {
        *self.status.borrow()
    }

    /// Watch channel following scheduler transitions.
    pub fn watch_status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// The shared event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The shared update queue.
    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }
}

/// Completion of the flush that carries one `set` call.
///
/// Every caller whose update landed in the same flush resolves with the same
/// outcome.
#[derive(Debug)]
pub struct PendingFlush {
    rx: oneshot::Receiver<FlushOutcome>,
}

impl Future for PendingFlush {
    type Output = FlushOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(SyncError::SchedulerClosed)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_flush_reports_closed_scheduler() {
        let (reply, rx) = oneshot::channel::<FlushOutcome>();
        drop(reply);
        assert_eq!(PendingFlush { rx }.await, Err(SyncError::SchedulerClosed));
    }
}

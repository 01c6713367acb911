// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Throttled flush scheduler.
//!
//! A single task owns the scheduler state and is the only caller of
//! [`Navigator::navigate`]. Callers talk to it through [`Command`]s; the
//! pending data itself lives in the shared [`UpdateQueue`].
//!
//! ```text
//!            request, throttle elapsed
//!   Idle ─────────────────────────────────────▶ InFlight
//!    │  request, inside throttle window            ▲   │ settled
//!    ▼                                             │   ▼
//!   Scheduled ──────── deadline reached ──────────┘  Idle
//! ```
//!
//! - The deadline of a scheduled flush is never pushed back by later
//!   requests, so a burst cannot starve the flush. A later request with a
//!   smaller throttle may pull it earlier.
//! - The throttle window is measured from the instant the previous flush
//!   settled, which keeps flush *starts* at least `throttle` apart.
//! - Requests received while a navigation is in flight are handled after it
//!   settles and form the next batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, instrument, warn};

use crate::bus::{EventBus, SyncEvent, Topic};
use crate::params::SearchParams;
use crate::port::{NavigateOptions, Navigator, UrlReader};
use crate::queue::UpdateQueue;
use crate::{FlushOutcome, SyncError};

/// Flush spacing used when no update in a batch requests one.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Spacing applied to batches whose updates do not specify a throttle.
    pub default_throttle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_throttle: DEFAULT_THROTTLE,
        }
    }
}

/// Scheduler state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    /// Nothing pending or in flight.
    #[default]
    Idle,
    /// Waiting out the throttle window.
    Scheduled {
        /// Instant the flush will start.
        deadline: Instant,
    },
    /// A navigation has been issued and not settled yet.
    InFlight,
}

/// Snapshot published by the scheduler task after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStatus {
    /// Current state.
    pub state: FlushState,
    /// Navigations issued so far.
    pub flushes: u64,
}

/// Messages accepted by the scheduler task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Flush the update numbered `seq` and report the outcome on `reply`.
    Flush {
        seq: u64,
        reply: oneshot::Sender<FlushOutcome>,
    },
    /// The URL changed outside the engine; re-publish it.
    Reconcile,
}

pub(crate) struct FlushScheduler<N> {
    queue: UpdateQueue,
    bus: EventBus,
    navigator: Arc<N>,
    reader: Arc<dyn UrlReader>,
    config: SchedulerConfig,
    status: watch::Sender<SchedulerStatus>,
    state: FlushState,
    /// Settlement instant of the previous flush.
    origin: Option<Instant>,
    waiters: Vec<oneshot::Sender<FlushOutcome>>,
    committed_seq: u64,
    last_outcome: Option<FlushOutcome>,
    flushes: u64,
}

impl<N: Navigator> FlushScheduler<N> {
    pub(crate) fn new(
        queue: UpdateQueue,
        bus: EventBus,
        navigator: Arc<N>,
        reader: Arc<dyn UrlReader>,
        config: SchedulerConfig,
        status: watch::Sender<SchedulerStatus>,
    ) -> Self {
        Self {
            queue,
            bus,
            navigator,
            reader,
            config,
            status,
            state: FlushState::Idle,
            origin: None,
            waiters: Vec::new(),
            committed_seq: 0,
            last_outcome: None,
            flushes: 0,
        }
    }

    /// Task body. Returns once every command sender is gone, after flushing
    /// anything still queued.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = match self.state {
                FlushState::Scheduled { deadline } => Some(deadline),
                FlushState::Idle | FlushState::InFlight => None,
            };
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.commit().await;
                }
            }
        }
        if !self.queue.is_empty() {
            debug!("scheduler shutting down with pending updates; flushing");
            if let FlushState::Scheduled { deadline } = self.state {
                time::sleep_until(deadline).await;
            }
            self.commit().await;
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Flush { seq, reply } => {
                if seq <= self.committed_seq {
                    if let Some(outcome) = &self.last_outcome {
                        let _ = reply.send(outcome.clone());
                        return;
                    }
                }
                self.waiters.push(reply);
                self.request().await;
            }
            Command::Reconcile => {
                let params = self.reader.search_params();
                debug!(%params, "reconciling external URL change");
                self.bus
                    .emit(&Topic::UrlChanged, &SyncEvent::UrlChanged { params });
            }
        }
    }

    async fn request(&mut self) {
        let throttle = self
            .queue
            .pending_options()
            .unwrap_or_default()
            .effective_throttle(self.config.default_throttle);
        let eligible_at = self.origin.map(|origin| origin + throttle);
        match self.state {
            FlushState::Scheduled { deadline } => {
                if let Some(at) = eligible_at.filter(|at| *at < deadline) {
                    self.set_state(FlushState::Scheduled { deadline: at });
                }
            }
            // Commands are not read while a navigation is awaited.
            FlushState::InFlight => {}
            FlushState::Idle => match eligible_at {
                Some(at) if Instant::now() < at => {
                    debug!(?throttle, "flush deferred by throttle");
                    self.set_state(FlushState::Scheduled { deadline: at });
                }
                _ => {
                    // Let updates issued in the same tick join this batch.
                    tokio::task::yield_now().await;
                    self.commit().await;
                }
            },
        }
    }

    #[instrument(level = "debug", skip(self), fields(flush = self.flushes + 1))]
    async fn commit(&mut self) {
        let batch = self.queue.drain_all();
        let waiters = std::mem::take(&mut self.waiters);
        if batch.is_empty() {
            self.set_state(FlushState::Idle);
            let params = self.reader.search_params();
            for waiter in waiters {
                let _ = waiter.send(Ok(params.clone()));
            }
            return;
        }

        self.flushes += 1;
        self.set_state(FlushState::InFlight);
        let mut params = self.reader.search_params();
        params.apply(batch.pairs());
        let options = NavigateOptions {
            scroll: batch.options.scroll,
            shallow: batch.options.shallow,
        };
        debug!(%params, history = ?batch.options.history, keys = batch.updates.len(), "navigating");
        let result = self
            .navigator
            .navigate(&params, batch.options.history, options)
            .await;

        self.origin = Some(Instant::now());
        self.committed_seq = batch.through_seq;
        let (outcome, committed): (FlushOutcome, SearchParams) = match result {
            Ok(()) => (Ok(params.clone()), params),
            Err(err) => {
                warn!(%err, "navigation failed; reconciling consumers with current URL");
                (Err(SyncError::Navigation(err)), self.reader.search_params())
            }
        };
        self.last_outcome = Some(outcome.clone());
        self.set_state(FlushState::Idle);

        self.bus.emit(
            &Topic::UrlChanged,
            &SyncEvent::UrlChanged { params: committed },
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn set_state(&mut self, state: FlushState) {
        self.state = state;
        self.status.send_replace(SchedulerStatus {
            state,
            flushes: self.flushes,
        });
    }
}

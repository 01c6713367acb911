// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory browsing history implementing both host ports.
//!
//! [`MemoryHistory`] stands in for a browser: it keeps a stack of entries with
//! a cursor, honors push vs replace, can simulate navigation latency and
//! rejection, and records every navigation it is asked to perform.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::options::HistoryMode;
use crate::params::SearchParams;
use crate::port::{NavigateOptions, NavigationError, Navigator, UrlReader};

/// One call received by [`MemoryHistory::navigate`](Navigator::navigate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRecord {
    /// Instant the call started.
    pub started: Instant,
    /// Requested parameters.
    pub params: SearchParams,
    /// Requested history mode.
    pub mode: HistoryMode,
    /// Requested flags.
    pub options: NavigateOptions,
    /// Whether the call was rejected.
    pub rejected: bool,
}

#[derive(Debug)]
struct HistoryState {
    entries: Vec<SearchParams>,
    cursor: usize,
    log: Vec<NavigationRecord>,
    reject_next: Option<String>,
}

/// Simulated browser history.
#[derive(Debug)]
pub struct MemoryHistory {
    state: Mutex<HistoryState>,
    latency: Duration,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(SearchParams::new())
    }
}

impl MemoryHistory {
    /// History with a single entry holding `initial`.
    pub fn new(initial: SearchParams) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                entries: vec![initial],
                cursor: 0,
                log: Vec::new(),
                reject_next: None,
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every navigation by `latency` before it settles.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next navigation fail with `reason`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.lock().reject_next = Some(reason.into());
    }

    /// Every navigation requested so far.
    pub fn navigations(&self) -> Vec<NavigationRecord> {
        self.lock().log.clone()
    }

    /// Number of entries in the stack.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the stack is empty (never true; kept for API symmetry).
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Move the cursor back one entry; returns whether it moved.
    ///
    /// Like a browser's back button this changes the URL without going through
    /// the engine; callers follow up with `QuerySync::reconcile`.
    pub fn back(&self) -> bool {
        let mut state = self.lock();
        if state.cursor == 0 {
            return false;
        }
        state.cursor -= 1;
        true
    }

    /// Move the cursor forward one entry; returns whether it moved.
    pub fn forward(&self) -> bool {
        let mut state = self.lock();
        if state.cursor + 1 >= state.entries.len() {
            return false;
        }
        state.cursor += 1;
        true
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for MemoryHistory {
    async fn navigate(
        &self,
        params: &SearchParams,
        mode: HistoryMode,
        options: NavigateOptions,
    ) -> Result<(), NavigationError> {
        let rejection = {
            let mut state = self.lock();
            let rejection = state.reject_next.take();
            state.log.push(NavigationRecord {
                started: Instant::now(),
                params: params.clone(),
                mode,
                options,
                rejected: rejection.is_some(),
            });
            rejection
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(reason) = rejection {
            return Err(NavigationError::new(reason));
        }
        let mut state = self.lock();
        match mode {
            HistoryMode::Push => {
                let keep = state.cursor + 1;
                state.entries.truncate(keep);
                state.entries.push(params.clone());
                state.cursor = keep;
            }
            HistoryMode::Replace => {
                let cursor = state.cursor;
                state.entries[cursor] = params.clone();
            }
        }
        Ok(())
    }
}

impl UrlReader for MemoryHistory {
    fn search_params(&self) -> SearchParams {
        let state = self.lock();
        state.entries[state.cursor].clone()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn push_truncates_forward_entries() {
        let h = MemoryHistory::new(SearchParams::parse("a=1"));
        let opts = NavigateOptions::default();
        h.navigate(&SearchParams::parse("a=2"), HistoryMode::Push, opts)
            .await
            .unwrap();
        h.navigate(&SearchParams::parse("a=3"), HistoryMode::Push, opts)
            .await
            .unwrap();
        assert!(h.back());
        h.navigate(&SearchParams::parse("a=4"), HistoryMode::Push, opts)
            .await
            .unwrap();
        assert_eq!(h.len(), 3);
        assert!(!h.forward());
        assert_eq!(h.search_params(), SearchParams::parse("a=4"));
    }

    #[tokio::test(start_paused = true)]
    async fn replace_overwrites_and_rejection_leaves_url_alone() {
        let h = MemoryHistory::new(SearchParams::parse("a=1"));
        let opts = NavigateOptions::default();
        h.navigate(&SearchParams::parse("a=2"), HistoryMode::Replace, opts)
            .await
            .unwrap();
        assert_eq!(h.len(), 1);
        h.reject_next("rate limited");
        let err = h
            .navigate(&SearchParams::parse("a=3"), HistoryMode::Replace, opts)
            .await
            .unwrap_err();
        assert_eq!(err.reason, "rate limited");
        assert_eq!(h.search_params(), SearchParams::parse("a=2"));
        assert!(h.navigations()[1].rejected);
    }
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-update options and their batch merge.
//!
//! Every update carries a [`FlushOptions`]; all updates landing in one flush
//! are folded with [`FlushOptions::merge`]. The fold is associative and
//! commutative, so the merged result never depends on arrival order:
//!
//! | field      | merge          |
//! |------------|----------------|
//! | `history`  | `Push` if any  |
//! | `scroll`   | OR             |
//! | `shallow`  | AND            |
//! | `throttle` | minimum of the `Some` values |

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a flush writes into the browsing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Overwrite the current entry.
    #[default]
    Replace,
    /// Create a new navigable entry.
    Push,
}

impl HistoryMode {
    /// `Push` wins: it is the mode that loses no history.
    pub fn merge(self, other: Self) -> Self {
        if self == Self::Push || other == Self::Push {
            Self::Push
        } else {
            Self::Replace
        }
    }
}

/// Options attached to an update, and the merged options of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    /// History mode for the navigation.
    pub history: HistoryMode,
    /// Restore scroll position after navigating.
    pub scroll: bool,
    /// Skip data refetching side effects of the navigation.
    pub shallow: bool,
    /// Minimum spacing between flushes; `None` uses the scheduler default.
    pub throttle: Option<Duration>,
}

impl Default for FlushOptions {
    /// Merge identity: replace, no scroll, shallow, scheduler throttle.
    fn default() -> Self {
        Self {
            history: HistoryMode::Replace,
            scroll: false,
            shallow: true,
            throttle: None,
        }
    }
}

impl FlushOptions {
    /// Request a new history entry.
    pub fn push(mut self) -> Self {
        self.history = HistoryMode::Push;
        self
    }

    /// Set the history mode.
    pub fn history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    /// Set scroll restoration.
    pub fn scroll(mut self, scroll: bool) -> Self {
        self.scroll = scroll;
        self
    }

    /// Set shallow routing.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    /// Request a specific flush spacing.
    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Fold two option sets into the options of their shared batch.
    pub fn merge(self, other: Self) -> Self {
        Self {
            history: self.history.merge(other.history),
            scroll: self.scroll || other.scroll,
            shallow: self.shallow && other.shallow,
            throttle: match (self.throttle, other.throttle) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// Throttle in effect for this batch given the scheduler default.
    pub fn effective_throttle(&self, default: Duration) -> Duration {
        self.throttle.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<FlushOptions> {
        vec![
            FlushOptions::default(),
            FlushOptions::default().push(),
            FlushOptions::default().scroll(true),
            FlushOptions::default().shallow(false),
            FlushOptions::default().throttle(Duration::from_millis(300)),
            FlushOptions::default()
                .push()
                .shallow(false)
                .throttle(Duration::from_millis(20)),
        ]
    }

    #[test]
    fn push_wins_over_replace() {
        let merged = FlushOptions::default()
            .history(HistoryMode::Replace)
            .merge(FlushOptions::default().push());
        assert_eq!(merged.history, HistoryMode::Push);
    }

    #[test]
    fn scroll_ors_shallow_ands_throttle_mins() {
        let a = FlushOptions::default()
            .scroll(true)
            .throttle(Duration::from_millis(200));
        let b = FlushOptions::default()
            .shallow(false)
            .throttle(Duration::from_millis(50));
        let m = a.merge(b);
        assert!(m.scroll);
        assert!(!m.shallow);
        assert_eq!(m.throttle, Some(Duration::from_millis(50)));
        assert_eq!(
            FlushOptions::default().effective_throttle(Duration::from_millis(70)),
            Duration::from_millis(70)
        );
    }

    #[test]
    fn merge_is_commutative_associative_with_identity() {
        let s = samples();
        for a in &s {
            assert_eq!(a.merge(FlushOptions::default()), *a);
            for b in &s {
                assert_eq!(a.merge(*b), b.merge(*a));
                for c in &s {
                    assert_eq!(a.merge(*b).merge(*c), a.merge(b.merge(*c)));
                }
            }
        }
    }
}

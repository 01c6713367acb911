// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ports to the host's routing layer.
//!
//! The engine never touches history itself. It reads the live query through
//! [`UrlReader`] and commits batches through [`Navigator`]; whether that is a
//! full navigation or an in-place history call is the host's business.

use std::future::Future;

use thiserror::Error;

use crate::options::HistoryMode;
use crate::params::SearchParams;

/// Navigation flags derived from the merged batch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    /// Restore scroll position.
    pub scroll: bool,
    /// Skip data refetching.
    pub shallow: bool,
}

/// The host refused or failed the history mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("navigation rejected: {reason}")]
pub struct NavigationError {
    /// Host-supplied reason.
    pub reason: String,
}

impl NavigationError {
    /// Build from any message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// History mutation capability.
pub trait Navigator: Send + Sync + 'static {
    /// Replace the query with `params` and settle once the URL observably
    /// reflects it.
    fn navigate(
        &self,
        params: &SearchParams,
        mode: HistoryMode,
        options: NavigateOptions,
    ) -> impl Future<Output = Result<(), NavigationError>> + Send;
}

/// Synchronous accessor for the live query parameters.
pub trait UrlReader: Send + Sync + 'static {
    /// Parameters currently in the URL.
    fn search_params(&self) -> SearchParams;
}

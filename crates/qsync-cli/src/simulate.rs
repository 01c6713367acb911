// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `qsync simulate`: replay a sequence of updates and report navigations.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use qsync_config::SyncPrefs;
use qsync_core::{HistoryMode, MemoryHistory, QuerySync, SearchParams, SyncEvent, Topic};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub(crate) struct SimulateArgs {
    /// Query string the history starts with.
    #[arg(long, default_value = "")]
    initial: String,

    /// Override the default flush spacing in milliseconds.
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// Delay between consecutive updates in milliseconds.
    #[arg(long, default_value_t = 0)]
    spacing_ms: u64,

    /// Simulated navigation latency in milliseconds.
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Push history entries instead of replacing.
    #[arg(long)]
    push: bool,

    /// Updates as `key=value`; `key=` removes the key.
    #[arg(required = true)]
    updates: Vec<Update>,
}

#[derive(Debug, Clone)]
pub(crate) struct Update {
    key: String,
    value: Option<String>,
}

impl FromStr for Update {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((key, value)) = s.split_once('=') else {
            return Err(format!("expected key=value, got {s:?}"));
        };
        if key.is_empty() {
            return Err("empty key".to_owned());
        }
        Ok(Self {
            key: key.to_owned(),
            value: (!value.is_empty()).then(|| value.to_owned()),
        })
    }
}

pub(crate) async fn run(args: SimulateArgs, prefs: &SyncPrefs) -> Result<()> {
    let mut config = prefs.scheduler_config();
    if let Some(ms) = args.throttle_ms {
        config.default_throttle = Duration::from_millis(ms);
    }
    let mut options = prefs.update_options();
    if args.push {
        options = options.push();
    }

    let history = Arc::new(
        MemoryHistory::new(SearchParams::parse(&args.initial))
            .with_latency(Duration::from_millis(args.latency_ms)),
    );
    let sync = QuerySync::spawn(Arc::clone(&history), config);
    sync.subscribe(Topic::UrlChanged, |event| {
        if let SyncEvent::UrlChanged { params } = event {
            info!(%params, "url committed");
        }
    });

    let start = Instant::now();
    let mut pending = Vec::with_capacity(args.updates.len());
    for (i, update) in args.updates.iter().enumerate() {
        if i > 0 && args.spacing_ms > 0 {
            sleep(Duration::from_millis(args.spacing_ms)).await;
        }
        pending.push(sync.set(&update.key, update.value.clone(), options));
    }

    let mut failures = 0usize;
    for flush in pending {
        if let Err(err) = flush.await {
            warn!(%err, "update failed");
            failures += 1;
        }
    }

    for (n, nav) in history.navigations().iter().enumerate() {
        let mode = match nav.mode {
            HistoryMode::Push => "push",
            HistoryMode::Replace => "replace",
        };
        println!(
            "navigation {} at +{}ms {} ?{}",
            n + 1,
            nav.started.duration_since(start).as_millis(),
            mode,
            nav.params
        );
    }
    println!("final ?{}", sync.search_params());

    if failures > 0 {
        bail!("{failures} update(s) failed");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn update_parses_sets_and_removals() {
        let set: Update = "q=a=b".parse().unwrap();
        assert_eq!(set.key, "q");
        assert_eq!(set.value.as_deref(), Some("a=b"));
        let removal: Update = "q=".parse().unwrap();
        assert_eq!(removal.value, None);
        assert!("novalue".parse::<Update>().is_err());
        assert!("=x".parse::<Update>().is_err());
    }
}

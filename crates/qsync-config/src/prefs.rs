// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted sync preferences (throttle + per-update defaults).

use std::time::Duration;

use qsync_core::{FlushOptions, HistoryMode, SchedulerConfig, DEFAULT_THROTTLE};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Logical config key under which [`SyncPrefs`] are stored.
pub const PREFS_KEY: &str = "sync";

/// Saved preferences for a qsync host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPrefs {
    /// Default minimum spacing between history mutations (ms).
    pub throttle_ms: u64,
    /// Floor imposed by the host platform (ms), e.g. for browsers that cap
    /// history calls per time window. Wins over `throttle_ms` when larger.
    pub platform_min_throttle_ms: Option<u64>,
    /// Default history mode for updates.
    pub history: HistoryMode,
    /// Default scroll restoration flag.
    pub scroll: bool,
    /// Default shallow routing flag.
    pub shallow: bool,
}

impl Default for SyncPrefs {
    fn default() -> Self {
        Self {
            throttle_ms: u64::try_from(DEFAULT_THROTTLE.as_millis()).unwrap_or(50),
            platform_min_throttle_ms: None,
            history: HistoryMode::Replace,
            scroll: false,
            shallow: true,
        }
    }
}

impl SyncPrefs {
    /// Effective default throttle: the larger of the configured value and the
    /// platform floor.
    pub fn default_throttle(&self) -> Duration {
        let ms = self
            .platform_min_throttle_ms
            .map_or(self.throttle_ms, |floor| self.throttle_ms.max(floor));
        Duration::from_millis(ms)
    }

    /// Scheduler configuration derived from these prefs.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            default_throttle: self.default_throttle(),
        }
    }

    /// Per-update defaults derived from these prefs.
    pub fn update_options(&self) -> FlushOptions {
        FlushOptions::default()
            .history(self.history)
            .scroll(self.scroll)
            .shallow(self.shallow)
    }

    /// Reject values no host can honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttle_ms == 0 && self.platform_min_throttle_ms.unwrap_or(0) == 0 {
            return Err(ConfigError::Invalid {
                key: PREFS_KEY.to_owned(),
                reason: "throttle_ms must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{ConfigService, ConfigStore, MemoryConfigStore};

    #[test]
    fn defaults_match_engine_defaults() {
        let prefs = SyncPrefs::default();
        assert_eq!(prefs.default_throttle(), DEFAULT_THROTTLE);
        assert_eq!(prefs.update_options(), FlushOptions::default());
        prefs.validate().unwrap();
    }

    #[test]
    fn platform_floor_wins_when_larger() {
        let prefs = SyncPrefs {
            throttle_ms: 50,
            platform_min_throttle_ms: Some(120),
            ..SyncPrefs::default()
        };
        assert_eq!(
            prefs.scheduler_config().default_throttle,
            Duration::from_millis(120)
        );
        let relaxed = SyncPrefs {
            throttle_ms: 300,
            ..prefs
        };
        assert_eq!(relaxed.default_throttle(), Duration::from_millis(300));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        svc.store()
            .save_raw(PREFS_KEY, br#"{"history":"push"}"#)
            .unwrap();
        let prefs: SyncPrefs = svc.load_or_default(PREFS_KEY);
        assert_eq!(prefs.history, HistoryMode::Push);
        assert_eq!(prefs.throttle_ms, 50);
        assert_eq!(prefs.update_options().history, HistoryMode::Push);
    }

    #[test]
    fn zero_throttle_is_rejected() {
        let prefs = SyncPrefs {
            throttle_ms: 0,
            ..SyncPrefs::default()
        };
        assert!(matches!(prefs.validate(), Err(ConfigError::Invalid { .. })));
    }
}

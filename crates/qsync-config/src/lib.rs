// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Configuration for qsync hosts: a storage port, a JSON config service on
//! top of it, a filesystem store, and the persisted sync preferences.

pub mod config;
pub mod fs;
pub mod prefs;

pub use config::{ConfigError, ConfigService, ConfigStore, MemoryConfigStore};
pub use fs::FsConfigStore;
pub use prefs::{SyncPrefs, PREFS_KEY};

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted prefs: a JSON codec over a pluggable blob store.
//!
//! Hosts keep sync prefs wherever suits them (a file, browser storage, a test
//! map). The store only moves bytes under a section name such as
//! [`PREFS_KEY`](crate::PREFS_KEY); [`ConfigService`] owns the JSON encoding.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Where prefs blobs live.
pub trait ConfigStore {
    /// Bytes stored under `key`; [`ConfigError::NotFound`] if nothing was saved.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replace the bytes stored under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failure loading, storing or validating prefs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the requested key.
    #[error("no prefs stored")]
    NotFound,
    /// The backing store failed.
    #[error("prefs store i/o: {0}")]
    Io(#[from] std::io::Error),
    /// Stored bytes are not valid JSON for the requested type.
    #[error("malformed prefs: {0}")]
    Serde(#[from] serde_json::Error),
    /// Decoded prefs violate a constraint.
    #[error("invalid {key}: {reason}")]
    Invalid {
        /// Offending field.
        key: String,
        /// Constraint that failed.
        reason: String,
    },
    /// The platform exposes no per-user config directory.
    #[error("no config directory available")]
    NoConfigDir,
}

/// JSON front end over a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Decode the prefs under `key`; `Ok(None)` when nothing (or an empty blob)
    /// is stored.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load `key`, falling back to `T::default()` when missing or unreadable.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(err) => {
                tracing::warn!(key, %err, "unreadable config; using defaults");
                T::default()
            }
        }
    }

    /// Serialize and persist `value` under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Process-local store, used by tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn missing_and_empty_blobs_load_as_none() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        assert_eq!(svc.load::<Sample>("absent").unwrap(), None);
        svc.store().save_raw("empty", b"").unwrap();
        assert_eq!(svc.load::<Sample>("empty").unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        svc.save("s", &Sample { n: 7 }).unwrap();
        assert_eq!(svc.load::<Sample>("s").unwrap(), Some(Sample { n: 7 }));
    }

    #[test]
    fn corrupt_blob_falls_back_to_default() {
        let svc = ConfigService::new(MemoryConfigStore::new());
        svc.store().save_raw("s", b"{not json").unwrap();
        assert!(matches!(svc.load::<Sample>("s"), Err(ConfigError::Serde(_))));
        assert_eq!(svc.load_or_default::<Sample>("s"), Sample::default());
    }
}

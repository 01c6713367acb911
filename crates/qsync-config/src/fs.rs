// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` (uses the platform config dir).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::config::{ConfigError, ConfigStore};

/// Store configs as `<key>.json` files under a base directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at the user config directory (e.g. `~/.config/qsync`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj =
            ProjectDirs::from("dev", "flyingrobots", "qsync").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::at(proj.config_dir()))
    }

    /// Store rooted at an explicit directory. Nothing touches the disk until
    /// the first save, which creates the directory.
    pub fn at(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the config files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.base)?;
        fs::write(self.path_for(key), data)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_blobs_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path().join("nested"));
        assert!(matches!(store.load_raw("prefs"), Err(ConfigError::NotFound)));
        assert!(!store.base().exists());
        store.save_raw("prefs", b"{}").unwrap();
        assert_eq!(store.load_raw("prefs").unwrap(), b"{}");
        assert!(store.base().join("prefs.json").exists());
    }
}

//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::wizard::store::DraftStore;

/// On-disk layout for launchdeck state
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the wizard drafts directory
    pub fn drafts_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("drafts"))
    }

    /// Wizard draft store kept under the drafts directory
    pub fn draft_store(&self) -> DraftStore {
        DraftStore::new(&self.drafts_dir())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("LAUNCHDECK_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".launchdeck"))
            })
            .unwrap_or_else(|| PathBuf::from(".launchdeck"));

        Self::new(base_dir)
    }
}

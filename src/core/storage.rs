//! Where the catalog database and organizer log live on disk.

use crate::error::CatalogError;
use std::path::{Path, PathBuf};

const FALLBACK_DIR: &str = "App_Data";
const APP_DIR: &str = "photo-catalog";
const DATABASE_FILE: &str = "catalog.db";
const ORGANIZER_LOG_FILE: &str = "organizer.log";

/// Resolved locations of persistent state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
}

impl StoragePaths {
    /// Use an explicit data directory, or the platform data directory
    /// (`dirs::data_dir()/photo-catalog`), falling back to `./App_Data`
    /// when the platform has none.
    pub fn resolve(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| match dirs::data_dir() {
            Some(base) => base.join(APP_DIR),
            None => PathBuf::from(".").join(FALLBACK_DIR),
        });
        Self { data_dir }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), CatalogError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            CatalogError::Config(format!(
                "cannot create data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn organizer_log(&self) -> PathBuf {
        self.data_dir.join(ORGANIZER_LOG_FILE)
    }
}

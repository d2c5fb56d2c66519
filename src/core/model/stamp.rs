//! Filesystem size and timestamps as the catalog records them.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Size and times of a file, truncated to catalog precision (milliseconds)
/// so values read from disk compare equal to values read back from a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl FileStamp {
    /// Stat `path`, following symlinks.
    pub fn read(path: &Path) -> io::Result<Self> {
        std::fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // Creation time is unavailable on some filesystems.
        let created = metadata.created().unwrap_or(modified);
        Self {
            size: metadata.len(),
            created: catalog_time(created),
            modified: catalog_time(modified),
        }
    }
}

/// Convert a filesystem time to UTC at millisecond precision.
pub fn catalog_time(time: SystemTime) -> DateTime<Utc> {
    let utc: DateTime<Utc> = time.into();
    DateTime::from_timestamp_millis(utc.timestamp_millis()).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

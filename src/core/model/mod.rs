//! # Catalog Model
//!
//! Records persisted by the catalog store.
//!
//! `PhotoAsset` keeps `file_name`, `extension` and `folder_path` derived from
//! `full_path`; every mutator goes through [`PhotoAsset::set_path`] so the
//! three can never drift.

mod stamp;

pub use stamp::{catalog_time, FileStamp};

use crate::core::metadata::PhotoMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Where a photo's capture date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTakenSource {
    Exif,
    FileCreated,
    FileModified,
    #[default]
    Unknown,
}

impl DateTakenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exif => "exif",
            Self::FileCreated => "file_created",
            Self::FileModified => "file_modified",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exif" => Some(Self::Exif),
            "file_created" | "filecreated" => Some(Self::FileCreated),
            "file_modified" | "filemodified" => Some(Self::FileModified),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A top-level directory registered for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRoot {
    /// Store-assigned id, 0 until inserted
    pub id: i64,
    /// Absolute, normalized, unique across the catalog
    pub root_path: PathBuf,
    pub last_scan_utc: Option<DateTime<Utc>>,
    pub total_files_last_scan: usize,
    pub enable_duplicate_detection: bool,
    pub notes: Option<String>,
}

impl ScanRoot {
    pub fn new(root_path: PathBuf, enable_duplicate_detection: bool) -> Self {
        Self {
            id: 0,
            root_path,
            last_scan_utc: None,
            total_files_last_scan: 0,
            enable_duplicate_detection,
            notes: None,
        }
    }
}

/// One cataloged image file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAsset {
    /// Store-assigned id, 0 until inserted
    pub id: i64,
    pub scan_root_id: i64,
    pub full_path: PathBuf,
    pub file_name: String,
    /// Lowercased and dot-prefixed (".jpg"), empty when the file has none
    pub extension: String,
    pub folder_path: PathBuf,
    pub file_size_bytes: u64,
    pub date_taken: Option<DateTime<Utc>>,
    pub date_taken_source: DateTakenSource,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Lowercase hex SHA-256, only kept while duplicate detection is enabled
    pub sha256: Option<String>,
    pub file_created_utc: DateTime<Utc>,
    pub file_last_write_utc: DateTime<Utc>,
    /// Set once, when the row is first created
    pub indexed_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: BTreeSet<String>,
    pub people_ids: BTreeSet<String>,
    pub animal_ids: BTreeSet<String>,
}

impl PhotoAsset {
    /// A fresh, not yet persisted row for `full_path`.
    pub fn new(scan_root_id: i64, full_path: &Path, now: DateTime<Utc>) -> Self {
        let mut asset = Self {
            id: 0,
            scan_root_id,
            full_path: PathBuf::new(),
            file_name: String::new(),
            extension: String::new(),
            folder_path: PathBuf::new(),
            file_size_bytes: 0,
            date_taken: None,
            date_taken_source: DateTakenSource::Unknown,
            camera_make: None,
            camera_model: None,
            width: None,
            height: None,
            sha256: None,
            file_created_utc: DateTime::<Utc>::UNIX_EPOCH,
            file_last_write_utc: DateTime::<Utc>::UNIX_EPOCH,
            indexed_utc: now,
            updated_utc: now,
            notes: None,
            tags: BTreeSet::new(),
            people_ids: BTreeSet::new(),
            animal_ids: BTreeSet::new(),
        };
        asset.set_path(full_path);
        asset
    }

    /// Point the row at a new path, re-deriving name, extension and folder.
    pub fn set_path(&mut self, full_path: &Path) {
        self.full_path = full_path.to_path_buf();
        self.file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.extension = normalize_extension(
            full_path
                .extension()
                .map(|e| e.to_string_lossy())
                .as_deref()
                .unwrap_or(""),
        );
        self.folder_path = full_path.parent().map(Path::to_path_buf).unwrap_or_default();
    }

    /// Copy size and timestamps observed on disk.
    pub fn apply_stamp(&mut self, stamp: &FileStamp) {
        self.file_size_bytes = stamp.size;
        self.file_created_utc = stamp.created;
        self.file_last_write_utc = stamp.modified;
    }

    /// Copy extracted metadata, replacing whatever was there.
    pub fn apply_metadata(&mut self, metadata: &PhotoMetadata) {
        self.date_taken = metadata.date_taken;
        self.date_taken_source = metadata.date_taken_source;
        self.camera_make = metadata.camera_make.clone();
        self.camera_model = metadata.camera_model.clone();
        self.width = metadata.width;
        self.height = metadata.height;
    }

    /// True when the row still describes the file as observed.
    pub fn is_unchanged(&self, stamp: &FileStamp) -> bool {
        self.file_size_bytes == stamp.size && self.file_last_write_utc == stamp.modified
    }

    pub fn has_hash(&self) -> bool {
        self.sha256.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Capture date used for bucketing: date taken, else last write time.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.date_taken.unwrap_or(self.file_last_write_utc)
    }

    /// True when the row has no usable capture date.
    pub fn has_unknown_date(&self) -> bool {
        self.date_taken.is_none() || self.date_taken_source == DateTakenSource::Unknown
    }
}

/// Lowercase an extension and give it a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

//! # Error Module
//!
//! Error types for the photo catalog.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, ids, what went wrong
//! - **Partial failures are not errors** - multi-item operations count
//!   recovered failures in their summaries and only fail for fatal conditions

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),

    #[error("Organizer error: {0}")]
    Organize(#[from] OrganizeError),

    #[error("Scan root {id} is not registered in the catalog")]
    UnknownScanRoot { id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while walking a scan root
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan root does not exist: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while computing content hashes
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to hash {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a catalog store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open catalog database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog corruption detected at {path}. Delete this file and rescan.")]
    Corrupted { path: PathBuf },

    #[error("Failed to serialize catalog data: {0}")]
    Serialization(String),

    #[error("Catalog constraint violated: {0}")]
    Constraint(String),
}

/// Errors that occur while moving, copying or renaming cataloged files
#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("Destination {path} must stay inside the scan root {root}")]
    OutsideScanRoot { path: PathBuf, root: PathBuf },

    #[error("Destination path is invalid: {path}")]
    InvalidDestination { path: PathBuf },

    #[error("The requested file name is invalid: {0:?}")]
    InvalidFileName(String),

    #[error("Source file was not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("File operation failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to organizer log {path}: {source}")]
    AuditLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            rusqlite::Error::SqliteFailure(ref inner, _)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(error.to_string())
            }
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;

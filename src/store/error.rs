//! Shared error type for the record store.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::ScraperKind;
use crate::sanitize::SanitizeError;

/// Store failures: boundary rejections, write/read failures, missing and
/// corrupt records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("Payload for {kind}/{identifier} is {size} bytes, over the {limit} byte limit")]
    PayloadTooLarge {
        kind: ScraperKind,
        identifier: String,
        size: u64,
        limit: u64,
    },

    #[error("Failed to initialize storage root {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write record {kind}/{identifier}: {path}: {source}")]
    StorageWrite {
        kind: ScraperKind,
        identifier: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read record {kind}/{identifier}: {path}: {source}")]
    StorageRead {
        kind: ScraperKind,
        identifier: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete record {kind}/{identifier}: {path}: {source}")]
    Delete {
        kind: ScraperKind,
        identifier: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan storage directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No stored record for {kind}/{identifier}")]
    RecordNotFound {
        kind: ScraperKind,
        identifier: String,
    },

    #[error("Stored record {kind}/{identifier} is corrupt: {path}: {reason}")]
    CorruptRecord {
        kind: ScraperKind,
        identifier: String,
        path: PathBuf,
        reason: String,
    },
}

//! Record persistence. One directory per scraper kind under an explicit
//! root; one `record.json` per identifier; writes go through a temporary
//! file and an atomic rename so a crash mid-write cannot corrupt the
//! previous version.

mod error;

pub use error::StoreError;

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::model::{Record, RecordSummary, ScraperKind};
use crate::sanitize::sanitize_identifier;

/// Durable file name inside each record directory.
pub const RECORD_FILE: &str = "record.json";

/// Default cap on serialized payload size at ingestion.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Filesystem-backed record store rooted at an explicit directory, so
/// multiple roots can coexist (tests use a temp root each).
#[derive(Debug)]
pub struct RecordStore {
    root: PathBuf,
    max_payload_bytes: u64,
}

/// Summary-level fields of the durable form. `payload` is absent on purpose:
/// listing never materializes full payloads.
#[derive(Debug, Deserialize)]
struct StoredMeta {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    summary: BTreeMap<String, Value>,
}

impl RecordStore {
    /// Open a store, creating the root and its per-kind subdirectories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for kind in ScraperKind::ALL {
            let dir = root.join(kind.as_str());
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::Init {
                path: dir.clone(),
                source: e,
            })?;
        }
        debug!(root = %root.display(), "opened record store");
        Ok(RecordStore {
            root,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        })
    }

    /// Override the payload ingestion cap (bytes of serialized payload).
    pub fn with_max_payload_bytes(mut self, limit: u64) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: ScraperKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// Directory holding one record. The identifier passes the sanitizer
    /// before it becomes a path segment.
    fn record_dir(&self, kind: ScraperKind, identifier: &str) -> Result<PathBuf, StoreError> {
        let safe = sanitize_identifier(identifier)?;
        Ok(self.kind_dir(kind).join(safe))
    }

    /// Persist a record, overwriting any previous version under the same
    /// key. Returns the final storage path. On failure the previous on-disk
    /// version, if any, is left untouched.
    pub fn save(&self, record: &Record) -> Result<PathBuf, StoreError> {
        let dir = self.record_dir(record.kind, &record.identifier)?;

        let payload_size = serde_json::to_vec(&record.payload)
            .map_err(|e| StoreError::StorageWrite {
                kind: record.kind,
                identifier: record.identifier.clone(),
                path: dir.join(RECORD_FILE),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?
            .len() as u64;
        if payload_size > self.max_payload_bytes {
            return Err(StoreError::PayloadTooLarge {
                kind: record.kind,
                identifier: record.identifier.clone(),
                size: payload_size,
                limit: self.max_payload_bytes,
            });
        }

        let path = dir.join(RECORD_FILE);
        let mut to_store = record.clone();
        to_store.last_modified = Utc::now();
        // First save wins for saved_at; a previous version that no longer
        // parses counts as absent here.
        if let Some(existing) = read_meta(&path) {
            to_store.saved_at = existing.saved_at;
        }

        let write_err = |e: std::io::Error| StoreError::StorageWrite {
            kind: record.kind,
            identifier: record.identifier.clone(),
            path: path.clone(),
            source: e,
        };

        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let json = serde_json::to_vec_pretty(&to_store).map_err(|e| {
            write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!(
            kind = %record.kind,
            identifier = %record.identifier,
            path = %path.display(),
            bytes = json.len(),
            "saved record"
        );
        Ok(path)
    }

    /// Load the full record for a key.
    pub fn load(&self, kind: ScraperKind, identifier: &str) -> Result<Record, StoreError> {
        let path = self.record_dir(kind, identifier)?.join(RECORD_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::RecordNotFound {
                    kind,
                    identifier: identifier.to_string(),
                })
            }
            Err(e) => {
                return Err(StoreError::StorageRead {
                    kind,
                    identifier: identifier.to_string(),
                    path,
                    source: e,
                })
            }
        };
        let record: Record =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptRecord {
                kind,
                identifier: identifier.to_string(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
        debug!(kind = %kind, %identifier, path = %path.display(), "loaded record");
        Ok(record)
    }

    /// Scan current state and return list rows, newest first. Corrupt
    /// entries are flagged, not skipped; each call re-scans, so deletes and
    /// saves made since a previous call are reflected.
    pub fn list(&self, filter: Option<ScraperKind>) -> Result<Vec<RecordSummary>, StoreError> {
        let kinds: Vec<ScraperKind> = match filter {
            Some(kind) => vec![kind],
            None => ScraperKind::ALL.to_vec(),
        };

        let mut rows = Vec::new();
        for kind in kinds {
            let dir = self.kind_dir(kind);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::Scan {
                        path: dir,
                        source: e,
                    })
                }
            };
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Scan {
                    path: dir.clone(),
                    source: e,
                })?;
                if !entry.path().is_dir() {
                    continue;
                }
                let identifier = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(name) => {
                        warn!(kind = %kind, ?name, "skipping non-UTF-8 entry in storage");
                        continue;
                    }
                };
                let path = entry.path().join(RECORD_FILE);
                if !path.exists() {
                    continue;
                }
                match read_meta(&path) {
                    Some(meta) => rows.push(RecordSummary {
                        kind,
                        identifier,
                        saved_at: Some(meta.saved_at),
                        last_modified: meta.last_modified,
                        summary: meta.summary,
                        path,
                        corrupt: false,
                    }),
                    None => {
                        warn!(kind = %kind, %identifier, path = %path.display(), "corrupt record in listing");
                        rows.push(RecordSummary {
                            kind,
                            identifier,
                            saved_at: None,
                            last_modified: None,
                            summary: BTreeMap::new(),
                            path,
                            corrupt: true,
                        });
                    }
                }
            }
        }

        // Newest first; corrupt rows (no readable timestamp) sort last.
        rows.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(rows)
    }

    /// Delete a record and everything cached beside it. Returns whether a
    /// record existed; deleting a missing key is not an error.
    pub fn delete(&self, kind: ScraperKind, identifier: &str) -> Result<bool, StoreError> {
        let dir = self.record_dir(kind, identifier)?;
        if !dir.exists() {
            debug!(kind = %kind, %identifier, "delete: no record");
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| StoreError::Delete {
            kind,
            identifier: identifier.to_string(),
            path: dir.clone(),
            source: e,
        })?;
        info!(kind = %kind, %identifier, path = %dir.display(), "deleted record");
        Ok(true)
    }
}

/// Read only the summary-level fields of a durable record. `None` when the
/// file is missing or does not parse.
fn read_meta(path: &Path) -> Option<StoredMeta> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn github_record(identifier: &str) -> Record {
        Record::new(
            ScraperKind::Github,
            identifier,
            format!("https://github.com/{}", identifier.replace('_', "/")),
            json!({"repository": {"name": "demo", "owner": "octocat"}, "files_count": 3}),
        )
    }

    #[test]
    fn open_creates_per_kind_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        for kind in ScraperKind::ALL {
            assert!(store.root().join(kind.as_str()).is_dir());
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let record = github_record("octocat_hello-world");
        let path = store.save(&record).unwrap();
        assert!(path.ends_with(Path::new("github/octocat_hello-world/record.json")));

        let loaded = store.load(ScraperKind::Github, "octocat_hello-world").unwrap();
        assert_eq!(loaded.kind, record.kind);
        assert_eq!(loaded.identifier, record.identifier);
        assert_eq!(loaded.source_url, record.source_url);
        assert_eq!(loaded.payload, record.payload);
        assert_eq!(loaded.saved_at, record.saved_at);
    }

    #[test]
    fn resave_overwrites_and_preserves_saved_at() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let first = github_record("octocat_hello-world");
        store.save(&first).unwrap();
        let original_saved_at = store
            .load(ScraperKind::Github, "octocat_hello-world")
            .unwrap()
            .saved_at;

        let mut second = github_record("octocat_hello-world");
        second.payload = json!({"files_count": 9});
        store.save(&second).unwrap();

        let loaded = store.load(ScraperKind::Github, "octocat_hello-world").unwrap();
        assert_eq!(loaded.payload, json!({"files_count": 9}));
        assert_eq!(loaded.saved_at, original_saved_at);
        assert!(loaded.last_modified >= original_saved_at);

        // Still exactly one durable file for the key.
        let dir = store.root().join("github/octocat_hello-world");
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn load_missing_record_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let result = store.load(ScraperKind::Github, "nope");
        assert!(matches!(result, Err(StoreError::RecordNotFound { .. })));
    }

    #[test]
    fn load_rejects_corrupt_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let dir = store.root().join("github/broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(RECORD_FILE), b"{not json").unwrap();

        let result = store.load(ScraperKind::Github, "broken");
        assert!(matches!(result, Err(StoreError::CorruptRecord { .. })));
    }

    #[test]
    fn list_flags_corrupt_records_and_sorts_them_last() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        store.save(&github_record("octocat_hello-world")).unwrap();
        let dir = store.root().join("github/broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(RECORD_FILE), b"{not json").unwrap();

        let rows = store.list(None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identifier, "octocat_hello-world");
        assert!(!rows[0].corrupt);
        assert_eq!(rows[1].identifier, "broken");
        assert!(rows[1].corrupt);
    }

    #[test]
    fn list_filters_by_kind_and_reflects_deletes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        store.save(&github_record("octocat_hello-world")).unwrap();
        store
            .save(&Record::new(
                ScraperKind::Website,
                "example.com",
                "https://example.com",
                json!({"domain": "example.com"}),
            ))
            .unwrap();

        assert_eq!(store.list(None).unwrap().len(), 2);
        let github_only = store.list(Some(ScraperKind::Github)).unwrap();
        assert_eq!(github_only.len(), 1);
        assert_eq!(github_only[0].kind, ScraperKind::Github);

        store.delete(ScraperKind::Website, "example.com").unwrap();
        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn list_orders_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let mut older = github_record("older_repo");
        older.saved_at = older.saved_at - chrono::Duration::seconds(60);
        store.save(&older).unwrap();
        store.save(&github_record("newer_repo")).unwrap();

        let rows = store.list(Some(ScraperKind::Github)).unwrap();
        assert_eq!(rows[0].identifier, "newer_repo");
        assert_eq!(rows[1].identifier, "older_repo");
    }

    #[test]
    fn delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        assert!(!store.delete(ScraperKind::Github, "nope").unwrap());

        store.save(&github_record("octocat_hello-world")).unwrap();
        assert!(store.delete(ScraperKind::Github, "octocat_hello-world").unwrap());
        assert!(!store.delete(ScraperKind::Github, "octocat_hello-world").unwrap());
        let result = store.load(ScraperKind::Github, "octocat_hello-world");
        assert!(matches!(result, Err(StoreError::RecordNotFound { .. })));
    }

    #[test]
    fn save_rejects_unsafe_identifier_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap();
        let mut record = github_record("octocat_hello-world");
        record.identifier = "../../etc/passwd".to_string();
        assert!(matches!(
            store.save(&record),
            Err(StoreError::Sanitize(_))
        ));
        // Nothing was created outside the per-kind directories.
        let entries: Vec<_> = std::fs::read_dir(store.root().join("github")).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn save_enforces_payload_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap().with_max_payload_bytes(64);
        let mut record = github_record("octocat_hello-world");
        record.payload = json!({"blob": "x".repeat(256)});
        let result = store.save(&record);
        assert!(matches!(result, Err(StoreError::PayloadTooLarge { .. })));
        assert!(matches!(
            store.load(ScraperKind::Github, "octocat_hello-world"),
            Err(StoreError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn failed_save_leaves_previous_version_intact() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path()).unwrap().with_max_payload_bytes(1024);
        let record = github_record("octocat_hello-world");
        store.save(&record).unwrap();

        let mut oversized = record.clone();
        oversized.payload = json!({"blob": "x".repeat(4096)});
        assert!(store.save(&oversized).is_err());

        let loaded = store.load(ScraperKind::Github, "octocat_hello-world").unwrap();
        assert_eq!(loaded.payload, record.payload);
    }
}

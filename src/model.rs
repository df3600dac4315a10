//! Canonical data model for stored scrape results.
//!
//! Every scraper collaborator produces this shape; the store and all format
//! writers consume it as the single source of truth.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported scraper source. Used for dispatch, storage layout, and export
/// file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperKind {
    Github,
    Website,
    Youtube,
}

impl ScraperKind {
    /// All kinds, in storage-directory order.
    pub const ALL: [ScraperKind; 3] = [
        ScraperKind::Github,
        ScraperKind::Website,
        ScraperKind::Youtube,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScraperKind::Github => "github",
            ScraperKind::Website => "website",
            ScraperKind::Youtube => "youtube",
        }
    }
}

impl fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScraperKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ScraperKind::Github),
            "website" => Ok(ScraperKind::Website),
            "youtube" => Ok(ScraperKind::Youtube),
            _ => Err(format!(
                "Unknown scraper kind: '{}'. Use github, website, or youtube.",
                s
            )),
        }
    }
}

/// Canonical record: one scrape result, keyed by (kind, identifier).
///
/// `payload` is the full structured content handed over by the scraper,
/// opaque to this crate beyond being serializable. `summary` holds the
/// scalar preview fields shown in list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "scraper_type")]
    pub kind: ScraperKind,
    pub identifier: String,
    pub source_url: String,
    /// Set at first successful persistence; preserved on re-save.
    pub saved_at: DateTime<Utc>,
    /// Refreshed on every successful save.
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub summary: BTreeMap<String, Value>,
    pub payload: Value,
}

impl Record {
    /// Build a record ready for its first save. Both timestamps are stamped
    /// now; the store keeps the stored `saved_at` when the key already exists.
    pub fn new(
        kind: ScraperKind,
        identifier: impl Into<String>,
        source_url: impl Into<String>,
        payload: Value,
    ) -> Self {
        let now = Utc::now();
        Record {
            kind,
            identifier: identifier.into(),
            source_url: source_url.into(),
            saved_at: now,
            last_modified: now,
            summary: BTreeMap::new(),
            payload,
        }
    }

    pub fn with_summary(mut self, summary: BTreeMap<String, Value>) -> Self {
        self.summary = summary;
        self
    }
}

/// Lightweight list-view row produced by the store without deserializing
/// full payloads. A record whose stored form cannot be parsed still shows up
/// here with `corrupt` set, so the user can decide to delete it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub kind: ScraperKind,
    pub identifier: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub summary: BTreeMap<String, Value>,
    pub path: std::path::PathBuf,
    pub corrupt: bool,
}

/// Derive the scalar preview fields for a payload. Each kind pulls its own
/// fields; absent keys fall back to `"unknown"` / `0` so list rows stay
/// uniform.
pub fn summarize(kind: ScraperKind, payload: &Value) -> BTreeMap<String, Value> {
    fn str_at(payload: &Value, path: &[&str]) -> Value {
        let mut v = payload;
        for key in path {
            match v.get(key) {
                Some(inner) => v = inner,
                None => return Value::String("unknown".to_string()),
            }
        }
        match v {
            Value::String(_) => v.clone(),
            _ => Value::String("unknown".to_string()),
        }
    }
    fn count_at(payload: &Value, key: &str) -> Value {
        match payload.get(key) {
            Some(Value::Number(n)) => Value::Number(n.clone()),
            _ => Value::Number(0.into()),
        }
    }

    let mut summary = BTreeMap::new();
    match kind {
        ScraperKind::Github => {
            summary.insert("name".to_string(), str_at(payload, &["repository", "name"]));
            summary.insert(
                "owner".to_string(),
                str_at(payload, &["repository", "owner"]),
            );
            summary.insert("files_count".to_string(), count_at(payload, "files_count"));
            summary.insert(
                "issues_count".to_string(),
                count_at(payload, "issues_count"),
            );
        }
        ScraperKind::Website => {
            summary.insert("domain".to_string(), str_at(payload, &["domain"]));
            summary.insert(
                "pages_crawled".to_string(),
                count_at(payload, "pages_crawled"),
            );
            summary.insert(
                "assets_downloaded".to_string(),
                count_at(payload, "assets_downloaded"),
            );
        }
        ScraperKind::Youtube => {
            summary.insert(
                "handle".to_string(),
                str_at(payload, &["channel", "handle"]),
            );
            summary.insert(
                "videos_count".to_string(),
                count_at(payload, "videos_count"),
            );
        }
    }
    summary
}

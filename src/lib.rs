//! scrapkeep: local record store and multi-format exporter for scraped
//! GitHub, website, and YouTube content.
//!
//! External scraper collaborators hand this crate completed records; it
//! persists them idempotently by (kind, identifier), lists and deletes them,
//! and re-renders any stored record into JSON, CSV, TXT, YAML, or XML
//! without re-scraping.

pub mod cli;
pub mod config;
pub mod export;
pub mod formats;
pub mod ident;
pub mod logging;
pub mod model;
pub mod sanitize;
pub mod store;

// Re-exports for CLI and consumers.
pub use export::{ExportError, ExportOptions, ExportReport, Exporter};
pub use formats::{render, FormatError, OutputFormat};
pub use ident::{resolve, ResolveError};
pub use model::{summarize, Record, RecordSummary, ScraperKind};
pub use sanitize::{sanitize_identifier, sanitize_output_dir, SanitizeError};
pub use store::{RecordStore, StoreError};

//! Export fan-out: render a record into each requested format and write the
//! files under a validated output directory.
//!
//! Formats are processed independently; one renderer failing never blocks
//! the others, and `export` itself is infallible. Callers inspect the
//! per-format report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::formats::{render, FormatError, OutputFormat};
use crate::model::Record;
use crate::sanitize::{sanitize_identifier, sanitize_output_dir, SanitizeError};

/// Per-format export failure.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Failed to write export file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one export call: requested format -> written path or error.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub outcomes: BTreeMap<OutputFormat, Result<PathBuf, ExportError>>,
}

impl ExportReport {
    pub fn written(&self) -> impl Iterator<Item = (OutputFormat, &Path)> {
        self.outcomes
            .iter()
            .filter_map(|(format, outcome)| outcome.as_ref().ok().map(|p| (*format, p.as_path())))
    }

    pub fn failed(&self) -> impl Iterator<Item = (OutputFormat, &ExportError)> {
        self.outcomes
            .iter()
            .filter_map(|(format, outcome)| outcome.as_ref().err().map(|e| (*format, e)))
    }

    /// True when formats were requested and none produced a file.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.values().all(|outcome| outcome.is_err())
    }
}

/// Export policy: optional allow-list for output roots and the storage root
/// exports must stay out of.
#[derive(Debug, Default)]
pub struct ExportOptions {
    pub allow_roots: Option<Vec<PathBuf>>,
    pub storage_root: Option<PathBuf>,
}

/// Writes converted-format artifacts for records into one output directory,
/// validated once at construction.
#[derive(Debug)]
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    /// Validate `out_dir` through the sanitizer and bind an exporter to it.
    /// The directory itself is created lazily on first write.
    pub fn new(out_dir: &Path, options: &ExportOptions) -> Result<Self, SanitizeError> {
        let out_dir = sanitize_output_dir(out_dir, options.allow_roots.as_deref())?;
        // Converted artifacts never land inside the internal storage root.
        if let Some(storage_root) = &options.storage_root {
            let canonical_root = storage_root
                .canonicalize()
                .unwrap_or_else(|_| storage_root.clone());
            if out_dir.starts_with(&canonical_root) {
                return Err(SanitizeError::UnsafePath {
                    input: out_dir.display().to_string(),
                    reason: "output directory is inside the record storage root".to_string(),
                });
            }
        }
        Ok(Exporter { out_dir })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Render and write each requested format. Duplicate formats collapse;
    /// an existing file of the same name is overwritten.
    pub fn export(&self, record: &Record, formats: &[OutputFormat]) -> ExportReport {
        let mut report = ExportReport::default();

        let identifier = match sanitize_identifier(&record.identifier) {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!(identifier = %record.identifier, error = %e, "export rejected");
                // The identifier gates every file name, so all formats fail alike.
                for format in formats {
                    report.outcomes.insert(
                        *format,
                        Err(ExportError::Sanitize(SanitizeError::UnsafeIdentifier {
                            input: record.identifier.clone(),
                            reason: "rejected by the identifier sanitizer".to_string(),
                        })),
                    );
                }
                return report;
            }
        };

        for format in formats {
            if report.outcomes.contains_key(format) {
                continue;
            }
            let path = self
                .out_dir
                .join(format!("{}_{}.{}", record.kind, identifier, format.extension()));
            let outcome = self.write_one(record, *format, &path);
            match &outcome {
                Ok(path) => info!(format = %format, path = %path.display(), "exported record"),
                Err(e) => warn!(format = %format, error = %e, "export failed"),
            }
            report.outcomes.insert(*format, outcome);
        }
        report
    }

    fn write_one(
        &self,
        record: &Record,
        format: OutputFormat,
        path: &Path,
    ) -> Result<PathBuf, ExportError> {
        let bytes = render(record, format)?;
        std::fs::create_dir_all(&self.out_dir).map_err(|e| ExportError::Write {
            path: self.out_dir.clone(),
            source: e,
        })?;
        std::fs::write(path, bytes).map_err(|e| ExportError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(path.to_path_buf())
    }
}

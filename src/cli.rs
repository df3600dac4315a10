//! CLI parsing and orchestration. Subcommands cover the record store and
//! export pipeline; scraping itself happens elsewhere and hands records in
//! via `import`. Maps errors to exit codes.

use crate::config::{self, Config};
use crate::export::{ExportOptions, ExportReport, Exporter};
use crate::formats::OutputFormat;
use crate::ident;
use crate::model::{summarize, Record, ScraperKind};
use crate::store::{RecordStore, StoreError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Export(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Store(_) => 2,
            CliRunError::Export(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "scrapkeep")]
#[command(about = "Store scraped records locally and export them to JSON, CSV, TXT, YAML, or XML")]
#[command(
    after_help = "Config file keys (storage_root, output_dir, allowed_output_roots, max_payload_bytes) are documented in the README. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Record store root. Default: config storage_root, else the platform data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Suppress status output (errors and requested data only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save a completed scrape payload (JSON file) as a record.
    Import {
        /// Path to the payload document produced by a scraper.
        file: PathBuf,

        /// Scraper kind: github, website, or youtube.
        #[arg(long, value_parser = parse_kind)]
        kind: ScraperKind,

        /// Source URL the payload was scraped from; determines the identifier.
        #[arg(long)]
        url: String,

        /// Also export to these formats after saving (comma-separated).
        #[arg(long, value_parser = parse_format, value_delimiter = ',')]
        formats: Vec<OutputFormat>,

        /// Output directory for exported files.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List saved records, newest first.
    List {
        /// Only show records of this kind.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<ScraperKind>,
    },

    /// Print a stored record as JSON.
    Show {
        #[arg(value_parser = parse_kind)]
        kind: ScraperKind,
        identifier: String,
    },

    /// Delete a stored record and its cached artifacts.
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: ScraperKind,
        identifier: String,
    },

    /// Export a stored record to one or more formats.
    Export {
        #[arg(value_parser = parse_kind)]
        kind: ScraperKind,
        identifier: String,

        /// Formats to write (comma-separated): json, csv, txt, yaml, xml.
        #[arg(long, required = true, value_parser = parse_format, value_delimiter = ',')]
        formats: Vec<OutputFormat>,

        /// Output directory for exported files.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_kind(s: &str) -> Result<ScraperKind, String> {
    ScraperKind::from_str(s)
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(s)
}

fn open_store(args: &Args, config: Option<&Config>) -> Result<RecordStore, CliRunError> {
    let root = args
        .data_dir
        .clone()
        .or_else(|| config.and_then(|c| c.storage_root.clone()))
        .unwrap_or_else(config::default_storage_root);
    let mut store = RecordStore::open(root)?;
    if let Some(limit) = config.and_then(|c| c.max_payload_bytes) {
        store = store.with_max_payload_bytes(limit);
    }
    Ok(store)
}

fn build_exporter(
    output: Option<&PathBuf>,
    config: Option<&Config>,
    store: &RecordStore,
) -> Result<Exporter, CliRunError> {
    let out_dir = output
        .cloned()
        .or_else(|| config.and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(config::default_output_dir);
    let options = ExportOptions {
        allow_roots: config.and_then(|c| c.allowed_output_roots.clone()),
        storage_root: Some(store.root().to_path_buf()),
    };
    Exporter::new(&out_dir, &options).map_err(|e| CliRunError::InvalidInput(e.to_string()))
}

fn print_report(report: &ExportReport, quiet: bool) -> Result<(), CliRunError> {
    for (format, path) in report.written() {
        if !quiet {
            eprintln!("Wrote {} ({})", path.display(), format);
        }
    }
    for (format, error) in report.failed() {
        eprintln!("Export to {} failed: {}", format, error);
    }
    if report.all_failed() {
        return Err(CliRunError::Export(
            "All requested export formats failed.".to_string(),
        ));
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let store = open_store(args, config.as_ref())?;

    match &args.command {
        Command::Import {
            file,
            kind,
            url,
            formats,
            output,
        } => {
            let text = std::fs::read_to_string(file).map_err(|e| {
                CliRunError::InvalidInput(format!(
                    "Cannot read payload file {}: {}",
                    file.display(),
                    e
                ))
            })?;
            let payload: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                CliRunError::InvalidInput(format!(
                    "Invalid payload JSON {}: {}",
                    file.display(),
                    e
                ))
            })?;

            let identifier = ident::resolve(*kind, url)
                .map_err(|e| CliRunError::InvalidInput(e.to_string()))?;
            let summary = summarize(*kind, &payload);
            let record = Record::new(*kind, identifier, url.clone(), payload).with_summary(summary);

            let path = store.save(&record)?;
            if !args.quiet {
                eprintln!("Saved {}/{} -> {}", record.kind, record.identifier, path.display());
            }

            if !formats.is_empty() {
                let exporter = build_exporter(output.as_ref(), config.as_ref(), &store)?;
                let report = exporter.export(&record, formats);
                print_report(&report, args.quiet)?;
            }
        }

        Command::List { kind } => {
            let rows = store.list(*kind)?;
            println!("Found {} saved record(s):", rows.len());
            for row in rows {
                if row.corrupt {
                    println!("- {}/{} [corrupt]", row.kind, row.identifier);
                    continue;
                }
                let saved_at = row
                    .saved_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("- {}/{} (saved at {})", row.kind, row.identifier, saved_at);
            }
        }

        Command::Show { kind, identifier } => {
            let record = store.load(*kind, identifier)?;
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| CliRunError::InvalidInput(format!("Cannot render record: {}", e)))?;
            println!("{}", json);
        }

        Command::Delete { kind, identifier } => {
            if store.delete(*kind, identifier)? {
                if !args.quiet {
                    eprintln!("Deleted {}/{}", kind, identifier);
                }
            } else {
                eprintln!("No record found for {}/{}", kind, identifier);
            }
        }

        Command::Export {
            kind,
            identifier,
            formats,
            output,
        } => {
            let record = store.load(*kind, identifier)?;
            let exporter = build_exporter(output.as_ref(), config.as_ref(), &store)?;
            let report = exporter.export(&record, formats);
            print_report(&report, args.quiet)?;
        }
    }
    Ok(())
}

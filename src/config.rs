//! Optional config file loading. Search order: ./scrapkeep.toml, then
//! $XDG_CONFIG_HOME/scrapkeep/config.toml (or ~/.config/scrapkeep/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Record store root when --data-dir is not set. Paths are relative to CWD.
    pub storage_root: Option<PathBuf>,
    /// Default export directory when -o is not set.
    pub output_dir: Option<PathBuf>,
    /// When set and non-empty, exports may only be written under these roots.
    pub allowed_output_roots: Option<Vec<PathBuf>>,
    /// Cap on serialized payload size in bytes (default 10 MiB).
    pub max_payload_bytes: Option<u64>,
}

/// Search order: (1) ./scrapkeep.toml, (2) $XDG_CONFIG_HOME/scrapkeep/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("scrapkeep.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("scrapkeep").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// Default record store root: platform data dir, or ./scrapkeep_data without one.
pub fn default_storage_root() -> PathBuf {
    match dirs::data_dir() {
        Some(d) => d.join("scrapkeep").join("storage"),
        None => PathBuf::from("scrapkeep_data").join("storage"),
    }
}

/// Default export directory, sibling of the storage root.
pub fn default_output_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(d) => d.join("scrapkeep").join("output"),
        None => PathBuf::from("scrapkeep_data").join("output"),
    }
}

//! Interchange-format renderers over the canonical record.
//!
//! JSON and YAML are structure-preserving and round-trip to an equal record.
//! CSV flattens into dotted-path columns, TXT renders an indented
//! human-readable view, XML maps fields to elements. All renderers are pure:
//! they take a record and return bytes, never touching the filesystem.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::model::Record;

/// Nesting bound for the flattening renderers. Well-formed records stay far
/// below this; the bound exists so pathological payloads fail cleanly
/// instead of recursing without limit.
const MAX_RENDER_DEPTH: usize = 32;

/// Output format selector for export and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputFormat {
    Json,
    Csv,
    Txt,
    Yaml,
    Xml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Json,
        OutputFormat::Csv,
        OutputFormat::Txt,
        OutputFormat::Yaml,
        OutputFormat::Xml,
    ];

    /// File extension, also the canonical name of the format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Txt => "txt",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "txt" | "text" => Ok(OutputFormat::Txt),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "xml" => Ok(OutputFormat::Xml),
            _ => Err(format!(
                "Unknown format: '{}'. Use json, csv, txt, yaml, or xml.",
                s
            )),
        }
    }
}

/// Errors from the format renderers.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Record structure too deep for {format} output (over {limit} levels)")]
    UnsupportedStructure {
        format: OutputFormat,
        limit: usize,
    },

    #[error("Failed to encode record as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode record as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to encode record as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to encode record: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a record into the given format.
pub fn render(record: &Record, format: OutputFormat) -> Result<Vec<u8>, FormatError> {
    match format {
        OutputFormat::Json => render_json(record),
        OutputFormat::Csv => render_csv(record),
        OutputFormat::Txt => render_txt(record),
        OutputFormat::Yaml => render_yaml(record),
        OutputFormat::Xml => render_xml(record),
    }
}

fn render_json(record: &Record) -> Result<Vec<u8>, FormatError> {
    let mut bytes = serde_json::to_vec_pretty(record)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn render_yaml(record: &Record) -> Result<Vec<u8>, FormatError> {
    Ok(serde_yaml::to_string(record)?.into_bytes())
}

/// The record as a generic value tree, the input for the flattening
/// renderers.
fn document(record: &Record) -> Result<Value, FormatError> {
    Ok(serde_json::to_value(record)?)
}

fn render_csv(record: &Record) -> Result<Vec<u8>, FormatError> {
    let doc = document(record)?;
    let mut columns: Vec<(String, String)> = Vec::new();
    flatten(OutputFormat::Csv, String::new(), &doc, 0, &mut columns)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(|(header, _)| header.as_str()))?;
    writer.write_record(columns.iter().map(|(_, value)| value.as_str()))?;
    writer
        .into_inner()
        .map_err(|e| FormatError::Io(e.into_error()))
}

/// Flatten a value tree into dotted-path columns. Scalar sequences become a
/// `", "`-joined cell; sequences containing nested structures are serialized
/// as compact JSON within the cell.
fn flatten(
    format: OutputFormat,
    prefix: String,
    value: &Value,
    depth: usize,
    out: &mut Vec<(String, String)>,
) -> Result<(), FormatError> {
    if depth > MAX_RENDER_DEPTH {
        return Err(FormatError::UnsupportedStructure {
            format,
            limit: MAX_RENDER_DEPTH,
        });
    }
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                out.push((prefix, String::new()));
                return Ok(());
            }
            for (key, inner) in map {
                let child = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(format, child, inner, depth + 1, out)?;
            }
        }
        Value::Array(items) => {
            let cell = if items.iter().all(is_scalar) {
                items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                serde_json::to_string(value)?
            };
            out.push((prefix, cell));
        }
        _ => out.push((prefix, scalar_to_string(value))),
    }
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_txt(record: &Record) -> Result<Vec<u8>, FormatError> {
    let doc = document(record)?;
    let mut buf = String::new();
    if let Value::Object(map) = &doc {
        for (key, value) in map {
            write_txt_entry(&mut buf, key, value, 0, 0)?;
        }
    }
    Ok(buf.into_bytes())
}

/// One `key: value` line, recursing with two-space indentation for nested
/// mappings and `- ` items for sequences.
fn write_txt_entry(
    buf: &mut String,
    key: &str,
    value: &Value,
    indent: usize,
    depth: usize,
) -> Result<(), FormatError> {
    if depth > MAX_RENDER_DEPTH {
        return Err(FormatError::UnsupportedStructure {
            format: OutputFormat::Txt,
            limit: MAX_RENDER_DEPTH,
        });
    }
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            let _ = writeln!(buf, "{}{}:", pad, key);
            for (k, v) in map {
                write_txt_entry(buf, k, v, indent + 1, depth + 1)?;
            }
        }
        Value::Array(items) => {
            let _ = writeln!(buf, "{}{}:", pad, key);
            let item_pad = "  ".repeat(indent + 1);
            for item in items {
                match item {
                    Value::Object(map) => {
                        let _ = writeln!(buf, "{}-", item_pad);
                        for (k, v) in map {
                            write_txt_entry(buf, k, v, indent + 2, depth + 2)?;
                        }
                    }
                    other => {
                        let _ = writeln!(buf, "{}- {}", item_pad, scalar_or_json(other));
                    }
                }
            }
        }
        other => {
            let _ = writeln!(buf, "{}{}: {}", pad, key, scalar_or_json(other));
        }
    }
    Ok(())
}

fn scalar_or_json(value: &Value) -> String {
    if is_scalar(value) {
        scalar_to_string(value)
    } else {
        value.to_string()
    }
}

fn render_xml(record: &Record) -> Result<Vec<u8>, FormatError> {
    let doc = document(record)?;
    let mut buf = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<record>\n");
    if let Value::Object(map) = &doc {
        for (key, value) in map {
            write_xml_element(&mut buf, key, value, 1, 0)?;
        }
    }
    buf.push_str("</record>\n");
    Ok(buf.into_bytes())
}

fn write_xml_element(
    buf: &mut String,
    key: &str,
    value: &Value,
    indent: usize,
    depth: usize,
) -> Result<(), FormatError> {
    if depth > MAX_RENDER_DEPTH {
        return Err(FormatError::UnsupportedStructure {
            format: OutputFormat::Xml,
            limit: MAX_RENDER_DEPTH,
        });
    }
    let pad = "  ".repeat(indent);
    let name = xml_name(key);
    match value {
        Value::Object(map) => {
            let _ = writeln!(buf, "{}<{}>", pad, name);
            for (k, v) in map {
                write_xml_element(buf, k, v, indent + 1, depth + 1)?;
            }
            let _ = writeln!(buf, "{}</{}>", pad, name);
        }
        Value::Array(items) => {
            let _ = writeln!(buf, "{}<{}>", pad, name);
            for item in items {
                write_xml_element(buf, "item", item, indent + 1, depth + 1)?;
            }
            let _ = writeln!(buf, "{}</{}>", pad, name);
        }
        Value::Null => {
            let _ = writeln!(buf, "{}<{}/>", pad, name);
        }
        other => {
            let _ = writeln!(
                buf,
                "{}<{}>{}</{}>",
                pad,
                name,
                xml_escape(&scalar_to_string(other)),
                name
            );
        }
    }
    Ok(())
}

pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Map an arbitrary payload key onto a valid XML element name: characters
/// outside `[A-Za-z0-9_.-]` become `_`, and a leading character that cannot
/// start a name gets a `_` prefix.
pub(crate) fn xml_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_ok = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{summarize, Record, ScraperKind};
    use serde_json::json;

    fn sample_record() -> Record {
        let payload = json!({
            "repository": {"name": "Hello-World", "owner": "octocat"},
            "files_count": 3,
            "languages": ["Rust", "C"],
            "files": [
                {"path": "README.md", "size": 120},
                {"path": "src/main.rs", "size": 840},
            ],
            "archived": false,
            "homepage": null,
        });
        let summary = summarize(ScraperKind::Github, &payload);
        Record::new(
            ScraperKind::Github,
            "octocat_hello-world",
            "https://github.com/octocat/Hello-World",
            payload,
        )
        .with_summary(summary)
    }

    #[test]
    fn format_parse_grid() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("xml".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn extension_for_each_format() {
        for format in OutputFormat::ALL {
            assert!(!format.extension().is_empty());
        }
        assert_eq!(OutputFormat::Yaml.extension(), "yaml");
    }

    #[test]
    fn all_formats_render_a_well_formed_record() {
        let record = sample_record();
        for format in OutputFormat::ALL {
            let bytes = render(&record, format).unwrap();
            assert!(!bytes.is_empty(), "{} output empty", format);
        }
    }

    #[test]
    fn json_round_trips_to_equal_record() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Json).unwrap();
        let parsed: Record = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn yaml_round_trips_to_equal_record() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Yaml).unwrap();
        let parsed: Record = serde_yaml::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn json_and_yaml_are_mutually_round_trippable() {
        let record = sample_record();
        let json_bytes = render(&record, OutputFormat::Json).unwrap();
        let from_json: Record = serde_json::from_slice(&json_bytes).unwrap();
        let yaml_bytes = render(&from_json, OutputFormat::Yaml).unwrap();
        let from_yaml: Record = serde_yaml::from_slice(&yaml_bytes).unwrap();
        assert_eq!(from_yaml, record);
    }

    #[test]
    fn csv_uses_dotted_path_headers() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        let row = lines.next().unwrap();
        assert!(header.contains("payload.repository.name"));
        assert!(header.contains("payload.files_count"));
        assert!(header.contains("scraper_type"));
        assert!(row.contains("Hello-World"));
        assert!(lines.next().is_none(), "one data row per record");
    }

    #[test]
    fn csv_joins_scalar_lists_and_embeds_nested_lists_as_json() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Rust, C"));
        // List of mappings: compact JSON inside the cell.
        assert!(text.contains(r#"{""path"":""README.md"""#));
    }

    #[test]
    fn txt_is_indented_and_tag_free() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Txt).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("identifier: octocat_hello-world"));
        assert!(text.contains("payload:"));
        assert!(text.contains("  repository:"));
        assert!(text.contains("    name: Hello-World"));
        assert!(text.contains("    - Rust"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn xml_wraps_fields_in_elements() {
        let record = sample_record();
        let bytes = render(&record, OutputFormat::Xml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\""));
        assert!(text.contains("<record>"));
        assert!(text.contains("<scraper_type>github</scraper_type>"));
        assert!(text.contains("<identifier>octocat_hello-world</identifier>"));
        assert!(text.contains("<item>"));
        assert!(text.contains("<homepage/>"));
        assert!(text.ends_with("</record>\n"));
    }

    #[test]
    fn xml_escapes_text_content() {
        let mut record = sample_record();
        record.payload = json!({"note": "a < b & \"c\""});
        let bytes = render(&record, OutputFormat::Xml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("a &lt; b &amp; &quot;c&quot;"));
    }

    #[test]
    fn xml_name_mangles_invalid_keys() {
        assert_eq!(xml_name("files count"), "files_count");
        assert_eq!(xml_name("2fast"), "_2fast");
        assert_eq!(xml_name(""), "_");
        assert_eq!(xml_name("ok-key.v2"), "ok-key.v2");
    }

    #[test]
    fn xml_keys_with_spaces_render_as_valid_elements() {
        let mut record = sample_record();
        record.payload = json!({"files count": 3});
        let bytes = render(&record, OutputFormat::Xml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<files_count>3</files_count>"));
    }

    #[test]
    fn deep_nesting_fails_with_unsupported_structure() {
        let mut payload = json!("leaf");
        for _ in 0..(MAX_RENDER_DEPTH + 2) {
            payload = json!({ "nested": payload });
        }
        let mut record = sample_record();
        record.payload = payload;
        for format in [OutputFormat::Csv, OutputFormat::Txt, OutputFormat::Xml] {
            let result = render(&record, format);
            assert!(
                matches!(result, Err(FormatError::UnsupportedStructure { .. })),
                "{} should hit the depth bound",
                format
            );
        }
        // Structure-preserving formats are unaffected by the bound.
        assert!(render(&record, OutputFormat::Json).is_ok());
    }

    #[test]
    fn depth_five_payload_renders_in_every_format() {
        let mut record = sample_record();
        record.payload = json!({"a": {"b": {"c": {"d": {"e": "leaf"}}}}});
        for format in OutputFormat::ALL {
            assert!(render(&record, format).is_ok());
        }
    }
}

//! Untrusted-input validation in front of every filesystem path.
//!
//! Identifiers and output directories pass through here before the store or
//! exporter touches disk. Rejection is the only recovery path: nothing in
//! this module repairs input.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Upper bound on identifier length, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Rejected identifier or output path.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("Unsafe identifier '{input}': {reason}")]
    UnsafeIdentifier { input: String, reason: String },

    #[error("Unsafe output path '{input}': {reason}")]
    UnsafePath { input: String, reason: String },
}

fn bad_identifier(input: &str, reason: impl Into<String>) -> SanitizeError {
    SanitizeError::UnsafeIdentifier {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn bad_path(input: &Path, reason: impl Into<String>) -> SanitizeError {
    SanitizeError::UnsafePath {
        input: input.display().to_string(),
        reason: reason.into(),
    }
}

/// Validate an identifier for direct use as a single path segment.
///
/// Accepts only `[A-Za-z0-9._-]`, bounded length, no leading dot, no `..`
/// sequence anywhere. Purely lexical: never touches the filesystem.
pub fn sanitize_identifier(raw: &str) -> Result<&str, SanitizeError> {
    if raw.is_empty() {
        return Err(bad_identifier(raw, "identifier is empty"));
    }
    if raw.len() > MAX_IDENTIFIER_LEN {
        return Err(bad_identifier(
            raw,
            format!("longer than {} bytes", MAX_IDENTIFIER_LEN),
        ));
    }
    if raw.contains("..") {
        return Err(bad_identifier(raw, "contains a '..' traversal sequence"));
    }
    if raw.contains('/') || raw.contains('\\') {
        return Err(bad_identifier(raw, "contains a path separator"));
    }
    if raw.starts_with('.') {
        return Err(bad_identifier(raw, "starts with a dot"));
    }
    if let Some(c) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(bad_identifier(raw, format!("contains '{}'", c)));
    }
    Ok(raw)
}

/// Validate an output directory and resolve it to an absolute path.
///
/// Relative input is resolved against the current directory. The existing
/// prefix of the path is canonicalized (following symlinks) so allow-list
/// checks cannot be bypassed. When `allow_roots` is non-empty the resolved
/// directory must live under one of them. Traversal components and obviously
/// unwritable targets are rejected before any directory is created.
pub fn sanitize_output_dir(
    raw: &Path,
    allow_roots: Option<&[PathBuf]>,
) -> Result<PathBuf, SanitizeError> {
    if raw.as_os_str().is_empty() {
        return Err(bad_path(raw, "output directory is empty"));
    }
    // Lexical checks first, so traversal is rejected without filesystem access.
    if raw.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(bad_path(raw, "contains a '..' traversal component"));
    }

    let absolute = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| bad_path(raw, format!("cannot resolve current directory: {}", e)))?;
        cwd.join(raw)
    };

    // Allow-list check on the lexical absolute path. "/" or anything else
    // outside the allowed roots is rejected here, before any fs call.
    if let Some(roots) = allow_roots {
        if !roots.is_empty() && !roots.iter().any(|root| absolute.starts_with(root)) {
            return Err(bad_path(raw, "outside the allowed output roots"));
        }
    }

    let resolved = resolve_existing_prefix(&absolute).map_err(|e| bad_path(raw, e))?;

    // Re-check after following symlinks: a link inside an allowed root must
    // not point outside it.
    if let Some(roots) = allow_roots {
        if !roots.is_empty() {
            let canonical_roots: Vec<PathBuf> = roots
                .iter()
                .map(|root| root.canonicalize().unwrap_or_else(|_| root.clone()))
                .collect();
            if !canonical_roots.iter().any(|root| resolved.starts_with(root)) {
                return Err(bad_path(raw, "resolves outside the allowed output roots"));
            }
        }
    }

    Ok(resolved)
}

/// Canonicalize the longest existing ancestor of `path` and append the
/// remaining (not yet created) components. Fails when the existing ancestor
/// is not a writable directory.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, String> {
    let mut existing = path;
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return Err("no existing ancestor".to_string()),
        }
    }

    let meta = std::fs::metadata(existing)
        .map_err(|e| format!("cannot stat {}: {}", existing.display(), e))?;
    if !meta.is_dir() {
        return Err(format!("{} is not a directory", existing.display()));
    }
    if meta.permissions().readonly() && !tail.is_empty() {
        return Err(format!(
            "{} is read-only; cannot create output directory under it",
            existing.display()
        ));
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| format!("cannot canonicalize {}: {}", existing.display(), e))?;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_safe_slugs() {
        for id in ["octocat_hello-world", "example.com", "UCabc123", "a"] {
            assert_eq!(sanitize_identifier(id).unwrap(), id);
        }
    }

    #[test]
    fn identifier_rejects_empty() {
        assert!(matches!(
            sanitize_identifier(""),
            Err(SanitizeError::UnsafeIdentifier { .. })
        ));
    }

    #[test]
    fn identifier_rejects_traversal() {
        assert!(sanitize_identifier("../../etc/passwd").is_err());
        assert!(sanitize_identifier("a..b").is_err());
        assert!(sanitize_identifier("..").is_err());
    }

    #[test]
    fn identifier_rejects_separators_and_leading_dot() {
        assert!(sanitize_identifier("a/b").is_err());
        assert!(sanitize_identifier("a\\b").is_err());
        assert!(sanitize_identifier(".hidden").is_err());
    }

    #[test]
    fn identifier_rejects_over_length() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(sanitize_identifier(&long).is_err());
        let max = "a".repeat(MAX_IDENTIFIER_LEN);
        assert!(sanitize_identifier(&max).is_ok());
    }

    #[test]
    fn identifier_rejects_unsafe_characters() {
        assert!(sanitize_identifier("a b").is_err());
        assert!(sanitize_identifier("a:b").is_err());
        assert!(sanitize_identifier("caf\u{e9}").is_err());
    }

    #[test]
    fn output_dir_rejects_empty_and_traversal() {
        assert!(sanitize_output_dir(Path::new(""), None).is_err());
        assert!(sanitize_output_dir(Path::new("out/../../etc"), None).is_err());
    }

    #[test]
    fn output_dir_rejects_root_outside_allow_list() {
        let allow = vec![std::env::temp_dir()];
        let result = sanitize_output_dir(Path::new("/"), Some(&allow));
        assert!(matches!(result, Err(SanitizeError::UnsafePath { .. })));
    }

    #[test]
    fn output_dir_accepts_path_under_allowed_root() {
        let tmp = tempfile::tempdir().unwrap();
        let allow = vec![tmp.path().to_path_buf()];
        let target = tmp.path().join("exports");
        let resolved = sanitize_output_dir(&target, Some(&allow)).unwrap();
        assert!(resolved.ends_with("exports"));
    }

    #[test]
    fn output_dir_resolves_not_yet_created_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a").join("b");
        let resolved = sanitize_output_dir(&target, None).unwrap();
        assert!(resolved.ends_with(Path::new("a/b")));
        // Validation alone must not create anything.
        assert!(!target.exists());
    }

    #[test]
    fn output_dir_without_allow_list_accepts_temp() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(sanitize_output_dir(tmp.path(), None).is_ok());
    }
}

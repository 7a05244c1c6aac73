//! File-system wildcard resolution.
//!
//! `resolve_glob("src/**/*.rs;README.md", base)`:
//!
//! - Parts without `*`/`?` are passed through as written (existence is not checked).
//! - Wildcard parts split into a literal prefix (`src`) and a `glob::Pattern`
//!   for the rest (`**/*.rs`). The prefix directory is walked depth-first with entries
//!   sorted by file name, so results do not depend on the platform's listing order.
//!
//! Results keep the pattern's own spelling (`src/sub/a.rs`, not an absolute path).

use crate::GlobError;
use ::glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMatch {
    pub path: String,
    /// Directory portion below the literal prefix, with a trailing `/` (empty for literals).
    pub recursive_dir: String,
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Lexically normalize `path`: drop `.` components and fold `..` into its parent.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Comparison key for item identities: unified separators, no leading `./`.
/// Case folds only where the file system does.
pub(crate) fn path_key(s: &str) -> String {
    let mut key = s.trim().replace('\\', "/");
    while let Some(rest) = key.strip_prefix("./") {
        key = rest.to_string();
    }
    if cfg!(windows) { key.to_ascii_lowercase() } else { key }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> GlobError {
    GlobError::InvalidPattern { pattern: pattern.to_string(), reason: reason.into() }
}

/// Turn the wildcard segments of a pattern into a matcher over `/`-joined relative paths.
/// Only `*`, `?` and `**` are wildcards; brackets match themselves.
fn compile(pattern: &str, segments: &[&str]) -> Result<Pattern, GlobError> {
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(pattern, "empty path segment after a wildcard"));
    }
    let mut source = String::new();
    for ch in segments.join("/").chars() {
        match ch {
            '[' => source.push_str("[[]"),
            ']' => source.push_str("[]]"),
            c => source.push(c),
        }
    }
    Pattern::new(&source).map_err(|e| invalid(pattern, e.msg))
}

fn match_options() -> MatchOptions {
    MatchOptions { case_sensitive: !cfg!(windows), require_literal_separator: true, require_literal_leading_dot: false }
}

fn resolve_one(pattern: &str, base_dir: &Path, out: &mut Vec<GlobMatch>) -> Result<(), GlobError> {
    let unified = pattern.replace('\\', "/");
    let segments: Vec<&str> = unified.split('/').collect();
    let first_wild = segments.iter().position(|s| has_wildcard(s)).unwrap_or(segments.len());
    let (fixed, wild) = segments.split_at(first_wild);
    let prefix = fixed.join("/");
    let matcher = compile(pattern, wild)?;

    let root = if prefix.is_empty() { base_dir.to_path_buf() } else { base_dir.join(&prefix) };
    let mut walker = WalkDir::new(&root).min_depth(1).sort_by_file_name();
    if !wild.contains(&"**") {
        walker = walker.max_depth(wild.len());
    }

    let before = out.len();
    for entry in walker.into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&root) else { continue };
        let rel: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        let rel = rel.join("/");
        if !matcher.matches_with(&rel, match_options()) {
            continue;
        }
        let recursive_dir = match rel.rfind('/') {
            Some(i) => rel[..=i].to_string(),
            None => String::new(),
        };
        let path = if prefix.is_empty() {
            rel
        } else if prefix.ends_with('/') {
            format!("{prefix}{rel}")
        } else {
            format!("{prefix}/{rel}")
        };
        out.push(GlobMatch { path, recursive_dir });
    }
    tracing::trace!(pattern, root = %root.display(), matches = out.len() - before, "glob resolved");
    Ok(())
}

/// Resolve a `;`-separated include string against `base_dir`.
pub fn resolve_glob(pattern: &str, base_dir: &Path) -> Result<Vec<GlobMatch>, GlobError> {
    let mut out = Vec::new();
    for part in pattern.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if has_wildcard(part) {
            resolve_one(part, base_dir, &mut out)?;
        } else {
            out.push(GlobMatch { path: part.to_string(), recursive_dir: String::new() });
        }
    }
    Ok(out)
}

//! Share-path listing from the exports file.
//!
//! Monitoring plumbing: a line-oriented scan of the ganesha exports/config
//! file for `Path "<value>"` entries, returned de-duplicated and sorted.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{fs_err, HaResult};

/// Extracts the exported share paths from `exports_file`.
///
/// Both `Path "/export"` and `Path = "/export";` spellings are accepted,
/// case-insensitively. Lines without a quoted value are skipped.
pub fn list_share_paths(exports_file: &Path) -> HaResult<Vec<String>> {
    let contents = fs::read_to_string(exports_file).map_err(fs_err(exports_file))?;
    let mut paths = BTreeSet::new();
    for line in contents.lines() {
        if let Some(value) = share_path_in_line(line) {
            paths.insert(value.to_string());
        }
    }
    Ok(paths.into_iter().collect())
}

fn share_path_in_line(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let rest = strip_keyword(trimmed, "path")?;
    let rest = rest.trim_start().strip_prefix('=').unwrap_or(rest);
    let (_, after_quote) = rest.split_once('"')?;
    let (value, _) = after_quote.split_once('"')?;
    Some(value)
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    // Reject identifiers that merely start with the keyword (e.g. Pathname).
    match rest.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(rest),
    }
}

//! Mount presence probing for the shared clustered filesystem.
//!
//! The agent never mounts or unmounts anything; it only asks whether the
//! shared filesystem is there yet. Absence is transient-not-ready, handled
//! by the coordinator, never an error here.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Answers whether a mountpoint is currently mounted.
pub trait MountProbe {
    /// True if something is mounted at `mountpoint`.
    fn is_mounted(&self, mountpoint: &Path) -> bool;
}

/// Production probe backed by `/proc/self/mounts`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMounts;

impl MountProbe for ProcMounts {
    fn is_mounted(&self, mountpoint: &Path) -> bool {
        match fs::read_to_string("/proc/self/mounts") {
            Ok(table) => mount_table_contains(&table, mountpoint),
            Err(e) => {
                debug!(error = %e, "could not read mount table");
                false
            }
        }
    }
}

/// Scans a mounts-table in `/proc/self/mounts` format for `mountpoint`.
///
/// The second whitespace-separated field is the mountpoint, with spaces,
/// tabs and newlines encoded as octal escapes.
pub fn mount_table_contains(table: &str, mountpoint: &Path) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|raw| decode_mount_path(raw) == mountpoint)
}

fn decode_mount_path(raw: &str) -> PathBuf {
    let mut out = String::with_capacity(raw.len());
    let mut bytes = raw.bytes().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\\' {
            let mut code = 0u32;
            let mut digits = 0;
            while digits < 3 {
                match bytes.peek() {
                    Some(d @ b'0'..=b'7') => {
                        code = code * 8 + u32::from(d - b'0');
                        bytes.next();
                        digits += 1;
                    }
                    _ => break,
                }
            }
            if digits == 3 {
                if let Some(c) = char::from_u32(code) {
                    out.push(c);
                    continue;
                }
            }
            out.push('\\');
        } else {
            out.push(b as char);
        }
    }
    PathBuf::from(out)
}

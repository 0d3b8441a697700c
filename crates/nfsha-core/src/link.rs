//! Idempotent symlink reconciliation.
//!
//! Every link the agent manages goes through [`reconcile_symlink`]: it
//! tolerates any prior state at the link path (absent, already correct,
//! pointing elsewhere, or occupied by a plain file or directory) and leaves
//! behind exactly one symlink resolving to the desired target. Calling it
//! again with the same arguments changes nothing, which is what makes the
//! higher-level reconciliation passes safe to re-run from any node at any
//! time.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{fs_err, HaResult};

/// Ensures `link_path` is a symlink resolving to `target`.
///
/// Pre-existing non-link state at `link_path` is discarded in favor of the
/// reconciled link. Filesystem failures propagate immediately; retry policy
/// belongs to the caller.
pub fn reconcile_symlink(target: &Path, link_path: &Path) -> HaResult<()> {
    info!(
        target = %target.display(),
        link = %link_path.display(),
        "reconciling symlink"
    );

    match fs::symlink_metadata(link_path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(link_path).map_err(fs_err(link_path))?;
            if current == target {
                debug!(link = %link_path.display(), "link already correct");
                return Ok(());
            }
            debug!(
                link = %link_path.display(),
                stale = %current.display(),
                "removing stale link"
            );
            fs::remove_file(link_path).map_err(fs_err(link_path))?;
        }
        Ok(meta) if meta.is_dir() => {
            debug!(link = %link_path.display(), "removing directory occupying link path");
            fs::remove_dir_all(link_path).map_err(fs_err(link_path))?;
        }
        Ok(_) => {
            debug!(link = %link_path.display(), "removing file occupying link path");
            fs::remove_file(link_path).map_err(fs_err(link_path))?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(fs_err(link_path)(e)),
    }

    symlink(target, link_path).map_err(fs_err(link_path))?;
    Ok(())
}

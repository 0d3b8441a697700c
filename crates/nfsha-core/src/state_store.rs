//! Per-node NFS state directory under the shared clustered filesystem.
//!
//! Each node owns exactly one state directory, `{shared_root}/{address}`,
//! holding the ganesha v4 recovery trees, the statd monitor lists, and the
//! lock-state marker files that the NFS daemon reads and writes. This module
//! creates the skeleton and binds the daemon's legacy state path
//! (`/var/lib/nfs`-style) into it; the daemon's own records are never
//! truncated or deleted here.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{fs_err, HaResult};
use crate::link::reconcile_symlink;

/// Subdirectory holding NFSv4 recovery state.
pub const GANESHA_DIR: &str = "ganesha";
/// Current NFSv4 recovery epoch directory.
pub const V4_RECOV_DIR: &str = "v4recov";
/// Previous NFSv4 recovery epoch directory.
pub const V4_OLD_DIR: &str = "v4old";
/// Subdirectory holding statd lock-monitor state.
pub const STATD_DIR: &str = "statd";
/// statd monitored-hosts directory.
pub const SM_DIR: &str = "sm";
/// statd monitored-hosts backup directory.
pub const SM_BAK_DIR: &str = "sm.bak";
/// Lock-state marker file name, at the node root and under `statd/`.
pub const STATE_FILE: &str = "state";

/// Suffix appended to the legacy state path when preserving pre-clustering
/// content.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Owns the state directory for one cluster address under one shared root.
#[derive(Debug, Clone)]
pub struct NodeStateStore {
    shared_root: PathBuf,
    address: String,
}

impl NodeStateStore {
    /// Creates a store rooted at `shared_root` for the node known by
    /// `address`. Nothing is touched on disk until
    /// [`ensure_node_state`](Self::ensure_node_state) runs.
    pub fn new(shared_root: impl Into<PathBuf>, address: impl Into<String>) -> Self {
        Self {
            shared_root: shared_root.into(),
            address: address.into(),
        }
    }

    /// The address this store is keyed by.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// `{shared_root}/{address}` — this node's state directory.
    pub fn node_dir(&self) -> PathBuf {
        self.shared_root.join(&self.address)
    }

    /// `{node_dir}/ganesha` — the v4 recovery subtree.
    pub fn ganesha_dir(&self) -> PathBuf {
        self.node_dir().join(GANESHA_DIR)
    }

    /// `{node_dir}/statd` — the statd subtree.
    pub fn statd_dir(&self) -> PathBuf {
        self.node_dir().join(STATD_DIR)
    }

    /// Idempotently creates the directory skeleton and marker files for this
    /// node. Existing files are left exactly as they are; the daemon owns
    /// their contents once they exist.
    pub fn ensure_node_state(&self) -> HaResult<()> {
        info!(
            node_dir = %self.node_dir().display(),
            "ensuring node state skeleton"
        );

        let ganesha = self.ganesha_dir();
        let statd = self.statd_dir();
        for dir in [
            ganesha.join(V4_RECOV_DIR),
            ganesha.join(V4_OLD_DIR),
            statd.join(SM_DIR),
            statd.join(SM_BAK_DIR),
        ] {
            fs::create_dir_all(&dir).map_err(fs_err(&dir))?;
        }

        touch(&self.node_dir().join(STATE_FILE))?;
        touch(&statd.join(STATE_FILE))?;
        Ok(())
    }

    /// Points `legacy` (the daemon's cluster-unaware state path) at this
    /// node's state directory.
    ///
    /// If `legacy` is still a real directory from before clustering and no
    /// backup exists yet, it is renamed aside with [`BACKUP_SUFFIX`] first.
    /// The rename happens at most once over the lifetime of the node; later
    /// calls find a symlink (or an existing backup) and skip it.
    pub fn bind_legacy_path(&self, legacy: &Path) -> HaResult<()> {
        let backup = backup_path(legacy);
        match fs::symlink_metadata(legacy) {
            Ok(meta) if !meta.file_type().is_symlink() && meta.is_dir() => {
                if !backup.exists() {
                    info!(
                        legacy = %legacy.display(),
                        backup = %backup.display(),
                        "preserving pre-clustering state"
                    );
                    fs::rename(legacy, &backup).map_err(fs_err(legacy))?;
                } else {
                    debug!(backup = %backup.display(), "backup already present");
                }
            }
            _ => {}
        }
        reconcile_symlink(&self.node_dir(), legacy)
    }
}

fn backup_path(legacy: &Path) -> PathBuf {
    let mut name = legacy.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Create-if-absent without truncation. Live lock/recovery records must
/// survive repeated reconciliation.
fn touch(path: &Path) -> HaResult<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(fs_err(path))?;
    Ok(())
}

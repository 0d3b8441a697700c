//! Agent configuration.
//!
//! One small serde struct loaded from TOML or JSON, validated exactly once
//! at startup into [`ResolvedPaths`]. The clustered-filesystem variant is a
//! closed enum; variant dispatch happens here and nowhere else.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{fs_err, HaError, HaResult};

/// Conventional gluster shared-storage mountpoint.
const GLUSTER_SHARED_MOUNT: &str = "/run/gluster/shared_storage";
/// Directory under the shared mount holding the HA state tree.
const STATE_SUBDIR: &str = "nfs-ha";

/// Supported clustered-filesystem kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsVariant {
    /// POSIX clustered filesystem mounted at a site-chosen path; the path
    /// must be configured.
    Gpfs,
    /// Gluster shared storage with its conventional fixed mountpoint.
    Gluster,
}

/// Full agent configuration. Omitted fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HaConfig {
    /// Which clustered filesystem hosts the shared state.
    pub fs_variant: FsVariant,
    /// Mountpoint of the shared filesystem. Required for `gpfs`; overrides
    /// the conventional path for `gluster`.
    pub shared_mount: Option<PathBuf>,
    /// This node's cluster address, used as its stable state-directory key.
    pub node_address: String,
    /// The daemon's cluster-unaware state path.
    pub legacy_state_dir: PathBuf,
    /// Exports/config file scanned for share paths.
    pub exports_file: PathBuf,
    /// Expected daemon binary, compared against `/proc/<pid>/exe` in health
    /// checks.
    pub daemon_binary: PathBuf,
    /// systemd unit controlling the daemon.
    pub service_unit: String,
    /// Daemon pid file.
    pub pid_file: PathBuf,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            fs_variant: FsVariant::Gluster,
            shared_mount: None,
            node_address: String::new(),
            legacy_state_dir: PathBuf::from("/var/lib/nfs"),
            exports_file: PathBuf::from("/etc/ganesha/ganesha.conf"),
            daemon_binary: PathBuf::from("/usr/bin/ganesha.nfsd"),
            service_unit: String::from("nfs-ganesha"),
            pid_file: PathBuf::from("/run/ganesha.pid"),
        }
    }
}

/// Shared-filesystem paths, resolved once from a validated config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Mountpoint whose presence gates all reconciliation.
    pub mountpoint: PathBuf,
    /// Root of the HA state tree inside the shared filesystem.
    pub shared_root: PathBuf,
}

impl HaConfig {
    /// Loads configuration from a TOML or JSON file, by extension.
    pub fn from_file(path: &Path) -> HaResult<Self> {
        let contents = fs::read_to_string(path).map_err(fs_err(path))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| HaError::Config {
                msg: format!("{}: {}", path.display(), e),
            }),
            "json" => serde_json::from_str(&contents).map_err(|e| HaError::Config {
                msg: format!("{}: {}", path.display(), e),
            }),
            other => Err(HaError::config(format!(
                "unsupported config file extension: {other}"
            ))),
        }
    }

    /// Validates the config and resolves the variant-specific paths.
    pub fn resolve(&self) -> HaResult<ResolvedPaths> {
        if self.node_address.is_empty() {
            return Err(HaError::config("node_address must be set"));
        }
        if self.node_address.contains('/') {
            return Err(HaError::config(format!(
                "node_address {:?} must not contain '/'",
                self.node_address
            )));
        }

        let mountpoint = match (self.fs_variant, &self.shared_mount) {
            (FsVariant::Gpfs, Some(mount)) => mount.clone(),
            (FsVariant::Gpfs, None) => {
                return Err(HaError::config("shared_mount is required for gpfs"));
            }
            (FsVariant::Gluster, Some(mount)) => mount.clone(),
            (FsVariant::Gluster, None) => PathBuf::from(GLUSTER_SHARED_MOUNT),
        };

        Ok(ResolvedPaths {
            shared_root: mountpoint.join(STATE_SUBDIR),
            mountpoint,
        })
    }
}

//! NFS service daemon lifecycle collaborator.
//!
//! The agent starts and stops the daemon around its own reconciliation steps
//! and consumes liveness for health checks, but never manages the daemon
//! beyond that. Anything that goes wrong while probing status reads as
//! daemon-down rather than a fatal error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{HaError, HaResult};

/// Liveness snapshot of the service daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// PID from the daemon's pid file, if one could be read.
    pub pid: Option<i32>,
    /// Whether that PID names a live process.
    pub running: bool,
    /// The binary the live process is executing, if resolvable.
    pub exe: Option<PathBuf>,
}

/// Start/stop/status contract for the NFS service daemon.
pub trait ServiceLifecycle {
    /// Starts the daemon.
    fn start(&self) -> HaResult<()>;
    /// Stops the daemon.
    fn stop(&self) -> HaResult<()>;
    /// Reports daemon liveness. Probe failures are reported as not-running,
    /// never as errors.
    fn status(&self) -> ServiceStatus;
}

/// systemd-managed daemon: `systemctl start/stop <unit>`, liveness from the
/// pid file and `/proc`.
#[derive(Debug, Clone)]
pub struct SystemdUnit {
    unit: String,
    pid_file: PathBuf,
}

impl SystemdUnit {
    /// A unit named `unit` whose daemon writes its PID to `pid_file`.
    pub fn new(unit: impl Into<String>, pid_file: impl Into<PathBuf>) -> Self {
        Self {
            unit: unit.into(),
            pid_file: pid_file.into(),
        }
    }

    fn systemctl(&self, verb: &str) -> HaResult<()> {
        debug!(unit = %self.unit, verb, "invoking systemctl");
        let output = Command::new("systemctl")
            .arg(verb)
            .arg(&self.unit)
            .output()
            .map_err(|e| HaError::Service {
                msg: format!("could not run systemctl {} {}: {}", verb, self.unit, e),
            })?;
        if !output.status.success() {
            return Err(HaError::Service {
                msg: format!(
                    "systemctl {} {} exited with {}: {}",
                    verb,
                    self.unit,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl ServiceLifecycle for SystemdUnit {
    fn start(&self) -> HaResult<()> {
        self.systemctl("start")
    }

    fn stop(&self) -> HaResult<()> {
        self.systemctl("stop")
    }

    fn status(&self) -> ServiceStatus {
        let pid = match read_pid(&self.pid_file) {
            Some(pid) => pid,
            None => {
                warn!(pid_file = %self.pid_file.display(), "no readable pid file");
                return ServiceStatus::default();
            }
        };

        let proc_dir = PathBuf::from(format!("/proc/{pid}"));
        if !proc_dir.exists() {
            return ServiceStatus {
                pid: Some(pid),
                running: false,
                exe: None,
            };
        }
        ServiceStatus {
            pid: Some(pid),
            running: true,
            exe: fs::read_link(proc_dir.join("exe")).ok(),
        }
    }
}

fn read_pid(pid_file: &Path) -> Option<i32> {
    let raw = fs::read_to_string(pid_file).ok()?;
    raw.trim().parse().ok()
}

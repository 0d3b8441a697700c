//! Command-line dispatch for the cluster event dispatcher.
//!
//! The external cluster manager invokes one operation per process: the exit
//! status is its health/retry signal. A not-yet-mounted shared filesystem
//! exits zero with an informational message so automated retries do not
//! treat it as an error; real failures and failed health checks exit
//! non-zero.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use nfsha_core::shares::list_share_paths;
use nfsha_core::{
    FailoverCoordinator, HaConfig, Health, MountProbe, Outcome, ProcMounts, ServiceLifecycle,
    SystemdUnit,
};

/// NFS HA agent: shared-state reconciliation and virtual-IP failover.
#[derive(Parser)]
#[command(name = "nfsha")]
#[command(about = "NFS HA shared-state reconciliation agent", long_about = None)]
pub struct Cli {
    /// Agent configuration file (TOML or JSON).
    #[arg(short, long, env = "NFSHA_CONFIG", default_value = "/etc/nfsha/nfsha.toml")]
    pub config: PathBuf,

    /// The cluster operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Operations invoked by the cluster manager.
#[derive(Subcommand)]
pub enum Command {
    /// Reconcile the shared state tree, then start the NFS daemon.
    Startup,
    /// Stop the NFS daemon.
    Shutdown,
    /// Reconcile, then verify daemon liveness. Non-zero exit when unhealthy.
    Check,
    /// Take over the lock-state entry for a virtual IP.
    TakeIp {
        /// The virtual IP's peer-state entry to take over.
        address: String,
    },
    /// Release a virtual IP. Leaves the peer entry with its last taker.
    ReleaseIp {
        /// The virtual IP being released.
        address: String,
    },
    /// List exported share paths for monitoring.
    ListShares,
}

impl Cli {
    /// Loads configuration and runs the selected operation.
    pub fn run(self) -> Result<()> {
        let config = if self.config.exists() {
            HaConfig::from_file(&self.config)?
        } else {
            warn!(
                config = %self.config.display(),
                "config file not found, using defaults"
            );
            HaConfig::default()
        };
        self.dispatch(config, ProcMounts)
    }

    fn dispatch(self, config: HaConfig, mounts: impl MountProbe) -> Result<()> {
        if let Command::ListShares = self.command {
            for path in list_share_paths(&config.exports_file)? {
                println!("{path}");
            }
            return Ok(());
        }

        let service = SystemdUnit::new(config.service_unit.clone(), config.pid_file.clone());
        run_command(self.command, config, service, mounts)
    }
}

/// Runs one cluster operation against a coordinator built from `config`.
/// Split out from [`Cli::dispatch`] so tests can substitute the service
/// lifecycle and mount probe.
pub fn run_command(
    command: Command,
    config: HaConfig,
    service: impl ServiceLifecycle,
    mounts: impl MountProbe,
) -> Result<()> {
    let mut coordinator = FailoverCoordinator::new(config, service, mounts)?;
    match command {
        Command::Startup => match coordinator.startup()? {
            Outcome::NotReady => {
                println!("shared filesystem not mounted yet; startup deferred");
                Ok(())
            }
            Outcome::Ready => coordinator.start_service(),
        }
        .map_err(Into::into),
        Command::Shutdown => coordinator.stop_service().map_err(Into::into),
        Command::Check => match coordinator.check()? {
            Health::Healthy => {
                println!("healthy");
                Ok(())
            }
            Health::Unhealthy(reason) => anyhow::bail!("unhealthy: {reason}"),
        },
        Command::TakeIp { address } => coordinator.take_ip(&address).map_err(Into::into),
        Command::ReleaseIp { address } => coordinator.release_ip(&address).map_err(Into::into),
        Command::ListShares => unreachable!("handled before coordinator construction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfsha_core::{FsVariant, HaResult, ServiceStatus};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingService {
        calls: RefCell<Vec<&'static str>>,
    }

    impl ServiceLifecycle for &RecordingService {
        fn start(&self) -> HaResult<()> {
            self.calls.borrow_mut().push("start");
            Ok(())
        }
        fn stop(&self) -> HaResult<()> {
            self.calls.borrow_mut().push("stop");
            Ok(())
        }
        fn status(&self) -> ServiceStatus {
            ServiceStatus::default()
        }
    }

    struct StubMounts(bool);

    impl MountProbe for StubMounts {
        fn is_mounted(&self, _mountpoint: &Path) -> bool {
            self.0
        }
    }

    fn config_for(root: &Path) -> HaConfig {
        HaConfig {
            fs_variant: FsVariant::Gpfs,
            shared_mount: Some(root.to_path_buf()),
            node_address: "10.0.0.1".to_string(),
            legacy_state_dir: root.join("legacy"),
            ..HaConfig::default()
        }
    }

    #[test]
    fn parses_every_cluster_manager_operation() {
        for args in [
            vec!["nfsha", "startup"],
            vec!["nfsha", "shutdown"],
            vec!["nfsha", "check"],
            vec!["nfsha", "take-ip", "10.0.0.99"],
            vec!["nfsha", "release-ip", "10.0.0.99"],
            vec!["nfsha", "list-shares"],
        ] {
            assert!(
                Cli::try_parse_from(args.iter().copied()).is_ok(),
                "failed on {args:?}"
            );
        }
    }

    #[test]
    fn take_ip_requires_an_address() {
        assert!(Cli::try_parse_from(["nfsha", "take-ip"]).is_err());
    }

    #[test]
    fn startup_when_ready_reconciles_then_starts_the_daemon() {
        let root = TempDir::new().unwrap();
        let service = RecordingService::default();

        run_command(
            Command::Startup,
            config_for(root.path()),
            &service,
            StubMounts(true),
        )
        .unwrap();

        assert_eq!(*service.calls.borrow(), vec!["start"]);
        assert!(root.path().join("nfs-ha/10.0.0.1/ganesha/v4recov").is_dir());
    }

    #[test]
    fn startup_when_unmounted_succeeds_without_starting_the_daemon() {
        let root = TempDir::new().unwrap();
        let service = RecordingService::default();

        run_command(
            Command::Startup,
            config_for(root.path()),
            &service,
            StubMounts(false),
        )
        .unwrap();

        assert!(service.calls.borrow().is_empty());
        assert!(!root.path().join("nfs-ha").exists());
    }

    #[test]
    fn shutdown_stops_the_daemon() {
        let root = TempDir::new().unwrap();
        let service = RecordingService::default();

        run_command(
            Command::Shutdown,
            config_for(root.path()),
            &service,
            StubMounts(true),
        )
        .unwrap();

        assert_eq!(*service.calls.borrow(), vec!["stop"]);
    }

    #[test]
    fn check_with_dead_daemon_is_an_error() {
        let root = TempDir::new().unwrap();
        let service = RecordingService::default();

        let result = run_command(
            Command::Check,
            config_for(root.path()),
            &service,
            StubMounts(true),
        );

        assert!(result.is_err());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let config = HaConfig {
            fs_variant: FsVariant::Gpfs,
            shared_mount: None,
            node_address: "10.0.0.1".to_string(),
            ..HaConfig::default()
        };
        let service = RecordingService::default();
        let result = run_command(Command::Startup, config, &service, StubMounts(true));
        assert!(result.is_err());
    }
}

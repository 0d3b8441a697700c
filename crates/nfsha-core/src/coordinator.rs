//! Failover coordination over the shared state tree.
//!
//! The coordinator is the entry point for cluster events: startup, health
//! check, and virtual-IP take/release. Each event runs a short sequence of
//! idempotent reconciliation steps against the shared filesystem; nodes run
//! these independently and converge without any central coordinator. The
//! only cross-node-visible write is a peer-directory repoint, which is
//! last-writer-wins by construction.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{HaConfig, ResolvedPaths};
use crate::error::HaResult;
use crate::mount::MountProbe;
use crate::peers::PeerDirectory;
use crate::service::ServiceLifecycle;
use crate::state_store::NodeStateStore;

/// Where the coordinator is in its event cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No reconciliation pass has completed yet.
    Uninitialized,
    /// The shared state tree matches this node's expectations.
    Reconciled,
    /// A virtual-IP takeover repoint is in flight.
    TakingIp,
    /// A virtual-IP release is in flight.
    ReleasingIp,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The shared filesystem was present and the tree is reconciled.
    Ready,
    /// The shared filesystem is not mounted yet; nothing was touched. The
    /// supervisor retries later. This is not an error.
    NotReady,
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// Reconciled and the daemon is alive and running the expected binary.
    Healthy,
    /// Something is wrong; the reason is reported to the dispatcher.
    Unhealthy(String),
}

/// Drives reconciliation in response to cluster events.
pub struct FailoverCoordinator<S, M> {
    config: HaConfig,
    paths: ResolvedPaths,
    store: NodeStateStore,
    peers: PeerDirectory,
    service: S,
    mounts: M,
    state: CoordinatorState,
}

impl<S: ServiceLifecycle, M: MountProbe> FailoverCoordinator<S, M> {
    /// Builds a coordinator from a validated configuration.
    pub fn new(config: HaConfig, service: S, mounts: M) -> HaResult<Self> {
        let paths = config.resolve()?;
        let store = NodeStateStore::new(&paths.shared_root, &config.node_address);
        let peers = PeerDirectory::new(&paths.shared_root);
        Ok(Self {
            config,
            paths,
            store,
            peers,
            service,
            mounts,
            state: CoordinatorState::Uninitialized,
        })
    }

    /// Current coordinator state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// This node's state directory under the shared root.
    pub fn node_dir(&self) -> PathBuf {
        self.store.node_dir()
    }

    /// One full reconciliation pass: node skeleton, legacy-path bind, self
    /// publication, peer-reference repair. Safe to run from any prior state,
    /// any number of times, concurrently with other nodes.
    fn reconcile_pass(&self) -> HaResult<Outcome> {
        if !self.mounts.is_mounted(&self.paths.mountpoint) {
            info!(
                mountpoint = %self.paths.mountpoint.display(),
                "shared filesystem not mounted, deferring reconciliation"
            );
            return Ok(Outcome::NotReady);
        }
        self.store.ensure_node_state()?;
        self.store.bind_legacy_path(&self.config.legacy_state_dir)?;
        self.peers.publish_self(&self.store)?;
        self.peers.repair_peer_references(&self.store)?;
        Ok(Outcome::Ready)
    }

    /// Startup reconciliation. Returns [`Outcome::NotReady`] without error
    /// when the shared filesystem is absent, deferring to a later retry by
    /// the calling supervisor.
    pub fn startup(&mut self) -> HaResult<Outcome> {
        let outcome = self.reconcile_pass()?;
        if outcome == Outcome::Ready {
            self.state = CoordinatorState::Reconciled;
            info!(node = %self.config.node_address, "startup reconciliation complete");
        }
        Ok(outcome)
    }

    /// Health check: one idempotent reconciliation pass, then daemon
    /// liveness. Reconciliation is not retried beyond the single pass; an
    /// unhealthy result is a report, not a process failure.
    pub fn check(&mut self) -> HaResult<Health> {
        match self.startup()? {
            Outcome::NotReady => {
                return Ok(Health::Unhealthy(
                    "shared filesystem not mounted".to_string(),
                ));
            }
            Outcome::Ready => {}
        }

        let status = self.service.status();
        if !status.running {
            return Ok(Health::Unhealthy(match status.pid {
                Some(pid) => format!("daemon pid {pid} is not running"),
                None => "daemon is not running".to_string(),
            }));
        }
        match &status.exe {
            Some(exe) if exe == &self.config.daemon_binary => Ok(Health::Healthy),
            Some(exe) => Ok(Health::Unhealthy(format!(
                "daemon binary is {}, expected {}",
                exe.display(),
                self.config.daemon_binary.display()
            ))),
            None => Ok(Health::Unhealthy(
                "could not resolve daemon binary".to_string(),
            )),
        }
    }

    /// Takes over the lock-state visibility for a virtual IP's peer entry.
    ///
    /// Repoints `.noderefs/{address}` at this node's state directory so any
    /// node scanning the peer index resolves that address's lock state here.
    /// The IP-level network takeover itself belongs to the external cluster
    /// manager, which also guarantees single ownership of a virtual IP at
    /// any instant; that guarantee is a precondition of this call. Two
    /// concurrent takers would resolve last-writer-wins.
    pub fn take_ip(&mut self, address: &str) -> HaResult<()> {
        self.state = CoordinatorState::TakingIp;
        info!(address, node = %self.config.node_address, "taking over peer entry");
        self.peers.take_over(address, &self.store)?;
        self.state = CoordinatorState::Reconciled;
        Ok(())
    }

    /// Releases a virtual IP. The peer entry is deliberately left pointing
    /// at whichever node last took it; release does not imply any other
    /// node has taken over yet.
    pub fn release_ip(&mut self, address: &str) -> HaResult<()> {
        self.state = CoordinatorState::ReleasingIp;
        info!(address, node = %self.config.node_address, "releasing virtual IP");
        self.state = CoordinatorState::Reconciled;
        Ok(())
    }

    /// Starts the service daemon.
    pub fn start_service(&self) -> HaResult<()> {
        info!(unit = %self.config.service_unit, "starting service daemon");
        self.service.start()
    }

    /// Stops the service daemon.
    pub fn stop_service(&self) -> HaResult<()> {
        warn!(unit = %self.config.service_unit, "stopping service daemon");
        self.service.stop()
    }
}

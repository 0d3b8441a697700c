#![warn(missing_docs)]

//! NFS HA agent core: keeps the file-based NFS lock/recovery state tree
//! consistent across cluster nodes sharing a clustered filesystem, and
//! relocates the visible owner of a virtual IP's lock state on failover.
//!
//! Everything is built from independently idempotent symlink-reconciliation
//! operations, so nodes reconcile concurrently with no central coordinator
//! and converge regardless of interleaving.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod link;
pub mod mount;
pub mod peers;
pub mod service;
pub mod shares;
pub mod state_store;

pub use config::{FsVariant, HaConfig, ResolvedPaths};
pub use coordinator::{CoordinatorState, FailoverCoordinator, Health, Outcome};
pub use error::{HaError, HaResult};
pub use mount::{MountProbe, ProcMounts};
pub use peers::PeerDirectory;
pub use service::{ServiceLifecycle, ServiceStatus, SystemdUnit};
pub use state_store::NodeStateStore;

//! The shared peer-reference directory.
//!
//! `{shared_root}/.noderefs` is the cluster's discovery index: one symlink
//! per known address, each resolving to whichever node state directory
//! currently owns that address's lock state. Every node appends its own
//! entry at startup; takeover re-points an entry; nothing ever deletes one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{fs_err, HaResult};
use crate::link::reconcile_symlink;
use crate::state_store::{NodeStateStore, GANESHA_DIR, STATD_DIR};

/// Name of the peer-reference index under the shared root.
pub const PEER_DIR: &str = ".noderefs";

/// View of the peer index for one shared root.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    shared_root: PathBuf,
}

impl PeerDirectory {
    /// Wraps the peer index under `shared_root`.
    pub fn new(shared_root: impl Into<PathBuf>) -> Self {
        Self {
            shared_root: shared_root.into(),
        }
    }

    /// `{shared_root}/.noderefs`
    pub fn dir(&self) -> PathBuf {
        self.shared_root.join(PEER_DIR)
    }

    /// The index entry for `address`.
    pub fn entry(&self, address: &str) -> PathBuf {
        self.dir().join(address)
    }

    /// Ensures this node's own entry exists and resolves to its state
    /// directory. Idempotent.
    pub fn publish_self(&self, store: &NodeStateStore) -> HaResult<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(fs_err(&dir))?;
        reconcile_symlink(&store.node_dir(), &self.entry(store.address()))
    }

    /// Re-points an index entry at `store`'s node directory, taking over the
    /// lock-state visibility for `address`. Used on virtual-IP takeover,
    /// where `address` may differ from the node's own address.
    pub fn take_over(&self, address: &str, store: &NodeStateStore) -> HaResult<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(fs_err(&dir))?;
        reconcile_symlink(&store.node_dir(), &self.entry(address))
    }

    /// Addresses currently present in the index, excluding `except`.
    /// A missing index directory reads as empty.
    pub fn peer_addresses(&self, except: &str) -> HaResult<Vec<String>> {
        let dir = self.dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(fs_err(&dir)(e)),
        };

        let mut peers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(fs_err(&dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                debug!(entry = ?name, "skipping non-utf8 index entry");
                continue;
            };
            if name != except {
                peers.push(name.to_string());
            }
        }
        Ok(peers)
    }

    /// Rebuilds this node's per-peer references so the local daemon can reach
    /// every known peer's recovery and lock state by name.
    ///
    /// For each peer P in the index, `{node_dir}/ganesha/P` and
    /// `{node_dir}/statd/P` are pointed at `{.noderefs}/P/ganesha` and
    /// `{.noderefs}/P/statd`. Peers are independent, so order does not
    /// matter, and an empty index is a valid no-op.
    pub fn repair_peer_references(&self, store: &NodeStateStore) -> HaResult<()> {
        let peers = self.peer_addresses(store.address())?;
        if peers.is_empty() {
            debug!("no peer entries to repair");
            return Ok(());
        }
        info!(peers = peers.len(), "repairing peer references");

        let node_dir = store.node_dir();
        for peer in &peers {
            let peer_entry = self.entry(peer);
            reconcile_symlink(
                &peer_entry.join(GANESHA_DIR),
                &node_dir.join(GANESHA_DIR).join(peer),
            )?;
            reconcile_symlink(
                &peer_entry.join(STATD_DIR),
                &node_dir.join(STATD_DIR).join(peer),
            )?;
        }
        Ok(())
    }
}

/// Resolves where an index entry currently points, if it exists.
pub fn resolve_entry(shared_root: &Path, address: &str) -> Option<PathBuf> {
    fs::read_link(shared_root.join(PEER_DIR).join(address)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(root: &Path, address: &str) -> NodeStateStore {
        let store = NodeStateStore::new(root, address);
        store.ensure_node_state().unwrap();
        store
    }

    #[test]
    fn publish_self_creates_index_entry() {
        let root = TempDir::new().unwrap();
        let store = setup(root.path(), "10.0.0.1");
        let peers = PeerDirectory::new(root.path());

        peers.publish_self(&store).unwrap();

        assert_eq!(
            fs::read_link(root.path().join(".noderefs/10.0.0.1")).unwrap(),
            store.node_dir()
        );
    }

    #[test]
    fn publish_self_is_idempotent() {
        let root = TempDir::new().unwrap();
        let store = setup(root.path(), "10.0.0.1");
        let peers = PeerDirectory::new(root.path());

        peers.publish_self(&store).unwrap();
        peers.publish_self(&store).unwrap();

        assert_eq!(
            resolve_entry(root.path(), "10.0.0.1").unwrap(),
            store.node_dir()
        );
    }

    #[test]
    fn peer_addresses_excludes_self_and_reads_missing_index_as_empty() {
        let root = TempDir::new().unwrap();
        let peers = PeerDirectory::new(root.path());
        assert!(peers.peer_addresses("10.0.0.1").unwrap().is_empty());

        let a = setup(root.path(), "10.0.0.1");
        let b = setup(root.path(), "10.0.0.2");
        peers.publish_self(&a).unwrap();
        peers.publish_self(&b).unwrap();

        let found = peers.peer_addresses("10.0.0.1").unwrap();
        assert_eq!(found, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn repair_with_no_peers_leaves_subtrees_unchanged() {
        let root = TempDir::new().unwrap();
        let store = setup(root.path(), "10.0.0.1");
        let peers = PeerDirectory::new(root.path());
        peers.publish_self(&store).unwrap();

        peers.repair_peer_references(&store).unwrap();

        let ganesha: Vec<_> = fs::read_dir(store.ganesha_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(ganesha.len(), 2); // v4recov and v4old only
    }

    #[test]
    fn repair_links_every_peer_by_name() {
        let root = TempDir::new().unwrap();
        let a = setup(root.path(), "10.0.0.1");
        let b = setup(root.path(), "10.0.0.2");
        let peers = PeerDirectory::new(root.path());
        peers.publish_self(&a).unwrap();
        peers.publish_self(&b).unwrap();

        peers.repair_peer_references(&a).unwrap();

        let noderefs = root.path().join(".noderefs");
        assert_eq!(
            fs::read_link(a.node_dir().join("ganesha/10.0.0.2")).unwrap(),
            noderefs.join("10.0.0.2/ganesha")
        );
        assert_eq!(
            fs::read_link(a.node_dir().join("statd/10.0.0.2")).unwrap(),
            noderefs.join("10.0.0.2/statd")
        );
        // Self is never self-referenced.
        assert!(!a.node_dir().join("ganesha/10.0.0.1").exists());
    }

    #[test]
    fn repair_heals_stale_peer_references() {
        let root = TempDir::new().unwrap();
        let a = setup(root.path(), "10.0.0.1");
        let b = setup(root.path(), "10.0.0.2");
        let peers = PeerDirectory::new(root.path());
        peers.publish_self(&a).unwrap();
        peers.publish_self(&b).unwrap();

        // A crashed previous owner left a reference pointing somewhere bogus.
        let stale = a.node_dir().join("ganesha/10.0.0.2");
        std::os::unix::fs::symlink("/nonexistent/old-node", &stale).unwrap();

        peers.repair_peer_references(&a).unwrap();

        assert_eq!(
            fs::read_link(&stale).unwrap(),
            root.path().join(".noderefs/10.0.0.2/ganesha")
        );
    }

    #[test]
    fn take_over_repoints_entry_regardless_of_prior_owner() {
        let root = TempDir::new().unwrap();
        let a = setup(root.path(), "10.0.0.1");
        let b = setup(root.path(), "10.0.0.2");
        let peers = PeerDirectory::new(root.path());
        peers.publish_self(&a).unwrap();

        peers.take_over("10.0.0.1", &b).unwrap();

        assert_eq!(
            resolve_entry(root.path(), "10.0.0.1").unwrap(),
            b.node_dir()
        );
    }

    #[test]
    fn reconciliation_converges_regardless_of_node_ordering() {
        // Two nodes running startup passes in either interleaving end with
        // the same index and the same per-peer references.
        let root = TempDir::new().unwrap();
        let a = setup(root.path(), "10.0.0.1");
        let b = setup(root.path(), "10.0.0.2");
        let peers = PeerDirectory::new(root.path());

        // Interleaving 1: a publishes, b publishes, both repair.
        peers.publish_self(&a).unwrap();
        peers.publish_self(&b).unwrap();
        peers.repair_peer_references(&a).unwrap();
        peers.repair_peer_references(&b).unwrap();

        // Interleaving 2: everything again in reverse.
        peers.repair_peer_references(&b).unwrap();
        peers.repair_peer_references(&a).unwrap();
        peers.publish_self(&b).unwrap();
        peers.publish_self(&a).unwrap();

        for (me, other) in [(&a, "10.0.0.2"), (&b, "10.0.0.1")] {
            assert_eq!(
                resolve_entry(root.path(), me.address()).unwrap(),
                me.node_dir()
            );
            assert_eq!(
                fs::read_link(me.node_dir().join("ganesha").join(other)).unwrap(),
                root.path().join(".noderefs").join(other).join("ganesha")
            );
        }
    }
}

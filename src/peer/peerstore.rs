use super::peer::Peer;

use crate::address::Address;
use crate::{Error, Result};

use parking_lot::RwLock;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The set of peers staked at a given height.
#[derive(Debug, Clone, Default)]
pub struct Peerstore {
    height: u64,
    peers: HashMap<Address, Peer>,
}

impl Peerstore {
    pub fn new(height: u64) -> Self {
        Peerstore { height, peers: HashMap::new() }
    }

    pub fn from_peers(height: u64, peers: Vec<Peer>) -> Self {
        let mut pstore = Peerstore::new(height);
        for peer in peers.into_iter() {
            pstore.add_peer(peer);
        }
        pstore
    }

    /// The height this snapshot was taken at.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Inserts a peer; a peer with the same address is replaced.
    pub fn add_peer(&mut self, peer: Peer) {
        let _ = self.peers.insert(peer.address, peer);
    }

    /// Removes a peer, a missing address is ignored.
    pub fn remove_peer(&mut self, address: &Address) {
        let _ = self.peers.remove(address);
    }

    pub fn get_peer(&self, address: &Address) -> Option<&Peer> {
        self.peers.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.peers.contains_key(address)
    }

    pub fn size(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All peers, in no particular order.
    pub fn all_peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn peer_list(&self) -> Vec<Peer> {
        self.peers.values().cloned().collect()
    }
}

/// Supplies the staked peers at a given height.
pub trait PeerstoreProvider: Send + Sync {
    fn get_staked_peerstore_at_height(&self, height: u64) -> Result<Peerstore>;
}

/// Supplies the current consensus height.
pub trait CurrentHeightProvider: Send + Sync {
    fn current_height(&self) -> u64;
}

/// A provider which serves the same peer set at every height.
pub struct StaticPeerstoreProvider {
    peers: Vec<Peer>,
}

impl StaticPeerstoreProvider {
    pub fn new(peers: Vec<Peer>) -> Self {
        StaticPeerstoreProvider { peers }
    }
}

impl PeerstoreProvider for StaticPeerstoreProvider {
    fn get_staked_peerstore_at_height(&self, height: u64) -> Result<Peerstore> {
        Ok(Peerstore::from_peers(height, self.peers.clone()))
    }
}

/// A provider which keeps the peer set recorded at each height.
///
/// A query returns the snapshot recorded at the greatest height `<= height`.
#[derive(Clone, Default)]
pub struct ArchivedPeerstoreProvider {
    snapshots: Arc<RwLock<BTreeMap<u64, Vec<Peer>>>>,
}

impl ArchivedPeerstoreProvider {
    pub fn new() -> Self {
        ArchivedPeerstoreProvider::default()
    }

    /// Records the peers staked from `height` onwards.
    pub fn record(&self, height: u64, peers: Vec<Peer>) {
        let _ = self.snapshots.write().insert(height, peers);
    }
}

impl PeerstoreProvider for ArchivedPeerstoreProvider {
    fn get_staked_peerstore_at_height(&self, height: u64) -> Result<Peerstore> {
        let snapshots = self.snapshots.read();
        match snapshots.range(..=height).next_back() {
            Some((_, peers)) => Ok(Peerstore::from_peers(height, peers.clone())),
            None => Err(Error::PeerstoreUnavailable(height)),
        }
    }
}

/// A height which can be advanced from outside, e.g. by a consensus driver or a test.
#[derive(Debug, Clone, Default)]
pub struct SharedHeight {
    height: Arc<AtomicU64>,
}

impl SharedHeight {
    pub fn new(height: u64) -> Self {
        SharedHeight { height: Arc::new(AtomicU64::new(height)) }
    }

    pub fn set(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }
}

impl CurrentHeightProvider for SharedHeight {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }
}

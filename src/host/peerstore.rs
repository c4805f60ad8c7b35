use super::peer_id::PeerId;
use super::HostPeerstore;

use crate::{Error, Result};

use ed25519_dalek::PublicKey;
use parking_lot::RwLock;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct PeerRecord {
    addresses: Vec<(SocketAddr, Instant)>,
    public_key: Option<PublicKey>,
}

/// An in-memory [HostPeerstore] with per-address expiry.
#[derive(Debug, Default)]
pub struct MemoryPeerstore {
    records: RwLock<HashMap<PeerId, PeerRecord>>,
}

impl MemoryPeerstore {
    pub fn new() -> Self {
        MemoryPeerstore::default()
    }

    pub fn public_key(&self, id: &PeerId) -> Option<PublicKey> {
        self.records.read().get(id).and_then(|record| record.public_key)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl HostPeerstore for MemoryPeerstore {
    fn add_address(&self, id: PeerId, address: SocketAddr, ttl: Duration) {
        let expiry = Instant::now() + ttl;
        let mut records = self.records.write();
        let record = records.entry(id).or_insert_with(PeerRecord::default);
        match record.addresses.iter_mut().find(|(known, _)| *known == address) {
            Some(entry) => entry.1 = expiry,
            None => record.addresses.push((address, expiry)),
        }
    }

    fn add_public_key(&self, id: PeerId, public_key: PublicKey) -> Result<()> {
        if PeerId::from_public_key(&public_key) != id {
            return Err(Error::InvalidPublicKey);
        }
        self.records.write().entry(id).or_insert_with(PeerRecord::default).public_key =
            Some(public_key);
        Ok(())
    }

    fn remove_peer(&self, id: &PeerId) {
        let _ = self.records.write().remove(id);
    }

    fn addresses(&self, id: &PeerId) -> Vec<SocketAddr> {
        let now = Instant::now();
        match self.records.read().get(id) {
            Some(record) => record
                .addresses
                .iter()
                .filter(|(_, expiry)| *expiry > now)
                .map(|(address, _)| *address)
                .collect(),
            None => vec![],
        }
    }
}

use crate::address::Address;
use crate::peer::{Peer, Peerstore};

use tracing::{debug, warn};

/// The sorted, self-rotated projection of a [Peerstore] used to compute RainTree targets.
///
/// `addresses` and `peers` are kept in lockstep. The owning address sits at index 0 and the
/// remaining addresses follow in ascending byte order starting right after the owner, wrapping
/// around past the largest address. In client-only mode (the owner is not staked) the view is
/// plainly ascending.
#[derive(Debug, Clone)]
pub struct SortedPeersView {
    self_addr: Address,
    addresses: Vec<Address>,
    peers: Vec<Peer>,
    peerstore: Peerstore,
    client_only: bool,
}

impl SortedPeersView {
    pub fn new(self_addr: Address, pstore: &Peerstore) -> Self {
        let mut addresses: Vec<Address> = pstore.all_peers().map(|peer| peer.address).collect();
        addresses.sort();

        let client_only = match addresses.binary_search(&self_addr) {
            Ok(i) => {
                addresses.rotate_left(i);
                false
            }
            Err(_) => {
                warn!(
                    "self address {} not found in peerstore at height {}, this node can send \
                     messages but does not propagate them (client-only mode)",
                    self_addr,
                    pstore.height()
                );
                true
            }
        };

        let peers = addresses.iter().filter_map(|address| pstore.get_peer(address).cloned()).collect();
        SortedPeersView { self_addr, addresses, peers, peerstore: pstore.clone(), client_only }
    }

    /// Position of `address` in the rotated order, `self_addr` ranking lowest.
    fn rank(&self, address: &Address) -> (bool, Address) {
        if self.client_only {
            (false, *address)
        } else {
            (*address < self.self_addr, *address)
        }
    }

    fn index_of(&self, address: &Address) -> std::result::Result<usize, usize> {
        let rank = self.rank(address);
        self.addresses.binary_search_by(|probe| self.rank(probe).cmp(&rank))
    }

    /// Inserts a peer, replacing the record of a known address.
    pub fn add(&mut self, peer: Peer) {
        if self.client_only && peer.address == self.self_addr {
            debug!("self address {} added, leaving client-only mode", self.self_addr);
            self.peerstore.add_peer(peer);
            *self = SortedPeersView::new(self.self_addr, &self.peerstore);
            return;
        }
        match self.index_of(&peer.address) {
            Ok(i) => self.peers[i] = peer.clone(),
            Err(i) => {
                self.addresses.insert(i, peer.address);
                self.peers.insert(i, peer.clone());
            }
        }
        self.peerstore.add_peer(peer);
    }

    /// Removes a peer, a missing address is ignored.
    pub fn remove(&mut self, address: &Address) {
        if !self.client_only && *address == self.self_addr {
            warn!("self address {} removed, entering client-only mode", self.self_addr);
            self.peerstore.remove_peer(address);
            let _ = self.addresses.remove(0);
            let _ = self.peers.remove(0);
            // Only the wrap-around needs undoing to get back to ascending order
            let wrap = self.addresses.iter().position(|a| *a < self.self_addr).unwrap_or(0);
            self.addresses.rotate_left(wrap);
            self.peers.rotate_left(wrap);
            self.client_only = true;
            return;
        }
        match self.index_of(address) {
            Ok(i) => {
                let _ = self.addresses.remove(i);
                let _ = self.peers.remove(i);
                self.peerstore.remove_peer(address);
            }
            Err(_) => debug!("{} not found in peers view", address),
        }
    }

    pub fn self_addr(&self) -> Address {
        self.self_addr
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn peerstore(&self) -> &Peerstore {
        &self.peerstore
    }

    pub fn get_peer(&self, address: &Address) -> Option<&Peer> {
        self.peerstore.get_peer(address)
    }

    /// True when the owning address is not part of the view.
    pub fn is_client_only(&self) -> bool {
        self.client_only
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn max_num_levels(&self) -> u32 {
        super::levels::max_num_levels(self.len())
    }
}

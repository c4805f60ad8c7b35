//! Staked peers and the snapshots of them handed to the router.
mod peer;
mod peerstore;

pub use peer::Peer;
pub use peerstore::*;

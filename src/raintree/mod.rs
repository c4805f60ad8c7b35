//! RainTree: redundancy-bounded gossip over a sorted view of the staked peers.
//!
//! A broadcast starts at the top level of a ternary tree laid over the [SortedPeersView]. At
//! each level a node sends the frame to two [Target]s and demotes itself to the next level, so
//! every staked peer is reached in `ceil(log3(n))` hops. Nonces already delivered are dropped by
//! a bounded FIFO set.
mod config;
mod frame;
mod levels;
mod peer_manager;
mod peers_view;
mod raintree;
mod router;

pub use config::RainTreeConfig;
pub use frame::RainTreeFrame;
pub use levels::{
    effective_size, max_num_levels, targets_at_level, Target, FIRST_MSG_TARGET_PERCENTAGE,
    MAX_LEVELS_LOG_BASE, SECOND_MSG_TARGET_PERCENTAGE, SHRINKAGE_PERCENTAGE,
};
pub use peer_manager::{GetPeersView, PeerEvent, PeerManager, PeersViewResult};
pub use peers_view::SortedPeersView;
pub use raintree::RainTree;
pub use router::{
    AddPeer, Broadcast, GetPeerstore, HandleStream, NetworkMessage, RemovePeer, Router, SendTo, Size,
};

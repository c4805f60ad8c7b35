use super::peers_view::SortedPeersView;

use crate::address::Address;
use crate::peer::{Peer, Peerstore};
use crate::{Error, Result};

use actix::{Actor, Context, Handler};
use tracing::debug;

use std::sync::Arc;

/// Owns the [SortedPeersView] of a router.
///
/// Peer set changes are applied one at a time in mailbox order. Readers get the current view
/// as a shared snapshot which later changes never touch.
pub struct PeerManager {
    view: Arc<SortedPeersView>,
    is_dynamic: bool,
}

impl PeerManager {
    pub fn new(self_addr: Address, pstore: &Peerstore, is_dynamic: bool) -> Self {
        PeerManager { view: Arc::new(SortedPeersView::new(self_addr, pstore)), is_dynamic }
    }
}

impl Actor for PeerManager {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("peer manager> started with {} peers", self.view.len());
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub enum PeerEvent {
    Add(Peer),
    Remove(Address),
}

impl Handler<PeerEvent> for PeerManager {
    type Result = Result<()>;

    fn handle(&mut self, event: PeerEvent, _ctx: &mut Context<Self>) -> Self::Result {
        if !self.is_dynamic {
            return Err(Error::StaticPeerSet);
        }
        // Copies the view only while a snapshot of it is still held by a reader
        let view = Arc::make_mut(&mut self.view);
        match event {
            PeerEvent::Add(peer) => {
                debug!("peer manager> adding {}", peer.address);
                view.add(peer)
            }
            PeerEvent::Remove(address) => {
                debug!("peer manager> removing {}", address);
                view.remove(&address)
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "PeersViewResult")]
pub struct GetPeersView;

#[derive(Debug, Clone, MessageResponse)]
pub struct PeersViewResult {
    pub view: Arc<SortedPeersView>,
}

impl Handler<GetPeersView> for PeerManager {
    type Result = PeersViewResult;

    fn handle(&mut self, _msg: GetPeersView, _ctx: &mut Context<Self>) -> Self::Result {
        PeersViewResult { view: self.view.clone() }
    }
}

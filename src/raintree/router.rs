use super::config::RainTreeConfig;
use super::peer_manager::{PeerEvent, PeerManager};
use super::raintree::RainTree;

use crate::address::Address;
use crate::colored::Colorize;
use crate::host::{add_peer_to_host, populate_host, remove_peer_from_host, Host, InboundStream};
use crate::peer::{CurrentHeightProvider, Peer, Peerstore, PeerstoreProvider};
use crate::telemetry::TelemetrySink;
use crate::{Error, Result};

use actix::{Actor, Addr, AsyncContext, Context, Handler, Recipient, ResponseFuture};
use tokio::io::AsyncReadExt;
use tokio::time::timeout;
use tracing::{debug, error, info};

use std::sync::Arc;

/// Emitted for every payload delivered to this node for the first time.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct NetworkMessage {
    pub data: Vec<u8>,
}

/// Connects the RainTree engine to a [Host] and the rest of the node.
///
/// The router owns the peer manager and the engine, reads the streams the host accepts for the
/// RainTree protocol and emits a [NetworkMessage] to `recipient` for each new payload.
pub struct Router {
    raintree: RainTree,
    host: Arc<dyn Host>,
    peer_manager: Addr<PeerManager>,
    recipient: Recipient<NetworkMessage>,
    config: RainTreeConfig,
}

impl Router {
    /// Loads the peer set at the current height, adds it to the host and starts the router.
    pub async fn create(
        self_addr: Address,
        host: Arc<dyn Host>,
        pstore_provider: Arc<dyn PeerstoreProvider>,
        height_provider: Arc<dyn CurrentHeightProvider>,
        telemetry: Arc<dyn TelemetrySink>,
        recipient: Recipient<NetworkMessage>,
        config: RainTreeConfig,
    ) -> Result<Addr<Router>> {
        config.validate()?;

        let height = height_provider.current_height();
        let pstore = pstore_provider.get_staked_peerstore_at_height(height)?;
        if pstore.is_empty() {
            return Err(Error::EmptyPeerstore);
        }
        populate_host(host.as_ref(), &pstore).await?;

        let peer_manager = PeerManager::new(self_addr, &pstore, config.is_dynamic_peer_set).start();
        let raintree = RainTree::new(
            self_addr,
            peer_manager.clone(),
            host.clone(),
            pstore_provider,
            height_provider,
            telemetry,
            config.clone(),
        );
        info!(
            "[{}] {} starting with {} peers at height {}",
            "router".cyan(),
            self_addr,
            pstore.size(),
            height
        );
        let protocol_id = config.protocol_id.clone();
        let router = Router { raintree, host: host.clone(), peer_manager, recipient, config }.start();

        // Streams are queued in the router's mailbox until it runs
        let handler_router = router.clone();
        host.set_stream_handler(
            &protocol_id,
            Arc::new(move |stream: InboundStream| handler_router.do_send(HandleStream(stream))),
        );
        Ok(router)
    }
}

impl Actor for Router {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!("router> started");
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct Broadcast {
    pub data: Vec<u8>,
}

impl Handler<Broadcast> for Router {
    type Result = ResponseFuture<Result<()>>;

    fn handle(&mut self, Broadcast { data }: Broadcast, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        Box::pin(async move { raintree.broadcast(data).await })
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct SendTo {
    pub data: Vec<u8>,
    pub address: Address,
}

impl Handler<SendTo> for Router {
    type Result = ResponseFuture<Result<()>>;

    fn handle(&mut self, SendTo { data, address }: SendTo, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        Box::pin(async move { raintree.send(data, address).await })
    }
}

/// Adds a peer to the host and the view. A peer whose address is known is left as is.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct AddPeer {
    pub peer: Peer,
}

impl Handler<AddPeer> for Router {
    type Result = ResponseFuture<Result<()>>;

    fn handle(&mut self, AddPeer { peer }: AddPeer, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        let host = self.host.clone();
        let peer_manager = self.peer_manager.clone();
        let is_dynamic = self.config.is_dynamic_peer_set;
        Box::pin(async move {
            if raintree.peers_view().await?.get_peer(&peer.address).is_some() {
                return Ok(());
            }
            if !is_dynamic {
                return Err(Error::StaticPeerSet);
            }
            add_peer_to_host(host.as_ref(), &peer).await?;
            info!("[{}] adding peer {} at {}", "router".cyan(), peer.address, peer.service_url);
            peer_manager.send(PeerEvent::Add(peer)).await?
        })
    }
}

/// Removes a peer from the view and the host. Unknown addresses are ignored.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct RemovePeer {
    pub address: Address,
}

impl Handler<RemovePeer> for Router {
    type Result = ResponseFuture<Result<()>>;

    fn handle(&mut self, RemovePeer { address }: RemovePeer, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        let host = self.host.clone();
        let peer_manager = self.peer_manager.clone();
        Box::pin(async move {
            let peer = match raintree.peers_view().await?.get_peer(&address) {
                Some(peer) => peer.clone(),
                None => return Ok(()),
            };
            peer_manager.send(PeerEvent::Remove(address)).await??;
            remove_peer_from_host(host.as_ref(), &peer);
            info!("[{}] removed peer {}", "router".cyan(), address);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<Peerstore>")]
pub struct GetPeerstore;

impl Handler<GetPeerstore> for Router {
    type Result = ResponseFuture<Result<Peerstore>>;

    fn handle(&mut self, _msg: GetPeerstore, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        Box::pin(async move { Ok(raintree.peers_view().await?.peerstore().clone()) })
    }
}

/// The number of peers a broadcast would try to reach, this node included.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<usize>")]
pub struct Size;

impl Handler<Size> for Router {
    type Result = ResponseFuture<Result<usize>>;

    fn handle(&mut self, _msg: Size, _ctx: &mut Context<Self>) -> Self::Result {
        let raintree = self.raintree.clone();
        Box::pin(async move { Ok(raintree.peers_view().await?.len()) })
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct HandleStream(pub InboundStream);

impl Handler<HandleStream> for Router {
    type Result = ();

    fn handle(&mut self, HandleStream(inbound): HandleStream, ctx: &mut Context<Self>) -> Self::Result {
        debug!("handling incoming stream from {}", inbound.remote);
        let router = ctx.address();
        let raintree = self.raintree.clone();
        let recipient = self.recipient.clone();
        let read_timeout = self.config.stream_timeout();
        let discover = self.host.authenticates_peers();

        let _ = actix::spawn(async move {
            let peer = match inbound.remote_peer() {
                Ok(peer) => peer,
                Err(err) => {
                    error!("parsing remote peer identity {}: {:?}", inbound.remote, err);
                    return;
                }
            };
            let mut stream = inbound.stream;
            if discover {
                match router.send(AddPeer { peer: peer.clone() }).await {
                    Ok(Ok(())) => (),
                    Ok(Err(err)) => debug!("not adding remote peer {}: {:?}", peer.address, err),
                    Err(err) => error!("adding remote peer {}: {:?}", peer.address, err),
                }
            }

            let mut bytes = vec![];
            match timeout(read_timeout, stream.read_to_end(&mut bytes)).await {
                Ok(Ok(_)) => (),
                Ok(Err(err)) => {
                    error!("reading from stream of {}: {:?}", peer.address, err);
                    return;
                }
                Err(_) => {
                    error!("reading from stream of {}: {:?}", peer.address, Error::Timeout);
                    return;
                }
            }
            drop(stream);

            let data = match raintree.handle_raintree_msg(&bytes).await {
                Ok(Some(data)) => data,
                Ok(None) => return,
                Err(err) => {
                    error!("handling raintree message from {}: {:?}", peer.address, err);
                    return;
                }
            };
            if let Err(err) = recipient.send(NetworkMessage { data }).await {
                error!("delivering network message: {:?}", err);
            }
        });
    }
}

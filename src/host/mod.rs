//! The peer-to-peer host the overlay sends and receives streams through.
//!
//! A [Host] opens unidirectional-use streams to peers identified by their [PeerId] and hands
//! inbound streams to the handler registered for a protocol id. [TcpHost] is the production
//! implementation, [MockNet] connects in-memory hosts for testing.
mod mocknet;
mod peer_id;
mod peerstore;
mod tcp;
mod url_conversion;

pub use mocknet::{Delivery, MockHost, MockNet, OpenedStream};
pub use peer_id::PeerId;
pub use peerstore::MemoryPeerstore;
pub use tcp::TcpHost;
pub use url_conversion::{service_url_from_socket_addr, socket_addr_from_service_url};

use crate::peer::{Peer, Peerstore};
use crate::{Error, Result};

use ed25519_dalek::PublicKey;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::error;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Future type that can be safely held across `.await` boundaries
/// and is compatible with Tokio
pub type SafeFuture<Out> = Pin<Box<dyn Send + Future<Output = Out>>>;

/// A byte-oriented bidirectional stream. The reader sees EOF once the writer closes.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for S {}

pub type Stream = Box<dyn AsyncStream>;

/// A stream opened by a remote peer.
pub struct InboundStream {
    /// The host identity of the remote peer.
    pub remote: PeerId,
    /// The service URL the remote peer announced.
    pub remote_service_url: String,
    pub stream: Stream,
}

impl InboundStream {
    /// The remote end as a [Peer].
    pub fn remote_peer(&self) -> Result<Peer> {
        Ok(Peer::new(self.remote.public_key()?, self.remote_service_url.clone()))
    }
}

pub type StreamHandler = Arc<dyn Fn(InboundStream) + Send + Sync>;

/// How long an address added from a peerstore snapshot stays valid.
pub const DEFAULT_PEER_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7 * 2);

/// The host's own book of dialable peers.
pub trait HostPeerstore: Send + Sync {
    fn add_address(&self, id: PeerId, address: SocketAddr, ttl: Duration);
    /// Fails if the key does not belong to `id`.
    fn add_public_key(&self, id: PeerId, public_key: PublicKey) -> Result<()>;
    fn remove_peer(&self, id: &PeerId);
    /// Addresses of `id` which have not expired.
    fn addresses(&self, id: &PeerId) -> Vec<SocketAddr>;
}

pub trait Host: Send + Sync {
    fn id(&self) -> PeerId;

    /// === async fn open_stream(..) -> Result<Stream>;
    fn open_stream(&self, peer: PeerId, protocol_id: &str) -> SafeFuture<Result<Stream>>;

    /// Replaces the handler for streams of `protocol_id`.
    fn set_stream_handler(&self, protocol_id: &str, handler: StreamHandler);

    fn peerstore(&self) -> &dyn HostPeerstore;

    /// Whether the remote identity of an inbound stream is proven by the transport. Peers are
    /// only discovered from inbound streams of hosts which authenticate them.
    fn authenticates_peers(&self) -> bool {
        true
    }

    /// === async fn close(..) -> Result<()>;
    fn close(&self) -> SafeFuture<Result<()>>;
}

/// Adds the peer's network address and public key to the host's peerstore.
pub async fn add_peer_to_host(host: &dyn Host, peer: &Peer) -> Result<()> {
    let id = PeerId::from_public_key(&peer.public_key);
    let address = socket_addr_from_service_url(&peer.service_url).await?;
    host.peerstore().add_address(id, address, DEFAULT_PEER_TTL);
    host.peerstore().add_public_key(id, peer.public_key)
}

pub fn remove_peer_from_host(host: &dyn Host, peer: &Peer) {
    host.peerstore().remove_peer(&PeerId::from_public_key(&peer.public_key));
}

/// Adds every peer in `pstore` to the host, reporting all failures together.
pub async fn populate_host(host: &dyn Host, pstore: &Peerstore) -> Result<()> {
    let mut failures = vec![];
    for peer in pstore.all_peers() {
        if let Err(err) = add_peer_to_host(host, peer).await {
            error!("adding peer {} to host: {:?}", peer.address, err);
            failures.push(format!("{}: {}", peer.address, err));
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::HostPopulation(failures))
    }
}

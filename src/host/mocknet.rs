use super::peer_id::PeerId;
use super::peerstore::MemoryPeerstore;
use super::{Host, HostPeerstore, InboundStream, SafeFuture, Stream, StreamHandler};

use crate::{Error, Result};

use ed25519_dalek::PublicKey;
use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncReadExt;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use std::collections::HashMap;
use std::sync::Arc;

const DUPLEX_BUFFER_SIZE: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A stream opened between two hosts of a [MockNet].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedStream {
    pub from: PeerId,
    pub to: PeerId,
    pub protocol_id: String,
}

/// The full contents of a stream read by a recording host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: PeerId,
    pub to: PeerId,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct HostEntry {
    service_url: String,
    handlers: HashMap<String, StreamHandler>,
    closed: bool,
}

#[derive(Default)]
struct Net {
    hosts: RwLock<HashMap<PeerId, HostEntry>>,
    opened: Mutex<Vec<OpenedStream>>,
    delivered: Mutex<Vec<Delivery>>,
}

/// An in-memory network of hosts connected by duplex pipes.
#[derive(Clone, Default)]
pub struct MockNet {
    net: Arc<Net>,
}

impl MockNet {
    pub fn new() -> Self {
        MockNet::default()
    }

    pub fn add_host(&self, public_key: PublicKey, service_url: &str) -> Arc<MockHost> {
        let id = PeerId::from_public_key(&public_key);
        let entry = HostEntry { service_url: service_url.to_owned(), ..HostEntry::default() };
        let _ = self.net.hosts.write().insert(id, entry);
        Arc::new(MockHost { id, net: self.net.clone(), peerstore: MemoryPeerstore::new() })
    }

    /// Adds a host which reads every stream of `protocol_id` to the end and records it.
    pub fn add_recording_host(
        &self,
        public_key: PublicKey,
        service_url: &str,
        protocol_id: &str,
    ) -> Arc<MockHost> {
        let host = self.add_host(public_key, service_url);
        let to = host.id();
        let net = self.net.clone();
        host.set_stream_handler(
            protocol_id,
            Arc::new(move |mut inbound: InboundStream| {
                let net = net.clone();
                let _ = tokio::spawn(async move {
                    let mut data = vec![];
                    match inbound.stream.read_to_end(&mut data).await {
                        Ok(_) => net.delivered.lock().push(Delivery { from: inbound.remote, to, data }),
                        Err(err) => debug!("recording host {} failed to read: {:?}", to, err),
                    }
                });
            }),
        );
        host
    }

    pub fn opened_streams(&self) -> Vec<OpenedStream> {
        self.net.opened.lock().clone()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.net.delivered.lock().clone()
    }

    /// Waits until at least `count` deliveries were recorded or `within` elapsed.
    pub async fn wait_for_deliveries(&self, count: usize, within: Duration) -> Vec<Delivery> {
        let deadline = Instant::now() + within;
        loop {
            let delivered = self.deliveries();
            if delivered.len() >= count || Instant::now() >= deadline {
                return delivered;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub fn reset_logs(&self) {
        self.net.opened.lock().clear();
        self.net.delivered.lock().clear();
    }
}

/// A host attached to a [MockNet].
///
/// Like a real host it can only open streams to peers whose address it knows.
pub struct MockHost {
    id: PeerId,
    net: Arc<Net>,
    peerstore: MemoryPeerstore,
}

impl MockHost {
    fn connect(&self, peer: PeerId, protocol_id: &str) -> Result<Stream> {
        if self.peerstore.addresses(&peer).is_empty() {
            return Err(Error::NoKnownAddress(peer));
        }
        let (handler, service_url) = {
            let hosts = self.net.hosts.read();
            let local = hosts.get(&self.id).ok_or(Error::HostClosed)?;
            if local.closed {
                return Err(Error::HostClosed);
            }
            let remote = hosts.get(&peer).ok_or(Error::NoKnownAddress(peer))?;
            if remote.closed {
                return Err(Error::ConnectionRefused(peer));
            }
            let handler = remote
                .handlers
                .get(protocol_id)
                .cloned()
                .ok_or_else(|| Error::UnsupportedProtocol(protocol_id.to_owned()))?;
            (handler, local.service_url.clone())
        };

        self.net.opened.lock().push(OpenedStream {
            from: self.id,
            to: peer,
            protocol_id: protocol_id.to_owned(),
        });
        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
        handler(InboundStream { remote: self.id, remote_service_url: service_url, stream: Box::new(server) });
        Ok(Box::new(client))
    }
}

impl Host for MockHost {
    fn id(&self) -> PeerId {
        self.id
    }

    fn open_stream(&self, peer: PeerId, protocol_id: &str) -> SafeFuture<Result<Stream>> {
        let stream = self.connect(peer, protocol_id);
        Box::pin(async move { stream })
    }

    fn set_stream_handler(&self, protocol_id: &str, handler: StreamHandler) {
        if let Some(entry) = self.net.hosts.write().get_mut(&self.id) {
            let _ = entry.handlers.insert(protocol_id.to_owned(), handler);
        }
    }

    fn peerstore(&self) -> &dyn HostPeerstore {
        &self.peerstore
    }

    fn close(&self) -> SafeFuture<Result<()>> {
        if let Some(entry) = self.net.hosts.write().get_mut(&self.id) {
            entry.closed = true;
            entry.handlers.clear();
        }
        Box::pin(async { Ok(()) })
    }
}

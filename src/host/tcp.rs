use super::peer_id::PeerId;
use super::peerstore::MemoryPeerstore;
use super::{Host, HostPeerstore, InboundStream, SafeFuture, Stream, StreamHandler};

use crate::colored::Colorize;
use crate::{Error, Result};

use ed25519_dalek::PublicKey;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Bounds reading the header of an inbound connection.
const HEADER_TIMEOUT: Duration = Duration::from_secs(10);
/// Headers larger than this are rejected.
const MAX_HEADER_LEN: u32 = 4096;

/// Written by the dialer before any stream bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamHeader {
    protocol_id: String,
    public_key: PeerId,
    service_url: String,
}

type Handlers = Arc<RwLock<HashMap<String, StreamHandler>>>;

/// A [Host] where every stream is its own TCP connection.
///
/// The dialer sends a length prefixed header naming the protocol and itself, followed by the
/// stream bytes. Closing the stream closes the connection.
///
/// The identity in the header is asserted by the dialer and not verified, so any client can
/// claim any public key. This host does not authenticate peers, and routers on top of it only
/// learn peers from their peerstore snapshot.
pub struct TcpHost {
    id: PeerId,
    service_url: String,
    local_addr: SocketAddr,
    peerstore: MemoryPeerstore,
    handlers: Handlers,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl TcpHost {
    /// Binds `listen_addr` and starts accepting streams.
    ///
    /// `service_url` is announced to the peers this host dials.
    pub async fn listen(
        listen_addr: SocketAddr,
        public_key: PublicKey,
        service_url: String,
    ) -> Result<Arc<TcpHost>> {
        let listener = TcpListener::bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("[{}] listening on {:?}", "host".cyan(), local_addr);

        let handlers: Handlers = Arc::new(RwLock::new(HashMap::new()));
        let accept_loop = tokio::spawn(accept(listener, handlers.clone()));
        Ok(Arc::new(TcpHost {
            id: PeerId::from_public_key(&public_key),
            service_url,
            local_addr,
            peerstore: MemoryPeerstore::new(),
            handlers,
            listener: Mutex::new(Some(accept_loop)),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn accept(listener: TcpListener, handlers: Handlers) {
    loop {
        match listener.accept().await {
            Ok((socket, remote_addr)) => {
                let handlers = handlers.clone();
                let _ = tokio::spawn(async move {
                    if let Err(err) = dispatch(socket, handlers).await {
                        warn!("dropping inbound connection from {:?}: {:?}", remote_addr, err);
                    }
                });
            }
            Err(err) => error!("accepting connection: {:?}", err),
        }
    }
}

async fn dispatch(mut socket: TcpStream, handlers: Handlers) -> Result<()> {
    let header = timeout(HEADER_TIMEOUT, read_header(&mut socket)).await.map_err(|_| Error::Timeout)??;
    // The handler is cloned out so that the lock is not held while it runs
    let handler = handlers.read().get(&header.protocol_id).cloned();
    match handler {
        Some(handler) => {
            debug!("inbound {} stream from {}", header.protocol_id, header.public_key);
            handler(InboundStream {
                remote: header.public_key,
                remote_service_url: header.service_url,
                stream: Box::new(socket),
            });
            Ok(())
        }
        None => Err(Error::UnsupportedProtocol(header.protocol_id)),
    }
}

async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<StreamHeader> {
    let len = reader.read_u32().await?;
    if len > MAX_HEADER_LEN {
        return Err(Error::HeaderTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    let _ = reader.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}

async fn write_header<W: AsyncWrite + Unpin>(writer: &mut W, header: &StreamHeader) -> Result<()> {
    let bytes = bincode::serialize(header)?;
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    Ok(())
}

impl Host for TcpHost {
    fn id(&self) -> PeerId {
        self.id
    }

    fn open_stream(&self, peer: PeerId, protocol_id: &str) -> SafeFuture<Result<Stream>> {
        let addresses = self.peerstore.addresses(&peer);
        let header = StreamHeader {
            protocol_id: protocol_id.to_owned(),
            public_key: self.id,
            service_url: self.service_url.clone(),
        };
        Box::pin(async move {
            let address = addresses.first().cloned().ok_or(Error::NoKnownAddress(peer))?;
            let mut socket = TcpStream::connect(address).await?;
            write_header(&mut socket, &header).await?;
            let stream: Stream = Box::new(socket);
            Ok(stream)
        })
    }

    fn set_stream_handler(&self, protocol_id: &str, handler: StreamHandler) {
        let _ = self.handlers.write().insert(protocol_id.to_owned(), handler);
    }

    fn peerstore(&self) -> &dyn HostPeerstore {
        &self.peerstore
    }

    fn authenticates_peers(&self) -> bool {
        false
    }

    fn close(&self) -> SafeFuture<Result<()>> {
        if let Some(accept_loop) = self.listener.lock().take() {
            accept_loop.abort();
            info!("[{}] stopped listening on {:?}", "host".cyan(), self.local_addr);
        }
        Box::pin(async { Ok(()) })
    }
}

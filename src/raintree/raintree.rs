use super::config::RainTreeConfig;
use super::frame::RainTreeFrame;
use super::levels::targets_at_level;
use super::peer_manager::{GetPeersView, PeerManager};
use super::peers_view::SortedPeersView;

use crate::address::Address;
use crate::colored::Colorize;
use crate::host::{add_peer_to_host, Host, PeerId};
use crate::mempool::{get_nonce, NonceDeduper};
use crate::peer::{CurrentHeightProvider, Peer, PeerstoreProvider};
use crate::telemetry::{
    TelemetrySink, BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME,
    P2P_EVENT_METRICS_NAMESPACE, RAINTREE_MESSAGE_EVENT_METRIC_HEIGHT_LABEL,
    RAINTREE_MESSAGE_EVENT_METRIC_NAME, RAINTREE_MESSAGE_EVENT_METRIC_NONCE_LABEL,
    RAINTREE_MESSAGE_EVENT_METRIC_SEND_LABEL, RAINTREE_SEND_FAILURE_EVENT_METRIC_ADDRESS_LABEL,
    RAINTREE_SEND_FAILURE_EVENT_METRIC_ERROR_LABEL, RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME,
};
use crate::{Error, Result};

use actix::Addr;
use futures::future::join_all;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use std::sync::Arc;

#[cfg(test)]
mod raintree_tests;

/// The RainTree propagation engine.
///
/// Cloning is cheap, all clones share the same peer manager, host and nonce set.
#[derive(Clone)]
pub struct RainTree {
    self_addr: Address,
    peer_manager: Addr<PeerManager>,
    host: Arc<dyn Host>,
    nonce_deduper: Arc<NonceDeduper>,
    pstore_provider: Arc<dyn PeerstoreProvider>,
    height_provider: Arc<dyn CurrentHeightProvider>,
    telemetry: Arc<dyn TelemetrySink>,
    config: RainTreeConfig,
}

impl RainTree {
    pub fn new(
        self_addr: Address,
        peer_manager: Addr<PeerManager>,
        host: Arc<dyn Host>,
        pstore_provider: Arc<dyn PeerstoreProvider>,
        height_provider: Arc<dyn CurrentHeightProvider>,
        telemetry: Arc<dyn TelemetrySink>,
        config: RainTreeConfig,
    ) -> Self {
        let nonce_deduper = Arc::new(NonceDeduper::new(config.max_mempool_nonce_count));
        RainTree {
            self_addr,
            peer_manager,
            host,
            nonce_deduper,
            pstore_provider,
            height_provider,
            telemetry,
            config,
        }
    }

    pub fn self_addr(&self) -> Address {
        self.self_addr
    }

    pub fn nonce_deduper(&self) -> &NonceDeduper {
        &self.nonce_deduper
    }

    /// The live view of the peer set.
    pub async fn peers_view(&self) -> Result<Arc<SortedPeersView>> {
        Ok(self.peer_manager.send(GetPeersView).await?.view)
    }

    /// Starts a propagation of `data` to every peer from the top level of the tree.
    pub async fn broadcast(&self, data: Vec<u8>) -> Result<()> {
        let nonce = get_nonce();
        // Echoes of this broadcast can arrive as soon as the first frame is out
        if let Err(err) = self.nonce_deduper.push(nonce) {
            warn!("nonce {} of a fresh broadcast already known: {:?}", nonce, err);
        }
        let height = self.height_provider.current_height();
        let view = self.peers_view().await?;
        let level = view.max_num_levels();
        info!("[{}] broadcasting {} bytes from level {} (nonce {})", "raintree".cyan(), data.len(), level, nonce);
        self.propagate(&view, data, level, nonce, Some(height)).await;
        Ok(())
    }

    /// Sends `data` to a single peer, without propagation.
    pub async fn send(&self, data: Vec<u8>, address: Address) -> Result<()> {
        let height = self.height_provider.current_height();
        let frame = RainTreeFrame::new(0, data, get_nonce(), Some(height));
        let view = self.peers_view().await?;
        self.send_internal(&view, frame.to_bytes(), address).await
    }

    /// Handles a frame read from an inbound stream.
    ///
    /// Continues the propagation below the frame's level and returns the payload unless its
    /// nonce was delivered before.
    pub async fn handle_raintree_msg(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let current_height = self.height_provider.current_height();
        self.telemetry.emit_event(
            P2P_EVENT_METRICS_NAMESPACE,
            RAINTREE_MESSAGE_EVENT_METRIC_NAME,
            &[(RAINTREE_MESSAGE_EVENT_METRIC_HEIGHT_LABEL, current_height.to_string())],
        );

        let frame = RainTreeFrame::from_bytes(bytes)?;
        debug!("received frame at level {} (nonce {})", frame.level, frame.nonce);

        // The forward runs on its own task so that slow peers do not delay the delivery
        if frame.level > 0 {
            let raintree = self.clone();
            let (data, level, nonce, height) = (frame.data.clone(), frame.level - 1, frame.nonce, frame.height);
            let _ = actix::spawn(async move {
                match raintree.view_at_height(height, current_height).await {
                    Ok(view) => raintree.propagate(&view, data, level, nonce, height).await,
                    Err(err) => error!("forwarding frame (nonce {}): {:?}", nonce, err),
                }
            });
        }

        match self.nonce_deduper.push(frame.nonce) {
            Ok(()) => Ok(Some(frame.data)),
            Err(Error::SetCollision) => {
                debug!("frame with nonce {} already delivered, skipping", frame.nonce);
                self.telemetry.emit_event(
                    P2P_EVENT_METRICS_NAMESPACE,
                    BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME,
                    &[
                        (RAINTREE_MESSAGE_EVENT_METRIC_NONCE_LABEL, frame.nonce.to_string()),
                        (RAINTREE_MESSAGE_EVENT_METRIC_HEIGHT_LABEL, current_height.to_string()),
                    ],
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The view to route a frame with: the live one, or the one at `height` when that is in
    /// the past.
    async fn view_at_height(
        &self,
        height: Option<u64>,
        current_height: u64,
    ) -> Result<Arc<SortedPeersView>> {
        let live = self.peers_view().await?;
        let height = match height {
            Some(height) if height < current_height => height,
            _ => return Ok(live),
        };
        match self.pstore_provider.get_staked_peerstore_at_height(height) {
            Ok(pstore) if !pstore.is_empty() => {
                debug!("routing with the peer set at height {} (current {})", height, current_height);
                Ok(Arc::new(SortedPeersView::new(self.self_addr, &pstore)))
            }
            Ok(_) => {
                warn!("peer set at height {} is empty, routing with the current view", height);
                Ok(live)
            }
            Err(err) => {
                warn!("{:?}, routing with the current view", err);
                Ok(live)
            }
        }
    }

    /// Sends a frame at `level` to both targets of that level, then demotes itself and repeats
    /// until level 0. Send failures are logged and do not stop the propagation.
    async fn propagate(
        &self,
        view: &SortedPeersView,
        data: Vec<u8>,
        level: u32,
        nonce: u64,
        height: Option<u64>,
    ) {
        let mut frame = RainTreeFrame::new(level, data, nonce, height);
        for level in (1..=level).rev() {
            frame.level = level;
            let bytes = frame.to_bytes();
            let sends = targets_at_level(view, level)
                .into_iter()
                .filter(|target| !target.is_self)
                .filter_map(|target| target.address)
                .map(|address| {
                    let bytes = bytes.clone();
                    async move { (address, self.send_internal(view, bytes, address).await) }
                });
            for (address, result) in join_all(sends).await {
                if let Err(err) = result {
                    error!("sending to {} at level {}: {:?}", address, level, err);
                }
            }
        }
    }

    /// Sends framed bytes to `address`, counting the outcome.
    async fn send_internal(&self, view: &SortedPeersView, bytes: Vec<u8>, address: Address) -> Result<()> {
        if address == self.self_addr {
            debug!("attempted to send to self");
            return Ok(());
        }
        match self.send_to_peer(view, &bytes, address).await {
            Ok(()) => {
                self.telemetry.emit_event(
                    P2P_EVENT_METRICS_NAMESPACE,
                    RAINTREE_MESSAGE_EVENT_METRIC_NAME,
                    &[(RAINTREE_MESSAGE_EVENT_METRIC_SEND_LABEL, RAINTREE_MESSAGE_EVENT_METRIC_SEND_LABEL.to_owned())],
                );
                Ok(())
            }
            Err(err) => {
                self.telemetry.emit_event(
                    P2P_EVENT_METRICS_NAMESPACE,
                    RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME,
                    &[
                        (RAINTREE_SEND_FAILURE_EVENT_METRIC_ADDRESS_LABEL, address.to_string()),
                        (RAINTREE_SEND_FAILURE_EVENT_METRIC_ERROR_LABEL, err.to_string()),
                    ],
                );
                Err(err)
            }
        }
    }

    async fn send_to_peer(&self, view: &SortedPeersView, bytes: &[u8], address: Address) -> Result<()> {
        let peer = view.get_peer(&address).ok_or(Error::NoKnownPeer(address))?;
        debug!("sending {} bytes to {} at {}", bytes.len(), peer.address, peer.service_url);

        timeout(self.config.stream_timeout(), self.write_to_peer(peer, bytes))
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn write_to_peer(&self, peer: &Peer, bytes: &[u8]) -> Result<()> {
        let id = PeerId::from_public_key(&peer.public_key);
        // Peers of a past view may be unknown to the host
        if self.host.peerstore().addresses(&id).is_empty() {
            add_peer_to_host(self.host.as_ref(), peer).await?;
        }
        let mut stream = self.host.open_stream(id, &self.config.protocol_id).await?;
        stream.write_all(bytes).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

use crate::colored::Colorize;
use crate::host::{Host, TcpHost};
use crate::peer::{Peer, SharedHeight, StaticPeerstoreProvider};
use crate::raintree::{Broadcast, NetworkMessage, Router};
use crate::server::Settings;
use crate::telemetry::TracingTelemetry;
use crate::{Error, Result};

use actix::{Actor, Addr, Context, Handler, Recipient};
use ed25519_dalek::{Keypair, PublicKey, SecretKey};
use rand::rngs::OsRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use std::net::SocketAddr;
use std::sync::Arc;

/// Logs the payloads delivered to this node.
pub struct MessageLogger;

impl Actor for MessageLogger {
    type Context = Context<Self>;
}

impl Handler<NetworkMessage> for MessageLogger {
    type Result = ();

    fn handle(&mut self, msg: NetworkMessage, _ctx: &mut Context<Self>) -> Self::Result {
        info!("[{}] {}", "received".green(), String::from_utf8_lossy(&msg.data));
    }
}

fn public_key_from_settings(settings: &Settings) -> Result<PublicKey> {
    if settings.secret_key.is_empty() {
        let mut csprng = OsRng {};
        let keypair = Keypair::generate(&mut csprng);
        let public_key = hex::encode(keypair.public.as_bytes());
        warn!("no secret key configured, using a fresh key with public key {}", public_key);
        return Ok(keypair.public);
    }
    let bytes = hex::decode(&settings.secret_key)
        .map_err(|err| Error::InvalidConfig(format!("secret_key: {}", err)))?;
    let secret = SecretKey::from_bytes(&bytes)?;
    Ok(PublicKey::from(&secret))
}

/// Starts a TCP host and a RainTree router for the staked peers of `settings`.
pub async fn start(settings: Settings) -> Result<(Arc<TcpHost>, Addr<Router>)> {
    let public_key = public_key_from_settings(&settings)?;
    let listener_address: SocketAddr = settings
        .listener_address
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("listener_address: {}", settings.listener_address)))?;
    let host = TcpHost::listen(listener_address, public_key, settings.service_url.clone()).await?;
    let router = start_router(&settings, public_key, host.clone(), MessageLogger.start().recipient()).await?;
    Ok((host, router))
}

/// Starts a RainTree router on a listening `host`, delivering payloads to `recipient`.
pub async fn start_router(
    settings: &Settings,
    public_key: PublicKey,
    host: Arc<TcpHost>,
    recipient: Recipient<NetworkMessage>,
) -> Result<Addr<Router>> {
    let self_peer = Peer::new(public_key, settings.service_url.clone());
    info!("[{}] {} is starting", "node".cyan(), self_peer.address);

    let mut peers = vec![self_peer.clone()];
    for description in settings.peers.iter() {
        let peer = Peer::from_description(description)?;
        if peer.address != self_peer.address {
            peers.push(peer);
        }
    }

    Router::create(
        self_peer.address,
        host,
        Arc::new(StaticPeerstoreProvider::new(peers)),
        Arc::new(SharedHeight::new(0)),
        Arc::new(TracingTelemetry),
        recipient,
        settings.raintree.clone(),
    )
    .await
}

/// Broadcasts every line read from stdin until EOF.
pub async fn broadcast_stdin(router: Addr<Router>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        router.send(Broadcast { data: line.into_bytes() }).await??;
    }
    Ok(())
}

/// Runs a node until stdin is closed or the process is interrupted.
pub async fn run(settings: Settings) -> Result<()> {
    let (host, router) = start(settings).await?;
    let reason = tokio::select! {
        result = broadcast_stdin(router) => match result {
            Ok(()) => "EOF",
            Err(err) => {
                warn!("broadcasting from stdin: {:?}", err);
                "error"
            }
        },
        _ = tokio::signal::ctrl_c() => "Ctrl+C",
    };
    info!("[{}] got {}, stopping...", "node".cyan(), reason);
    host.close().await
}

//! End-to-end propagation tests over a `MockNet`

use crate::address::Address;
use crate::host::{Host, InboundStream, MockHost, MockNet, PeerId, TcpHost, DEFAULT_PEER_TTL};
use crate::peer::{ArchivedPeerstoreProvider, Peer, PeerstoreProvider, SharedHeight, StaticPeerstoreProvider};
use crate::raintree::{
    AddPeer, Broadcast, GetPeerstore, NetworkMessage, RainTreeConfig, RainTreeFrame, RemovePeer, Router,
    SendTo, Size,
};
use crate::telemetry::{
    EventCounter, TelemetrySink, BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME,
    RAINTREE_MESSAGE_EVENT_METRIC_NAME, RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME,
};
use crate::Error;

use actix::{Actor, Addr, Context, Handler};
use ed25519_dalek::Keypair;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, Duration, Instant};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

const PROTOCOL_ID: &str = "/raintree/1.0.0";
const WAIT: Duration = Duration::from_secs(2);

type Delivered = Arc<Mutex<Vec<(Address, Vec<u8>)>>>;

// Collects the payloads a router delivers
struct Recorder {
    address: Address,
    delivered: Delivered,
}

impl Actor for Recorder {
    type Context = Context<Self>;
}

impl Handler<NetworkMessage> for Recorder {
    type Result = ();

    fn handle(&mut self, msg: NetworkMessage, _ctx: &mut Context<Self>) -> Self::Result {
        self.delivered.lock().push((self.address, msg.data));
    }
}

/// A peer with a synthetic address made of one repeated letter.
fn letter_peer(letter: u8) -> Peer {
    let mut csprng = OsRng {};
    Peer {
        public_key: Keypair::generate(&mut csprng).public,
        address: Address::repeat(letter),
        service_url: format!("10.0.0.{}:42069", letter),
    }
}

fn letter_peers(letters: &[u8]) -> Vec<Peer> {
    letters.iter().map(|letter| letter_peer(*letter)).collect()
}

fn real_peers(n: usize) -> Vec<Peer> {
    let mut csprng = OsRng {};
    (0..n)
        .map(|i| Peer::new(Keypair::generate(&mut csprng).public, format!("10.0.2.{}:42069", i)))
        .collect()
}

fn host_id(peer: &Peer) -> PeerId {
    PeerId::from_public_key(&peer.public_key)
}

fn letters_by_id(peers: &[Peer]) -> HashMap<PeerId, u8> {
    peers.iter().map(|peer| (host_id(peer), peer.address[0])).collect()
}

/// Letters of the peers `from` opened streams to, grouped by two and sorted within a group.
fn opened_by(net: &MockNet, from: &Peer, peers: &[Peer]) -> Vec<Vec<u8>> {
    let letters = letters_by_id(peers);
    let opened: Vec<u8> = net
        .opened_streams()
        .iter()
        .filter(|opened| opened.from == host_id(from))
        .map(|opened| letters[&opened.to])
        .collect();
    opened
        .chunks(2)
        .map(|pair| {
            let mut pair = pair.to_vec();
            pair.sort();
            pair
        })
        .collect()
}

fn recording_hosts(net: &MockNet, peers: &[Peer]) -> Vec<Arc<MockHost>> {
    peers
        .iter()
        .map(|peer| net.add_recording_host(peer.public_key, &peer.service_url, PROTOCOL_ID))
        .collect()
}

struct TestRouter {
    router: Addr<Router>,
    telemetry: Arc<EventCounter>,
    delivered: Delivered,
}

async fn start_router(
    net: &MockNet,
    self_peer: &Peer,
    pstore_provider: Arc<dyn PeerstoreProvider>,
    height: SharedHeight,
    config: RainTreeConfig,
) -> TestRouter {
    let host = net.add_host(self_peer.public_key, &self_peer.service_url);
    let telemetry = Arc::new(EventCounter::new());
    let delivered: Delivered = Arc::new(Mutex::new(vec![]));
    let recorder = Recorder { address: self_peer.address, delivered: delivered.clone() }.start();
    let router = Router::create(
        self_peer.address,
        host,
        pstore_provider,
        Arc::new(height),
        telemetry.clone() as Arc<dyn TelemetrySink>,
        recorder.recipient(),
        config,
    )
    .await
    .unwrap();
    TestRouter { router, telemetry, delivered }
}

async fn start_static_router(net: &MockNet, self_peer: &Peer, peers: &[Peer]) -> TestRouter {
    let provider = Arc::new(StaticPeerstoreProvider::new(peers.to_vec()));
    start_router(net, self_peer, provider, SharedHeight::new(0), RainTreeConfig::default()).await
}

/// Adds a host which accepts streams of the RainTree protocol but never reads them.
fn stalling_host(net: &MockNet, peer: &Peer) -> (Arc<MockHost>, Arc<Mutex<Vec<InboundStream>>>) {
    let host = net.add_host(peer.public_key, &peer.service_url);
    let held: Arc<Mutex<Vec<InboundStream>>> = Arc::new(Mutex::new(vec![]));
    let streams = held.clone();
    host.set_stream_handler(PROTOCOL_ID, Arc::new(move |inbound: InboundStream| streams.lock().push(inbound)));
    (host, held)
}

// Letter peers announce a host identity which differs from their address, a static peer set
// keeps them from being discovered as extra peers
fn static_config() -> RainTreeConfig {
    RainTreeConfig { is_dynamic_peer_set: false, ..RainTreeConfig::default() }
}

fn short_timeout_config() -> RainTreeConfig {
    RainTreeConfig { stream_timeout_ms: 100, ..RainTreeConfig::default() }
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Opens a stream from `from` to `to` and writes `frame` on it.
async fn send_frame(from: &MockHost, to: &Peer, frame: &RainTreeFrame) {
    from.peerstore().add_address(host_id(to), "10.9.9.9:1".parse().unwrap(), DEFAULT_PEER_TTL);
    let mut stream = from.open_stream(host_id(to), PROTOCOL_ID).await.unwrap();
    stream.write_all(&frame.to_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

async fn assert_broadcast_targets(letters: &[u8], expected: Vec<&[u8]>) {
    let peers = letter_peers(letters);
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(Broadcast { data: b"hello".to_vec() }).await.unwrap().unwrap();

    let expected: Vec<Vec<u8>> = expected.into_iter().map(|pair| pair.to_vec()).collect();
    assert_eq!(opened_by(&net, &peers[0], &peers), expected);

    // Each frame is one level below the one before, and all carry the same nonce
    let delivered = net.wait_for_deliveries(2 * expected.len(), WAIT).await;
    let frames: Vec<RainTreeFrame> =
        delivered.iter().map(|d| RainTreeFrame::from_bytes(&d.data).unwrap()).collect();
    let max_level = expected.len() as u32;
    for level in 1..=max_level {
        assert_eq!(frames.iter().filter(|f| f.level == level).count(), 2);
    }
    assert!(frames.iter().all(|f| f.nonce == frames[0].nonce && f.data == b"hello".to_vec()));
    assert_eq!(node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 2 * expected.len());
}

#[actix_rt::test]
async fn test_six_node_broadcast() {
    assert_broadcast_targets(b"ABCDEF", vec![b"CE", b"BC"]).await;
}

#[actix_rt::test]
async fn test_nine_node_broadcast() {
    assert_broadcast_targets(b"ABCDEFGHI", vec![b"DG", b"CE"]).await;
}

#[actix_rt::test]
async fn test_twenty_seven_node_broadcast() {
    assert_broadcast_targets(b"OPQRSTUVWXYZ[ABCDEFGHIJKLMN", vec![b"FX", b"U[", b"SW"]).await;
}

#[actix_rt::test]
async fn test_single_node_broadcast_is_noop() {
    let peers = letter_peers(b"A");
    let net = MockNet::new();
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(Broadcast { data: b"hello".to_vec() }).await.unwrap().unwrap();
    assert!(net.opened_streams().is_empty());
    assert_eq!(node.telemetry.total(), 0);
}

#[actix_rt::test]
async fn test_two_node_broadcast_sends_once() {
    let peers = letter_peers(b"AB");
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(Broadcast { data: b"hello".to_vec() }).await.unwrap().unwrap();
    assert_eq!(opened_by(&net, &peers[0], &peers), vec![b"B".to_vec()]);

    let delivered = net.wait_for_deliveries(1, WAIT).await;
    let frame = RainTreeFrame::from_bytes(&delivered[0].data).unwrap();
    assert_eq!(frame.level, 1);
}

#[actix_rt::test]
async fn test_send_to_self() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(SendTo { data: b"me".to_vec(), address: peers[0].address }).await.unwrap().unwrap();
    assert!(net.opened_streams().is_empty());
    assert_eq!(node.telemetry.total(), 0);
}

#[actix_rt::test]
async fn test_send() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(SendTo { data: b"you".to_vec(), address: peers[2].address }).await.unwrap().unwrap();
    let delivered = net.wait_for_deliveries(1, WAIT).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].to, host_id(&peers[2]));
    let frame = RainTreeFrame::from_bytes(&delivered[0].data).unwrap();
    assert_eq!(frame.level, 0);
    assert_eq!(frame.data, b"you".to_vec());
    assert_ne!(frame.nonce, 0);

    match node.router.send(SendTo { data: vec![], address: Address::repeat(b'Z') }).await.unwrap() {
        Err(Error::NoKnownPeer(address)) => assert_eq!(address, Address::repeat(b'Z')),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 1);
    assert_eq!(node.telemetry.count(RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME), 1);
}

#[actix_rt::test]
async fn test_stream_accepted_right_after_create() {
    let peers = letter_peers(b"AB");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    // No message reaches the router before the stream is opened
    send_frame(&hosts[0], &peers[0], &RainTreeFrame::new(0, b"early".to_vec(), 5, None)).await;
    assert!(wait_until(|| node.delivered.lock().len() == 1).await);
    assert_eq!(node.delivered.lock()[0].1, b"early".to_vec());
}

#[actix_rt::test]
async fn test_failed_sends_are_counted() {
    // Only `A` is on the network, every target is unreachable
    let peers = letter_peers(b"ABCDEF");
    let net = MockNet::new();
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(Broadcast { data: b"lost".to_vec() }).await.unwrap().unwrap();
    assert!(net.opened_streams().is_empty());
    assert_eq!(node.telemetry.count(RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME), 4);
    assert_eq!(node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 0);
}

#[actix_rt::test]
async fn test_send_timeout_does_not_stop_propagation() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let (_stalled, _held) = stalling_host(&net, &peers[1]);
    let _recording = net.add_recording_host(peers[2].public_key, &peers[2].service_url, PROTOCOL_ID);
    let provider = Arc::new(StaticPeerstoreProvider::new(peers.clone()));
    let node = start_router(&net, &peers[0], provider, SharedHeight::new(0), short_timeout_config()).await;

    // Larger than the pipe buffer, so writing to `B` blocks
    let data = vec![7u8; 100 * 1024];
    node.router.send(Broadcast { data: data.clone() }).await.unwrap().unwrap();
    assert_eq!(node.telemetry.count(RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME), 1);
    assert_eq!(node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 1);

    let delivered = net.wait_for_deliveries(1, WAIT).await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].to, host_id(&peers[2]));
    assert_eq!(RainTreeFrame::from_bytes(&delivered[0].data).unwrap().data, data);
}

#[actix_rt::test]
async fn test_unfinished_inbound_stream_is_dropped() {
    let peers = letter_peers(b"AB");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let provider = Arc::new(StaticPeerstoreProvider::new(peers.clone()));
    let node = start_router(&net, &peers[0], provider, SharedHeight::new(0), short_timeout_config()).await;

    hosts[0].peerstore().add_address(host_id(&peers[0]), "10.9.9.9:1".parse().unwrap(), DEFAULT_PEER_TTL);
    let mut stream = hosts[0].open_stream(host_id(&peers[0]), PROTOCOL_ID).await.unwrap();
    stream.write_all(&RainTreeFrame::new(0, b"never".to_vec(), 9, None).to_bytes()).await.unwrap();

    // The stream stays open past the read timeout
    sleep(Duration::from_millis(300)).await;
    assert!(node.delivered.lock().is_empty());
    assert_eq!(node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 0);
    drop(stream);
}

#[actix_rt::test]
async fn test_delivery_does_not_wait_for_forwarding() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let (stalled, _held) = stalling_host(&net, &peers[1]);
    let (_other, _other_held) = stalling_host(&net, &peers[2]);
    // Forwards to `B` and `C` block until the timeout
    let config = RainTreeConfig { stream_timeout_ms: 5_000, ..RainTreeConfig::default() };
    let provider = Arc::new(StaticPeerstoreProvider::new(peers.clone()));
    let node = start_router(&net, &peers[0], provider, SharedHeight::new(0), config).await;

    let frame = RainTreeFrame::new(2, vec![3u8; 100 * 1024], 13, None);
    send_frame(&stalled, &peers[0], &frame).await;

    let started = Instant::now();
    assert!(wait_until(|| node.delivered.lock().len() == 1).await);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(node.telemetry.count(RAINTREE_SEND_FAILURE_EVENT_METRIC_NAME), 0);
}

#[actix_rt::test]
async fn test_duplicate_is_delivered_once() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    let frame = RainTreeFrame::new(0, b"once".to_vec(), 7, None);
    send_frame(&hosts[0], &peers[0], &frame).await;
    send_frame(&hosts[1], &peers[0], &frame).await;

    let telemetry = node.telemetry.clone();
    assert!(wait_until(|| telemetry.count(BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME) == 1).await);
    assert_eq!(telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME), 2);
    assert_eq!(*node.delivered.lock(), vec![(peers[0].address, b"once".to_vec())]);
    // Level 0 frames are not forwarded
    assert!(net.opened_streams().iter().all(|opened| opened.from != host_id(&peers[0])));
}

#[actix_rt::test]
async fn test_originator_rejects_echo() {
    let peers = letter_peers(b"ABCD");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    node.router.send(Broadcast { data: b"echo".to_vec() }).await.unwrap().unwrap();
    let delivered = net.wait_for_deliveries(1, WAIT).await;
    let mut echo = RainTreeFrame::from_bytes(&delivered[0].data).unwrap();
    echo.level = 0;
    send_frame(&hosts[0], &peers[0], &echo).await;

    let telemetry = node.telemetry.clone();
    assert!(wait_until(|| telemetry.count(BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME) == 1).await);
    assert!(node.delivered.lock().is_empty());
}

#[actix_rt::test]
async fn test_malformed_frame_is_dropped() {
    let peers = letter_peers(b"AB");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers).await;

    hosts[0].peerstore().add_address(host_id(&peers[0]), "10.9.9.9:1".parse().unwrap(), DEFAULT_PEER_TTL);
    let mut stream = hosts[0].open_stream(host_id(&peers[0]), PROTOCOL_ID).await.unwrap();
    stream.write_all(&[0x12, 0x05, b'h']).await.unwrap();
    stream.shutdown().await.unwrap();

    let telemetry = node.telemetry.clone();
    assert!(wait_until(|| telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME) == 1).await);
    sleep(Duration::from_millis(50)).await;
    assert!(node.delivered.lock().is_empty());
    assert_eq!(telemetry.count(BROADCAST_MESSAGE_REDUNDANCY_PER_BLOCK_EVENT_METRIC_NAME), 0);
}

// A frame routed at a past height is forwarded with the peer set of that height
#[actix_rt::test]
async fn test_past_height_propagation() {
    let peers = letter_peers(b"ABCDEFGHI");
    for (frame_height, expected) in vec![(Some(1), b"CE"), (Some(2), b"BC"), (None, b"BC")].into_iter() {
        let net = MockNet::new();
        let hosts = recording_hosts(&net, &peers[1..]);
        let provider = ArchivedPeerstoreProvider::new();
        provider.record(1, peers.clone());
        provider.record(2, peers[..6].to_vec());
        let node = start_router(&net, &peers[0], Arc::new(provider), SharedHeight::new(2), static_config()).await;

        let frame = RainTreeFrame::new(2, b"old".to_vec(), 11, frame_height);
        send_frame(&hosts[0], &peers[0], &frame).await;

        let delivered = net.wait_for_deliveries(2, WAIT).await;
        let forwarded: Vec<_> = delivered.iter().filter(|d| d.from == host_id(&peers[0])).collect();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(opened_by(&net, &peers[0], &peers), vec![expected.to_vec()]);
        for delivery in forwarded {
            let forwarded_frame = RainTreeFrame::from_bytes(&delivery.data).unwrap();
            assert_eq!(forwarded_frame.level, 1);
            assert_eq!(forwarded_frame.height, frame_height);
        }
        assert!(wait_until(|| node.delivered.lock().len() == 1).await);
    }
}

#[actix_rt::test]
async fn test_unknown_height_falls_back_to_live_view() {
    let peers = letter_peers(b"ABCDEF");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let provider = ArchivedPeerstoreProvider::new();
    provider.record(5, peers.clone());
    let node = start_router(&net, &peers[0], Arc::new(provider), SharedHeight::new(5), static_config()).await;

    send_frame(&hosts[0], &peers[0], &RainTreeFrame::new(2, vec![1], 3, Some(1))).await;
    let _ = net.wait_for_deliveries(2, WAIT).await;
    assert_eq!(opened_by(&net, &peers[0], &peers), vec![b"BC".to_vec()]);
    assert!(wait_until(|| node.delivered.lock().len() == 1).await);
}

async fn assert_full_coverage(n: usize) {
    let peers = real_peers(n);
    let net = MockNet::new();
    let mut nodes = vec![];
    for peer in peers.iter() {
        nodes.push(start_static_router(&net, peer, &peers).await);
    }

    nodes[0].router.send(Broadcast { data: b"everyone".to_vec() }).await.unwrap().unwrap();
    assert!(wait_until(|| nodes[1..].iter().all(|node| !node.delivered.lock().is_empty())).await);

    // Let redundant frames settle, then no node has delivered twice
    sleep(Duration::from_millis(100)).await;
    assert!(nodes[0].delivered.lock().is_empty());
    for node in nodes[1..].iter() {
        let delivered = node.delivered.lock();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, b"everyone".to_vec());
    }

    // No frame travels further than the height of the tree
    let max_levels = crate::raintree::max_num_levels(n);
    for node in nodes.iter() {
        let received = node.telemetry.count(RAINTREE_MESSAGE_EVENT_METRIC_NAME);
        assert!(received <= 2 * max_levels as usize * n);
    }
}

#[actix_rt::test]
async fn test_thirteen_routers_full_coverage() {
    assert_full_coverage(13).await;
}

#[actix_rt::test]
async fn test_twenty_seven_routers_full_coverage() {
    assert_full_coverage(27).await;
}

#[actix_rt::test]
async fn test_add_and_remove_peer() {
    let peers = letter_peers(b"ABCDE");
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers[..4]).await;

    let before = node.router.send(GetPeerstore).await.unwrap().unwrap();
    assert_eq!(node.router.send(Size).await.unwrap().unwrap(), 4);

    node.router.send(AddPeer { peer: peers[4].clone() }).await.unwrap().unwrap();
    // Known addresses are not added twice
    node.router.send(AddPeer { peer: peers[4].clone() }).await.unwrap().unwrap();
    assert_eq!(node.router.send(Size).await.unwrap().unwrap(), 5);

    // The new peer is reachable
    node.router.send(SendTo { data: vec![1], address: peers[4].address }).await.unwrap().unwrap();
    let delivered = net.wait_for_deliveries(1, WAIT).await;
    assert_eq!(delivered[0].to, host_id(&peers[4]));

    node.router.send(RemovePeer { address: peers[4].address }).await.unwrap().unwrap();
    node.router.send(RemovePeer { address: peers[4].address }).await.unwrap().unwrap();
    let after = node.router.send(GetPeerstore).await.unwrap().unwrap();
    assert_eq!(after.size(), before.size());
    assert!(after.get_peer(&peers[4].address).is_none());

    match node.router.send(SendTo { data: vec![1], address: peers[4].address }).await.unwrap() {
        Err(Error::NoKnownPeer(_)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[actix_rt::test]
async fn test_inbound_stream_adds_remote_peer() {
    let peers = letter_peers(b"ABCD");
    let net = MockNet::new();
    let hosts = recording_hosts(&net, &peers[1..]);
    let node = start_static_router(&net, &peers[0], &peers[..3]).await;
    assert_eq!(node.router.send(Size).await.unwrap().unwrap(), 3);

    // `D` is not staked but talks to `A`, its identity comes from the host
    send_frame(&hosts[2], &peers[0], &RainTreeFrame::new(0, vec![4], 4, None)).await;
    assert!(wait_until(|| node.delivered.lock().len() == 1).await);

    let pstore = node.router.send(GetPeerstore).await.unwrap().unwrap();
    let added = pstore.get_peer(&crate::address::Address::from_public_key(&peers[3].public_key));
    assert_eq!(added.map(|peer| peer.service_url.clone()), Some(peers[3].service_url.clone()));
}

#[actix_rt::test]
async fn test_static_peer_set_rejects_changes() {
    let peers = letter_peers(b"ABC");
    let net = MockNet::new();
    let _hosts = recording_hosts(&net, &peers[1..]);
    let config = RainTreeConfig { is_dynamic_peer_set: false, ..RainTreeConfig::default() };
    let provider = Arc::new(StaticPeerstoreProvider::new(peers[..2].to_vec()));
    let node = start_router(&net, &peers[0], provider, SharedHeight::new(0), config).await;

    match node.router.send(AddPeer { peer: peers[2].clone() }).await.unwrap() {
        Err(Error::StaticPeerSet) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    match node.router.send(RemovePeer { address: peers[1].address }).await.unwrap() {
        Err(Error::StaticPeerSet) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(node.router.send(Size).await.unwrap().unwrap(), 2);
}

#[actix_rt::test]
async fn test_router_requires_peers() {
    let peers = letter_peers(b"A");
    let net = MockNet::new();
    let host = net.add_host(peers[0].public_key, &peers[0].service_url);
    let delivered: Delivered = Arc::new(Mutex::new(vec![]));
    let recorder = Recorder { address: peers[0].address, delivered }.start();

    let result = Router::create(
        peers[0].address,
        host,
        Arc::new(StaticPeerstoreProvider::new(vec![])),
        Arc::new(SharedHeight::new(0)),
        Arc::new(EventCounter::new()),
        recorder.recipient(),
        RainTreeConfig::default(),
    )
    .await;
    match result {
        Err(Error::EmptyPeerstore) => (),
        Err(err) => panic!("unexpected error: {:?}", err),
        Ok(_) => panic!("router started without peers"),
    }
}

#[actix_rt::test]
async fn test_unauthenticated_host_does_not_discover_peers() {
    let mut csprng = OsRng {};
    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut hosts = vec![];
    let mut peers = vec![];
    for _ in 0..3 {
        let public_key = Keypair::generate(&mut csprng).public;
        let host = TcpHost::listen(any, public_key, String::new()).await.unwrap();
        peers.push(Peer::new(public_key, host.local_addr().to_string()));
        hosts.push(host);
    }

    let delivered: Delivered = Arc::new(Mutex::new(vec![]));
    let recorder = Recorder { address: peers[0].address, delivered: delivered.clone() }.start();
    let router = Router::create(
        peers[0].address,
        hosts[0].clone(),
        Arc::new(StaticPeerstoreProvider::new(peers[..2].to_vec())),
        Arc::new(SharedHeight::new(0)),
        Arc::new(EventCounter::new()),
        recorder.recipient(),
        RainTreeConfig::default(),
    )
    .await
    .unwrap();

    // The third host is not staked and only claims its identity
    hosts[2].peerstore().add_address(hosts[0].id(), hosts[0].local_addr(), DEFAULT_PEER_TTL);
    let mut stream = hosts[2].open_stream(hosts[0].id(), PROTOCOL_ID).await.unwrap();
    stream.write_all(&RainTreeFrame::new(0, b"hi".to_vec(), 21, None).to_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();

    assert!(wait_until(|| delivered.lock().len() == 1).await);
    assert_eq!(router.send(Size).await.unwrap().unwrap(), 2);
    let pstore = router.send(GetPeerstore).await.unwrap().unwrap();
    assert!(pstore.get_peer(&peers[2].address).is_none());

    for host in hosts.iter() {
        host.close().await.unwrap();
    }
}

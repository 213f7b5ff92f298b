use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use plotd_consensus::{ServiceFlag, SF_FULL_NODE, ZERO_HASH};
use plotd_node::{
    BasePeer, BasePeerSet, PeerSet, SyncError, SyncMessage, BLOCKCHAIN_CHANNEL,
    MAX_FILTER_ADDRESS_COUNT, MAX_FILTER_ADDRESS_SIZE,
};
use plotd_primitives::block::CURRENT_VERSION;
use plotd_primitives::{Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut};

struct MockPeer {
    id: String,
    addr: SocketAddr,
    services: ServiceFlag,
    outbound: bool,
    sender: Sender<(u8, SyncMessage)>,
}

impl BasePeer for MockPeer {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn service_flag(&self) -> ServiceFlag {
        self.services
    }

    fn try_send(&self, channel: u8, message: SyncMessage) -> bool {
        self.sender.try_send((channel, message)).is_ok()
    }

    fn is_outbound(&self) -> bool {
        self.outbound
    }
}

#[derive(Default)]
struct MockTransport {
    banned: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
}

impl BasePeerSet for MockTransport {
    fn add_banned_peer(&self, addr: &str) -> Result<(), SyncError> {
        self.banned.lock().expect("banned lock").push(addr.to_string());
        Ok(())
    }

    fn stop_peer_gracefully(&self, id: &str) {
        self.stopped.lock().expect("stopped lock").push(id.to_string());
    }
}

fn peer_addr(tag: u8) -> SocketAddr {
    format!("10.0.0.{tag}:9633").parse().expect("addr")
}

fn add_mock_peer(
    set: &PeerSet,
    id: &str,
    tag: u8,
    height: u64,
    services: ServiceFlag,
    queue: usize,
) -> Receiver<(u8, SyncMessage)> {
    let (sender, receiver) = bounded(queue);
    let peer = Arc::new(MockPeer {
        id: id.to_string(),
        addr: peer_addr(tag),
        services,
        outbound: true,
        sender,
    });
    set.add_peer(peer, height, ZERO_HASH);
    receiver
}

fn make_tx(tag: u8) -> Transaction {
    Transaction {
        version: 1,
        vin: vec![TxIn {
            prevout: OutPoint {
                hash: [tag; 32],
                index: 0,
            },
            witness: Vec::new(),
            sequence: u32::MAX,
        }],
        vout: vec![TxOut {
            value: 1_000,
            pk_script: vec![0x51, tag],
        }],
        lock_time: 0,
        payload: Vec::new(),
    }
}

fn make_block(height: u64, tag: u8) -> Block {
    Block {
        header: BlockHeader {
            version: CURRENT_VERSION,
            height,
            prev_block: [tag; 32],
            tx_root: [tag; 32],
            timestamp: 1_700_000_000 + height,
            target: 0x1f00_ffff,
            challenge: [tag; 32],
            proof: Vec::new(),
            block_sig: Vec::new(),
        },
        transactions: vec![make_tx(tag)],
    }
}

#[test]
fn add_peer_ignores_duplicate_id() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);

    let _rx1 = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);
    let _rx2 = add_mock_peer(&set, "alpha", 2, 99, SF_FULL_NODE, 8);

    let peer = set.get_peer("alpha").expect("peer");
    assert_eq!(peer.height(), 10);
    assert_eq!(set.get_peer_infos().len(), 1);
}

#[test]
fn remove_peer_stops_connection_gracefully() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(Arc::clone(&transport) as Arc<dyn BasePeerSet>);

    let _rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);
    set.remove_peer("alpha");

    assert!(set.get_peer("alpha").is_none());
    assert_eq!(
        transport.stopped.lock().expect("stopped lock").as_slice(),
        &["alpha".to_string()]
    );
}

#[test]
fn best_peer_honors_service_flag_and_height() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);

    let _rx1 = add_mock_peer(&set, "low", 1, 5, SF_FULL_NODE, 8);
    let _rx2 = add_mock_peer(&set, "high", 2, 50, SF_FULL_NODE, 8);
    let _rx3 = add_mock_peer(&set, "spv", 3, 500, ServiceFlag::NONE, 8);

    let best = set.best_peer(SF_FULL_NODE).expect("best peer");
    assert_eq!(best.id(), "high");
    assert!(set.best_peer(ServiceFlag(1 << 7)).is_none());
}

#[test]
fn set_status_updates_snapshot() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let _rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);

    let peer = set.get_peer("alpha").expect("peer");
    peer.set_status(42, [0x0f; 32]);
    assert_eq!(peer.height(), 42);
    assert_eq!(peer.hash(), [0x0f; 32]);
}

#[test]
fn broadcast_tx_skips_known_and_marks_sent() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);

    let tx = make_tx(0x21);
    set.broadcast_tx(&tx);
    set.broadcast_tx(&tx);

    let (channel, message) = rx.try_recv().expect("first send");
    assert_eq!(channel, BLOCKCHAIN_CHANNEL);
    assert_eq!(message.command(), "tx");
    // The second broadcast found the hash already marked.
    assert!(rx.try_recv().is_err());
}

#[test]
fn broadcast_tx_removes_unresponsive_peer() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(Arc::clone(&transport) as Arc<dyn BasePeerSet>);
    // Queue of one: the second distinct transaction cannot be enqueued.
    let _rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 1);

    set.broadcast_tx(&make_tx(0x31));
    assert!(set.get_peer("alpha").is_some());

    set.broadcast_tx(&make_tx(0x32));
    assert!(set.get_peer("alpha").is_none());
    assert_eq!(
        transport.stopped.lock().expect("stopped lock").as_slice(),
        &["alpha".to_string()]
    );
}

#[test]
fn broadcast_mined_block_skips_spv_peers() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let full_rx = add_mock_peer(&set, "full", 1, 10, SF_FULL_NODE, 8);
    let spv_rx = add_mock_peer(&set, "spv", 2, 10, ServiceFlag::NONE, 8);

    let block = make_block(7, 0x41);
    set.broadcast_mined_block(&block);

    assert_eq!(full_rx.try_recv().expect("send").1.command(), "block");
    assert!(spv_rx.try_recv().is_err());

    // The full peer now knows the hash and is skipped on re-broadcast.
    set.broadcast_mined_block(&block);
    assert!(full_rx.try_recv().is_err());
}

#[test]
fn broadcast_tx_honors_spv_filter() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let rx = add_mock_peer(&set, "spv", 1, 10, ServiceFlag::NONE, 8);

    let relevant = make_tx(0x51);
    let irrelevant = make_tx(0x52);

    let peer = set.get_peer("spv").expect("peer");
    peer.add_filter_addresses(&[relevant.vout[0].pk_script.clone()]);

    set.broadcast_tx(&irrelevant);
    assert!(rx.try_recv().is_err());

    set.broadcast_tx(&relevant);
    assert_eq!(rx.try_recv().expect("send").1.command(), "tx");
}

#[test]
fn broadcast_new_status_targets_stale_peers() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let stale_rx = add_mock_peer(&set, "stale", 1, 10, SF_FULL_NODE, 8);
    let current_rx = add_mock_peer(&set, "current", 2, 10, SF_FULL_NODE, 8);

    let genesis = make_block(0, 0x00);
    let best = make_block(9, 0x61);
    set.get_peer("current")
        .expect("peer")
        .mark_block(&best.hash());

    set.broadcast_new_status(&best, &genesis);

    let (_, message) = stale_rx.try_recv().expect("send");
    match message {
        SyncMessage::Status { best: header, genesis_hash } => {
            assert_eq!(header, best.header);
            assert_eq!(genesis_hash, genesis.hash());
        }
        other => panic!("unexpected message {other:?}"),
    }
    assert!(current_rx.try_recv().is_err());
}

#[test]
fn send_transactions_batches_with_dedup() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);
    let peer = set.get_peer("alpha").expect("peer");

    let tx_a = make_tx(0x71);
    let tx_b = make_tx(0x72);
    peer.mark_transaction(&tx_a.txid());

    assert!(peer.send_transactions(&[tx_a.clone(), tx_b.clone()]));
    assert_eq!(rx.try_recv().expect("send").1, SyncMessage::Tx(Box::new(tx_b)));
    assert!(rx.try_recv().is_err());
}

#[test]
fn send_block_and_headers() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let rx = add_mock_peer(&set, "alpha", 1, 10, SF_FULL_NODE, 8);
    let peer = set.get_peer("alpha").expect("peer");

    let block = make_block(3, 0x81);
    assert!(peer.send_block(&block));
    assert!(peer.knows_block(&block.hash()));
    assert_eq!(rx.try_recv().expect("send").1.command(), "block");

    assert!(peer.send_headers(&[block.header.clone()]));
    assert_eq!(rx.try_recv().expect("send").1.command(), "headers");

    let blocks = vec![make_block(4, 0x82), make_block(5, 0x83)];
    assert!(peer.send_blocks(&blocks));
    assert!(peer.knows_block(&blocks[1].hash()));
}

#[test]
fn filter_address_limits() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let _rx = add_mock_peer(&set, "spv", 1, 10, ServiceFlag::NONE, 8);
    let peer = set.get_peer("spv").expect("peer");

    // Oversized address is dropped silently.
    let oversized = vec![0xaa; MAX_FILTER_ADDRESS_SIZE + 1];
    let tx = make_tx(0x91);
    peer.add_filter_address(&oversized);
    assert!(!peer.is_related_tx(&tx));

    // A batch replaces the previous filter entirely.
    peer.add_filter_addresses(&[tx.vout[0].pk_script.clone()]);
    assert!(peer.is_related_tx(&tx));
    peer.add_filter_addresses(&[vec![0x01]]);
    assert!(!peer.is_related_tx(&tx));

    // Fill to the cap; further adds are rejected.
    let batch: Vec<Vec<u8>> = (0..MAX_FILTER_ADDRESS_COUNT as u32)
        .map(|i| i.to_le_bytes().to_vec())
        .collect();
    peer.add_filter_addresses(&batch);
    peer.add_filter_address(&tx.vout[0].pk_script);
    assert!(!peer.is_related_tx(&tx));
}

#[test]
fn ban_threshold_evicts_peer() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(Arc::clone(&transport) as Arc<dyn BasePeerSet>);
    let _rx = add_mock_peer(&set, "rogue", 1, 10, SF_FULL_NODE, 8);

    set.add_ban_score("rogue", 60, 0, "bad inventory");
    assert!(set.get_peer("rogue").is_some());
    assert!(transport.banned.lock().expect("banned lock").is_empty());

    set.add_ban_score("rogue", 50, 0, "bad block");
    assert!(set.get_peer("rogue").is_none());
    assert_eq!(
        transport.banned.lock().expect("banned lock").as_slice(),
        &[peer_addr(1).to_string()]
    );
    assert_eq!(
        transport.stopped.lock().expect("stopped lock").as_slice(),
        &["rogue".to_string()]
    );

    // Scoring an unknown peer is a no-op.
    set.add_ban_score("ghost", 200, 0, "nothing");
}

#[test]
fn error_handler_classifies() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(Arc::clone(&transport) as Arc<dyn BasePeerSet>);
    let _rx1 = add_mock_peer(&set, "misbehaving", 1, 10, SF_FULL_NODE, 8);
    let _rx2 = add_mock_peer(&set, "broken", 2, 10, SF_FULL_NODE, 8);

    set.error_handler(
        "misbehaving",
        &SyncError::PeerMisbehave("bad header".to_string()),
    );
    // A 20-point increment is well under the threshold.
    assert!(set.get_peer("misbehaving").is_some());

    set.error_handler("broken", &SyncError::Transport("socket closed".to_string()));
    assert!(set.get_peer("broken").is_none());

    // Repeated misbehavior eventually crosses the threshold.
    for _ in 0..5 {
        set.error_handler(
            "misbehaving",
            &SyncError::PeerMisbehave("bad header".to_string()),
        );
    }
    assert!(set.get_peer("misbehaving").is_none());
    assert_eq!(transport.banned.lock().expect("banned lock").len(), 1);
}

#[test]
fn peer_info_serializes_with_stable_field_names() {
    let transport = Arc::new(MockTransport::default());
    let set = PeerSet::new(transport);
    let _rx = add_mock_peer(&set, "alpha", 1, 12, SF_FULL_NODE, 8);

    let infos = set.get_peer_infos();
    assert_eq!(infos.len(), 1);
    let value = serde_json::to_value(&infos[0]).expect("serialize");
    assert_eq!(value["peer_id"], "alpha");
    assert_eq!(value["remote_addr"], peer_addr(1).to_string());
    assert_eq!(value["height"], 12);
    assert_eq!(value["is_outbound"], true);
}

#[test]
fn concurrent_broadcast_and_churn() {
    let transport = Arc::new(MockTransport::default());
    let set = Arc::new(PeerSet::new(
        Arc::clone(&transport) as Arc<dyn BasePeerSet>
    ));
    for tag in 0..8u8 {
        let _rx = add_mock_peer(&set, &format!("seed-{tag}"), tag, 10, SF_FULL_NODE, 1);
        // Receivers drop here, so sends fail and exercise removal paths.
    }

    let deadline = Instant::now() + Duration::from_millis(500);
    let mut handles = Vec::new();
    for worker in 0..4u8 {
        let set = Arc::clone(&set);
        handles.push(std::thread::spawn(move || {
            let mut round = 0u64;
            while Instant::now() < deadline {
                round += 1;
                let tag = (round % 200) as u8;
                match round % 4 {
                    0 => set.broadcast_tx(&make_tx(tag)),
                    1 => {
                        let (sender, receiver) = bounded(4);
                        set.add_peer(
                            Arc::new(MockPeer {
                                id: format!("w{worker}-{tag}"),
                                addr: peer_addr(tag),
                                services: SF_FULL_NODE,
                                outbound: false,
                                sender,
                            }),
                            round,
                            ZERO_HASH,
                        );
                        drop(receiver);
                    }
                    2 => set.remove_peer(&format!("w{worker}-{tag}")),
                    _ => {
                        let _ = set.get_peer_infos();
                        let _ = set.best_peer(SF_FULL_NODE);
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }
}

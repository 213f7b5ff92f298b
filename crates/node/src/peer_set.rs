//! Registry of active sync peers and broadcast fan-out.
//!
//! Lock discipline: the set lock is always taken before any per-peer lock,
//! never the reverse. Broadcasts snapshot their target list under the
//! shared set lock and release it before sending, so a slow peer cannot
//! stall the registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use plotd_consensus::{Hash256, ServiceFlag};
use plotd_primitives::{Block, Transaction};

use crate::message::SyncMessage;
use crate::peer::{Peer, PeerInfo};
use crate::{BasePeer, BasePeerSet, SyncError};

pub struct PeerSet {
    base: Arc<dyn BasePeerSet>,
    peers: RwLock<HashMap<String, Arc<Peer>>>,
}

impl PeerSet {
    pub fn new(base: Arc<dyn BasePeerSet>) -> Self {
        Self {
            base,
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection-level peer with its advertised chain status.
    /// Re-adding an existing id is logged and ignored.
    pub fn add_peer(&self, base_peer: Arc<dyn BasePeer>, height: u64, hash: Hash256) {
        let mut peers = self.peers.write().expect("peer set lock");
        let id = base_peer.id().to_string();
        if peers.contains_key(&id) {
            plotd_log::log_warn!("add existing peer {id} to peer set");
            return;
        }
        peers.insert(id, Arc::new(Peer::new(height, hash, base_peer)));
    }

    /// Drop the peer from the set, then let the transport stop the
    /// connection. The graceful-stop call runs outside the set lock.
    pub fn remove_peer(&self, id: &str) {
        {
            let mut peers = self.peers.write().expect("peer set lock");
            peers.remove(id);
        }
        self.base.stop_peer_gracefully(id);
    }

    pub fn get_peer(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.read().expect("peer set lock").get(id).cloned()
    }

    pub fn get_peer_infos(&self) -> Vec<PeerInfo> {
        let peers = self.peers.read().expect("peer set lock");
        peers.values().map(|peer| peer.peer_info()).collect()
    }

    /// The highest peer whose services include `flag`. Ties fall to map
    /// iteration order.
    pub fn best_peer(&self, flag: ServiceFlag) -> Option<Arc<Peer>> {
        let peers = self.peers.read().expect("peer set lock");
        let mut best: Option<&Arc<Peer>> = None;
        for peer in peers.values() {
            if !peer.service_flag().contains(flag) {
                continue;
            }
            if best.map(|b| peer.height() > b.height()).unwrap_or(true) {
                best = Some(peer);
            }
        }
        best.cloned()
    }

    pub fn peers_without_block(&self, hash: &Hash256) -> Vec<Arc<Peer>> {
        let peers = self.peers.read().expect("peer set lock");
        peers
            .values()
            .filter(|peer| !peer.knows_block(hash))
            .cloned()
            .collect()
    }

    pub fn peers_without_tx(&self, hash: &Hash256) -> Vec<Arc<Peer>> {
        let peers = self.peers.read().expect("peer set lock");
        peers
            .values()
            .filter(|peer| !peer.knows_transaction(hash))
            .cloned()
            .collect()
    }

    /// Announce a freshly mined block to full peers that have not seen it.
    /// Peers failing the non-blocking send are removed.
    pub fn broadcast_mined_block(&self, block: &Block) {
        let hash = block.hash();
        let peers = self.peers_without_block(&hash);
        for peer in peers {
            if peer.is_spv_node() {
                continue;
            }
            if !peer.try_send(SyncMessage::Block(Box::new(block.clone()))) {
                self.remove_peer(&peer.id());
                continue;
            }
            peer.mark_block(&hash);
        }
    }

    /// Tell peers behind the new tip about it. Status messages carry no
    /// block payload, so nothing is marked known.
    pub fn broadcast_new_status(&self, best: &Block, genesis: &Block) {
        let best_hash = best.hash();
        let genesis_hash = genesis.hash();
        let peers = self.peers_without_block(&best_hash);
        for peer in peers {
            let message = SyncMessage::Status {
                best: best.header.clone(),
                genesis_hash,
            };
            if !peer.try_send(message) {
                self.remove_peer(&peer.id());
            }
        }
    }

    /// Relay a transaction to peers that have not seen it, honoring SPV
    /// filters. Peers failing the send are removed.
    pub fn broadcast_tx(&self, tx: &Transaction) {
        let hash = tx.txid();
        let peers = self.peers_without_tx(&hash);
        for peer in peers {
            if peer.is_spv_node() && !peer.is_related_tx(tx) {
                continue;
            }
            if !peer.try_send(SyncMessage::Tx(Box::new(tx.clone()))) {
                self.remove_peer(&peer.id());
                continue;
            }
            peer.mark_transaction(&hash);
        }
    }

    /// Score misbehavior on a peer; crossing the threshold bans the address
    /// at the transport and evicts the peer.
    pub fn add_ban_score(&self, id: &str, persistent: u64, transient: u64, reason: &str) {
        let peer = {
            let peers = self.peers.read().expect("peer set lock");
            peers.get(id).cloned()
        };
        let Some(peer) = peer else {
            return;
        };
        if !peer.add_ban_score(persistent, transient, reason) {
            return;
        }
        if let Err(err) = self.base.add_banned_peer(&peer.addr().to_string()) {
            plotd_log::log_error!("fail on add banned peer: {err}");
        }
        self.remove_peer(id);
    }

    /// Classify a peer error: misbehavior feeds the ban score, anything
    /// else drops the peer immediately.
    pub fn error_handler(&self, id: &str, err: &SyncError) {
        if err.is_misbehave() {
            self.add_ban_score(id, 20, 0, &err.to_string());
        } else {
            self.remove_peer(id);
        }
    }
}

//! Per-connection sync state.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use plotd_consensus::{bytes_to_hex, Hash256, ServiceFlag, SF_FULL_NODE};
use plotd_primitives::{Block, BlockHeader, Transaction};
use serde::Serialize;

use crate::ban_score::DynamicBanScore;
use crate::known::KnownCache;
use crate::message::SyncMessage;
use crate::{
    BasePeer, BLOCKCHAIN_CHANNEL, DEFAULT_BAN_THRESHOLD, MAX_FILTER_ADDRESS_COUNT,
    MAX_FILTER_ADDRESS_SIZE, MAX_KNOWN_BLOCKS, MAX_KNOWN_TXS,
};

/// Snapshot of a peer's status for the status RPC.
#[derive(Clone, Debug, Serialize)]
pub struct PeerInfo {
    #[serde(rename = "peer_id")]
    pub id: String,
    pub remote_addr: String,
    pub height: u64,
    pub is_outbound: bool,
    pub delay: u32,
}

struct PeerState {
    height: u64,
    hash: Hash256,
    /// Transaction hashes this peer is known to have seen.
    known_txs: KnownCache,
    /// Block hashes this peer is known to have seen.
    known_blocks: KnownCache,
    /// Hex-encoded addresses an SPV peer cares about.
    filter_adds: HashSet<String>,
}

pub struct Peer {
    base: Arc<dyn BasePeer>,
    services: ServiceFlag,
    state: RwLock<PeerState>,
    ban_score: DynamicBanScore,
}

impl Peer {
    pub(crate) fn new(height: u64, hash: Hash256, base: Arc<dyn BasePeer>) -> Self {
        let services = base.service_flag();
        Self {
            base,
            services,
            state: RwLock::new(PeerState {
                height,
                hash,
                known_txs: KnownCache::new(MAX_KNOWN_TXS),
                known_blocks: KnownCache::new(MAX_KNOWN_BLOCKS),
                filter_adds: HashSet::new(),
            }),
            ban_score: DynamicBanScore::new(),
        }
    }

    pub fn id(&self) -> String {
        self.base.id().to_string()
    }

    pub fn addr(&self) -> SocketAddr {
        self.base.addr()
    }

    pub fn service_flag(&self) -> ServiceFlag {
        self.services
    }

    pub fn height(&self) -> u64 {
        self.state.read().expect("peer lock").height
    }

    pub fn hash(&self) -> Hash256 {
        self.state.read().expect("peer lock").hash
    }

    pub fn set_status(&self, height: u64, hash: Hash256) {
        let mut state = self.state.write().expect("peer lock");
        state.height = height;
        state.hash = hash;
    }

    pub fn mark_block(&self, hash: &Hash256) {
        let mut state = self.state.write().expect("peer lock");
        state.known_blocks.insert(*hash);
    }

    pub fn mark_transaction(&self, hash: &Hash256) {
        let mut state = self.state.write().expect("peer lock");
        state.known_txs.insert(*hash);
    }

    pub fn knows_block(&self, hash: &Hash256) -> bool {
        self.state.read().expect("peer lock").known_blocks.contains(hash)
    }

    pub fn knows_transaction(&self, hash: &Hash256) -> bool {
        self.state.read().expect("peer lock").known_txs.contains(hash)
    }

    /// Register one filter address. Silently rejected once the filter is
    /// full or when the address is oversized.
    pub fn add_filter_address(&self, address: &[u8]) {
        let mut state = self.state.write().expect("peer lock");
        let size = state.filter_adds.len();
        if size >= MAX_FILTER_ADDRESS_COUNT {
            plotd_log::log_warn!(
                "filter address count {size} at limit {MAX_FILTER_ADDRESS_COUNT}, dropping add"
            );
            return;
        }
        if address.len() > MAX_FILTER_ADDRESS_SIZE {
            plotd_log::log_warn!(
                "filter address size {} over limit {MAX_FILTER_ADDRESS_SIZE}, dropping add",
                address.len()
            );
            return;
        }
        state.filter_adds.insert(bytes_to_hex(address));
    }

    /// Replace the filter with this batch: any previous contents are
    /// cleared first, so the set always mirrors the latest announcement.
    pub fn add_filter_addresses(&self, addresses: &[Vec<u8>]) {
        {
            let mut state = self.state.write().expect("peer lock");
            if !state.filter_adds.is_empty() {
                state.filter_adds.clear();
            }
        }
        for address in addresses {
            self.add_filter_address(address);
        }
    }

    /// Raise the misbehavior score. Returns true when the peer crossed the
    /// ban threshold and should be disconnected.
    pub fn add_ban_score(&self, persistent: u64, transient: u64, reason: &str) -> bool {
        let score = self.ban_score.increase(persistent, transient);
        if score > DEFAULT_BAN_THRESHOLD {
            plotd_log::log_error!(
                "banning and disconnecting peer {}: score {score} ({reason})",
                self.base.addr()
            );
            return true;
        }

        let warn_threshold = DEFAULT_BAN_THRESHOLD >> 1;
        if score > warn_threshold {
            plotd_log::log_warn!(
                "ban score increasing for peer {}: score {score} ({reason})",
                self.base.addr()
            );
        }
        false
    }

    pub fn is_spv_node(&self) -> bool {
        !self.services.contains(SF_FULL_NODE)
    }

    /// Whether an SPV peer's filter matches this transaction: a spent
    /// outpoint hash or an output script it watches.
    pub fn is_related_tx(&self, tx: &Transaction) -> bool {
        let state = self.state.read().expect("peer lock");
        if state.filter_adds.is_empty() {
            return false;
        }
        for input in &tx.vin {
            if state.filter_adds.contains(&bytes_to_hex(&input.prevout.hash)) {
                return true;
            }
        }
        for output in &tx.vout {
            if state.filter_adds.contains(&bytes_to_hex(&output.pk_script)) {
                return true;
            }
        }
        false
    }

    pub(crate) fn try_send(&self, message: SyncMessage) -> bool {
        self.base.try_send(BLOCKCHAIN_CHANNEL, message)
    }

    pub fn send_block(&self, block: &Block) -> bool {
        let ok = self.try_send(SyncMessage::Block(Box::new(block.clone())));
        if ok {
            self.mark_block(&block.hash());
        }
        ok
    }

    pub fn send_blocks(&self, blocks: &[Block]) -> bool {
        if !self.try_send(SyncMessage::Blocks(blocks.to_vec())) {
            return false;
        }
        for block in blocks {
            self.mark_block(&block.hash());
        }
        true
    }

    pub fn send_headers(&self, headers: &[BlockHeader]) -> bool {
        self.try_send(SyncMessage::Headers(headers.to_vec()))
    }

    /// Send each transaction the peer has not seen yet. SPV peers only get
    /// transactions matching their filter. Stops at the first failed send.
    pub fn send_transactions(&self, txs: &[Transaction]) -> bool {
        for tx in txs {
            if self.is_spv_node() && !self.is_related_tx(tx) {
                continue;
            }
            let tx_hash = tx.txid();
            if self.knows_transaction(&tx_hash) {
                continue;
            }
            if !self.try_send(SyncMessage::Tx(Box::new(tx.clone()))) {
                return false;
            }
            self.mark_transaction(&tx_hash);
        }
        true
    }

    pub fn peer_info(&self) -> PeerInfo {
        let state = self.state.read().expect("peer lock");
        PeerInfo {
            id: self.base.id().to_string(),
            remote_addr: self.base.addr().to_string(),
            height: state.height,
            is_outbound: self.base.is_outbound(),
            delay: 0,
        }
    }
}

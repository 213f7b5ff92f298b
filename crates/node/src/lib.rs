//! Per-peer sync state and the peer-set coordinator for block and
//! transaction gossip.

use std::net::SocketAddr;

use plotd_consensus::ServiceFlag;

pub mod ban_score;
pub mod known;
pub mod message;
pub mod peer;
pub mod peer_set;

pub use ban_score::DynamicBanScore;
pub use known::KnownCache;
pub use message::SyncMessage;
pub use peer::{Peer, PeerInfo};
pub use peer_set::PeerSet;

/// Maximum transaction hashes kept per peer in the known list (DOS bound).
pub const MAX_KNOWN_TXS: usize = 32768;
/// Maximum block hashes kept per peer in the known list (DOS bound).
pub const MAX_KNOWN_BLOCKS: usize = 1024;
pub const DEFAULT_BAN_THRESHOLD: u64 = 100;
pub const MAX_FILTER_ADDRESS_COUNT: usize = 1000;
pub const MAX_FILTER_ADDRESS_SIZE: usize = 50;
/// Channel id the sync layer multiplexes its messages on.
pub const BLOCKCHAIN_CHANNEL: u8 = 0x40;

/// Connection-level peer handle owned by the transport. The sync layer only
/// borrows it; the socket stays with the transport.
pub trait BasePeer: Send + Sync {
    fn addr(&self) -> SocketAddr;
    fn id(&self) -> &str;
    fn service_flag(&self) -> ServiceFlag;
    /// Non-blocking enqueue. A `false` return means the peer cannot keep up
    /// or is gone.
    fn try_send(&self, channel: u8, message: SyncMessage) -> bool;
    fn is_outbound(&self) -> bool;
}

/// Connection-level peer manager owned by the transport.
pub trait BasePeerSet: Send + Sync {
    fn add_banned_peer(&self, addr: &str) -> Result<(), SyncError>;
    fn stop_peer_gracefully(&self, id: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The peer broke protocol rules; scored rather than dropped outright.
    PeerMisbehave(String),
    Transport(String),
}

impl SyncError {
    pub fn is_misbehave(&self) -> bool {
        matches!(self, SyncError::PeerMisbehave(_))
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::PeerMisbehave(reason) => write!(f, "peer misbehave: {reason}"),
            SyncError::Transport(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for SyncError {}

//! Messages the sync layer hands to the transport for delivery.

use plotd_consensus::Hash256;
use plotd_primitives::{Block, BlockHeader, Transaction};

#[derive(Clone, Debug, PartialEq)]
pub enum SyncMessage {
    Block(Box<Block>),
    Blocks(Vec<Block>),
    Headers(Vec<BlockHeader>),
    Tx(Box<Transaction>),
    Status {
        best: BlockHeader,
        genesis_hash: Hash256,
    },
}

impl SyncMessage {
    pub fn command(&self) -> &'static str {
        match self {
            SyncMessage::Block(_) => "block",
            SyncMessage::Blocks(_) => "blocks",
            SyncMessage::Headers(_) => "headers",
            SyncMessage::Tx(_) => "tx",
            SyncMessage::Status { .. } => "status",
        }
    }
}

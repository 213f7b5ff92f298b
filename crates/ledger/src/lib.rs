//! Volatile ledger of blocks and per-transaction spend state.

use plotd_consensus::Hash256;
use plotd_primitives::Transaction;

pub mod memory;

pub use memory::MemoryLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger was closed; no operation is valid anymore.
    Closed,
    /// The inserted block references a parent not in the ledger.
    MissingParent,
    /// A referenced transaction or outpoint is unknown or out of range.
    MissingTx,
    /// A duplicate transaction hash that is not yet fully spent.
    DuplicateTx,
    BlockNotFound,
    HeightOutOfRange,
    InvalidRange,
    /// Address-index operations are reserved for the persistent variant.
    NotImplemented,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Closed => write!(f, "ledger is closed"),
            LedgerError::MissingParent => write!(f, "previous block hash is unknown"),
            LedgerError::MissingTx => write!(f, "referenced transaction is unknown"),
            LedgerError::DuplicateTx => write!(f, "duplicate transaction hash"),
            LedgerError::BlockNotFound => write!(f, "block is not in the ledger"),
            LedgerError::HeightOutOfRange => write!(f, "height outside the valid range"),
            LedgerError::InvalidRange => write!(f, "invalid height range"),
            LedgerError::NotImplemented => write!(f, "operation not implemented"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// One stored version of a transaction, returned by the fetch operations.
/// The spent vector is a copy; mutating it does not touch ledger state.
#[derive(Clone, Debug, PartialEq)]
pub struct TxRecord {
    pub tx_hash: Hash256,
    pub tx: Transaction,
    pub block_hash: Hash256,
    pub height: i32,
    pub spent: Vec<bool>,
}

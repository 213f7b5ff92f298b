//! Core block/transaction types and consensus serialization.

pub mod address;
pub mod block;
pub mod encoding;
pub mod hash;
pub mod outpoint;
pub mod transaction;

pub use address::{decode_address, Address, AddressError};
pub use block::{Block, BlockHeader};
pub use hash::{hash160, sha256, sha256d};
pub use outpoint::OutPoint;
pub use transaction::{Transaction, TxIn, TxOut};

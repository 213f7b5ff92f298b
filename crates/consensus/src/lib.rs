//! Consensus constants, chain parameters, and shared hash type.

pub mod constants;
pub mod params;

pub use constants::{ServiceFlag, PROTOCOL_VERSION, SF_FULL_NODE};
pub use params::{chain_params, ChainParams, Network};

pub type Hash256 = [u8; 32];

pub const ZERO_HASH: Hash256 = [0u8; 32];

pub fn hash_to_hex(hash: &Hash256) -> String {
    bytes_to_hex(hash)
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

//! Block header and block types.

use plotd_consensus::Hash256;

use crate::encoding::{DecodeError, Decoder, Encoder};
use crate::hash::sha256d;
use crate::transaction::Transaction;

pub const CURRENT_VERSION: i32 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct BlockHeader {
    pub version: i32,
    pub height: u64,
    pub prev_block: Hash256,
    pub tx_root: Hash256,
    pub timestamp: u64,
    pub target: u64,
    /// Challenge the capacity prover answered for this slot.
    pub challenge: Hash256,
    pub proof: Vec<u8>,
    pub block_sig: Vec<u8>,
}

impl BlockHeader {
    pub fn consensus_encode(&self) -> Vec<u8> {
        self.encode_with_mode(true)
    }

    pub fn consensus_encode_for_hash(&self) -> Vec<u8> {
        self.encode_with_mode(false)
    }

    /// The block hash commits to everything except the block signature.
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.consensus_encode_for_hash())
    }

    fn encode_with_mode(&self, include_signature: bool) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.version);
        encoder.write_u64_le(self.height);
        encoder.write_hash(&self.prev_block);
        encoder.write_hash(&self.tx_root);
        encoder.write_u64_le(self.timestamp);
        encoder.write_u64_le(self.target);
        encoder.write_hash(&self.challenge);
        encoder.write_var_bytes(&self.proof);
        if include_signature {
            encoder.write_var_bytes(&self.block_sig);
        }
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let header = Self::consensus_decode_from(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(header)
    }

    pub fn consensus_decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_i32_le()?;
        let height = decoder.read_u64_le()?;
        let prev_block = decoder.read_hash()?;
        let tx_root = decoder.read_hash()?;
        let timestamp = decoder.read_u64_le()?;
        let target = decoder.read_u64_le()?;
        let challenge = decoder.read_hash()?;
        let proof = decoder.read_var_bytes()?;
        let block_sig = decoder.read_var_bytes()?;
        Ok(Self {
            version,
            height,
            prev_block,
            tx_root,
            timestamp,
            target,
            challenge,
            proof,
            block_sig,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_bytes(&self.header.consensus_encode());
        encoder.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            encoder.write_bytes(&tx.consensus_encode());
        }
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let header = BlockHeader::consensus_decode_from(&mut decoder)?;
        let count = decoder.read_varint()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::SizeTooLarge)?;
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            transactions.push(Transaction::decode_from(&mut decoder)?);
        }
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            header,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outpoint::OutPoint;
    use crate::transaction::{TxIn, TxOut};

    fn make_header(height: u64, prev_block: Hash256) -> BlockHeader {
        BlockHeader {
            version: CURRENT_VERSION,
            height,
            prev_block,
            tx_root: [0u8; 32],
            timestamp: 0,
            target: 0,
            challenge: [0u8; 32],
            proof: Vec::new(),
            block_sig: Vec::new(),
        }
    }

    #[test]
    fn header_hash_excludes_signature() {
        let mut header = make_header(5, [0x22; 32]);
        let hash = header.hash();
        header.block_sig = vec![0xde, 0xad];
        assert_eq!(header.hash(), hash);
    }

    #[test]
    fn block_round_trip() {
        let block = Block {
            header: make_header(1, [0x01; 32]),
            transactions: vec![Transaction {
                version: 1,
                vin: vec![TxIn {
                    prevout: OutPoint::null(),
                    witness: Vec::new(),
                    sequence: u32::MAX,
                }],
                vout: vec![TxOut {
                    value: 100,
                    pk_script: vec![0x6a],
                }],
                lock_time: 0,
                payload: Vec::new(),
            }],
        };
        let bytes = block.consensus_encode();
        assert_eq!(Block::consensus_decode(&bytes).expect("decode"), block);
    }
}

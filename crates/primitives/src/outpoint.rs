//! Transaction outpoint type.

use plotd_consensus::{Hash256, ZERO_HASH};

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn null() -> Self {
        Self {
            hash: ZERO_HASH,
            index: u32::MAX,
        }
    }

    /// The coinbase sentinel: zero hash plus maximum index.
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.hash == ZERO_HASH
    }
}

impl Encodable for OutPoint {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_hash(&self.hash);
        encoder.write_u32_le(self.index);
    }
}

impl Decodable for OutPoint {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let hash = decoder.read_hash()?;
        let index = decoder.read_u32_le()?;
        Ok(Self { hash, index })
    }
}

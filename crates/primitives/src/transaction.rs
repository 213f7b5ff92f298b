//! Transaction types and serialization.

use plotd_consensus::Hash256;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256d;
use crate::outpoint::OutPoint;

#[derive(Clone, Debug, PartialEq)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Witness stack. Slot 0 carries the signature payload; the last slot
    /// carries the redeem script.
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

impl TxIn {
    pub fn is_coinbase(&self) -> bool {
        self.prevout.is_null()
    }

    fn encode_with_mode(&self, encoder: &mut Encoder, include_witness: bool) {
        self.prevout.consensus_encode(encoder);
        if include_witness {
            encoder.write_varint(self.witness.len() as u64);
            for item in &self.witness {
                encoder.write_var_bytes(item);
            }
        }
        encoder.write_u32_le(self.sequence);
    }

    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let prevout = OutPoint::consensus_decode(decoder)?;
        let count = decoder.read_varint()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::SizeTooLarge)?;
        let mut witness = Vec::with_capacity(count);
        for _ in 0..count {
            witness.push(decoder.read_var_bytes()?);
        }
        let sequence = decoder.read_u32_le()?;
        Ok(Self {
            prevout,
            witness,
            sequence,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TxOut {
    pub value: i64,
    pub pk_script: Vec<u8>,
}

impl TxOut {
    fn encode_into(&self, encoder: &mut Encoder) {
        encoder.write_i64_le(self.value);
        encoder.write_var_bytes(&self.pk_script);
    }

    fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let value = decoder.read_i64_le()?;
        let pk_script = decoder.read_var_bytes()?;
        Ok(Self { value, pk_script })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub version: i32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u64,
    pub payload: Vec<u8>,
}

impl Transaction {
    /// A coinbase transaction has exactly one input referencing the null
    /// outpoint. This predicate is distinct from `TxIn::is_coinbase`; callers
    /// that walk inputs are expected to consult both.
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].is_coinbase()
    }

    pub fn consensus_encode(&self) -> Vec<u8> {
        self.encode_with_mode(true)
    }

    /// Witness-stripped encoding used for the transaction hash.
    pub fn consensus_encode_for_hash(&self) -> Vec<u8> {
        self.encode_with_mode(false)
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(&self.consensus_encode_for_hash())
    }

    fn encode_with_mode(&self, include_witness: bool) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.version);
        encoder.write_varint(self.vin.len() as u64);
        for input in &self.vin {
            input.encode_with_mode(&mut encoder, include_witness);
        }
        encoder.write_varint(self.vout.len() as u64);
        for output in &self.vout {
            output.encode_into(&mut encoder);
        }
        encoder.write_u64_le(self.lock_time);
        encoder.write_var_bytes(&self.payload);
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let tx = Self::decode_from(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(tx)
    }

    pub(crate) fn decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_i32_le()?;
        let vin_count = decoder.read_varint()?;
        let vin_count = usize::try_from(vin_count).map_err(|_| DecodeError::SizeTooLarge)?;
        let mut vin = Vec::with_capacity(vin_count);
        for _ in 0..vin_count {
            vin.push(TxIn::decode_from(decoder)?);
        }
        let vout_count = decoder.read_varint()?;
        let vout_count = usize::try_from(vout_count).map_err(|_| DecodeError::SizeTooLarge)?;
        let mut vout = Vec::with_capacity(vout_count);
        for _ in 0..vout_count {
            vout.push(TxOut::decode_from(decoder)?);
        }
        let lock_time = decoder.read_u64_le()?;
        let payload = decoder.read_var_bytes()?;
        Ok(Self {
            version,
            vin,
            vout,
            lock_time,
            payload,
        })
    }
}

//! Bech32 witness address encoding and decoding.

use bech32::{FromBase32, ToBase32, Variant};
use plotd_consensus::{bytes_to_hex, ChainParams};

pub const WITNESS_V0: u8 = 0;
/// Witness version used for locktime script-hash programs.
pub const WITNESS_V10: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    InvalidLength,
    InvalidCharacter,
    InvalidChecksum,
    UnknownPrefix,
    UnsupportedVersion,
    InvalidPubKey,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressError::InvalidLength => write!(f, "invalid payload length"),
            AddressError::InvalidCharacter => write!(f, "invalid character"),
            AddressError::InvalidChecksum => write!(f, "invalid checksum"),
            AddressError::UnknownPrefix => write!(f, "unknown address prefix"),
            AddressError::UnsupportedVersion => write!(f, "unsupported witness version"),
            AddressError::InvalidPubKey => write!(f, "invalid public key encoding"),
        }
    }
}

impl std::error::Error for AddressError {}

/// A decoded address. Witness addresses capture the network prefix at
/// construction so they can re-encode without chain parameters in hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// A witness program: version 0 commits to a 32-byte script hash,
    /// version 10 to a 20-byte locktime script hash.
    WitnessScriptHash {
        version: u8,
        program: Vec<u8>,
        hrp: &'static str,
    },
    /// A raw serialized public key, as embedded in multisig outputs.
    PubKey { pubkey: Vec<u8> },
}

impl Address {
    pub fn witness_script_hash(
        program: &[u8],
        version: u8,
        params: &ChainParams,
    ) -> Result<Self, AddressError> {
        let expected = match version {
            WITNESS_V0 => 32,
            WITNESS_V10 => 20,
            _ => return Err(AddressError::UnsupportedVersion),
        };
        if program.len() != expected {
            return Err(AddressError::InvalidLength);
        }
        Ok(Self::WitnessScriptHash {
            version,
            program: program.to_vec(),
            hrp: params.bech32_hrp,
        })
    }

    pub fn pub_key(pubkey: &[u8]) -> Result<Self, AddressError> {
        let valid = match pubkey.len() {
            33 => pubkey[0] == 0x02 || pubkey[0] == 0x03,
            65 => pubkey[0] == 0x04,
            _ => false,
        };
        if !valid {
            return Err(AddressError::InvalidPubKey);
        }
        Ok(Self::PubKey {
            pubkey: pubkey.to_vec(),
        })
    }

    pub fn witness_version(&self) -> Option<u8> {
        match self {
            Address::WitnessScriptHash { version, .. } => Some(*version),
            Address::PubKey { .. } => None,
        }
    }

    /// The raw bytes a script embeds for this address: the witness program,
    /// or the serialized public key.
    pub fn script_address(&self) -> &[u8] {
        match self {
            Address::WitnessScriptHash { program, .. } => program,
            Address::PubKey { pubkey } => pubkey,
        }
    }

    pub fn encode(&self) -> Result<String, AddressError> {
        match self {
            Address::WitnessScriptHash {
                version,
                program,
                hrp,
            } => {
                let v = bech32::u5::try_from_u8(*version)
                    .map_err(|_| AddressError::UnsupportedVersion)?;
                let mut data = vec![v];
                data.extend(program.to_base32());
                bech32::encode(hrp, data, Variant::Bech32)
                    .map_err(|_| AddressError::InvalidLength)
            }
            Address::PubKey { pubkey } => Ok(bytes_to_hex(pubkey)),
        }
    }
}

pub fn decode_address(encoded: &str, params: &ChainParams) -> Result<Address, AddressError> {
    let (hrp, data, variant) =
        bech32::decode(encoded).map_err(|_| AddressError::InvalidChecksum)?;
    if variant != Variant::Bech32 {
        return Err(AddressError::InvalidChecksum);
    }
    if hrp != params.bech32_hrp {
        return Err(AddressError::UnknownPrefix);
    }
    let Some((version, program)) = data.split_first() else {
        return Err(AddressError::InvalidLength);
    };
    let program =
        Vec::<u8>::from_base32(program).map_err(|_| AddressError::InvalidCharacter)?;
    Address::witness_script_hash(&program, version.to_u8(), params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotd_consensus::{chain_params, Network};

    #[test]
    fn witness_v0_round_trip() {
        let params = chain_params(Network::Testnet);
        let addr = Address::witness_script_hash(&[0x11; 32], WITNESS_V0, &params).expect("addr");
        let encoded = addr.encode().expect("encode");
        assert!(encoded.starts_with("tp1"));
        assert_eq!(decode_address(&encoded, &params).expect("decode"), addr);
    }

    #[test]
    fn witness_v10_round_trip() {
        let params = chain_params(Network::Mainnet);
        let addr = Address::witness_script_hash(&[0x42; 20], WITNESS_V10, &params).expect("addr");
        let encoded = addr.encode().expect("encode");
        assert_eq!(decode_address(&encoded, &params).expect("decode"), addr);
    }

    #[test]
    fn rejects_bad_program_length() {
        let params = chain_params(Network::Mainnet);
        assert_eq!(
            Address::witness_script_hash(&[0u8; 20], WITNESS_V0, &params),
            Err(AddressError::InvalidLength)
        );
        assert_eq!(
            Address::witness_script_hash(&[0u8; 32], WITNESS_V10, &params),
            Err(AddressError::InvalidLength)
        );
        assert_eq!(
            Address::witness_script_hash(&[0u8; 32], 7, &params),
            Err(AddressError::UnsupportedVersion)
        );
    }

    #[test]
    fn rejects_wrong_network() {
        let mainnet = chain_params(Network::Mainnet);
        let testnet = chain_params(Network::Testnet);
        let addr = Address::witness_script_hash(&[0x11; 32], WITNESS_V0, &mainnet).expect("addr");
        let encoded = addr.encode().expect("encode");
        assert_eq!(
            decode_address(&encoded, &testnet),
            Err(AddressError::UnknownPrefix)
        );
    }

    #[test]
    fn pubkey_address_is_hex() {
        let mut key = vec![0x02];
        key.extend_from_slice(&[0x5a; 32]);
        let addr = Address::pub_key(&key).expect("addr");
        assert_eq!(addr.encode().expect("encode"), bytes_to_hex(&key));
        assert!(Address::pub_key(&[0x01; 33]).is_err());
    }
}

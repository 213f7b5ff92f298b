//! Canonical script construction for the standard pay-to-* forms.

use plotd_primitives::address::{Address, WITNESS_V0, WITNESS_V10};

use crate::opcodes::{
    MAX_SCRIPT_ELEMENT_SIZE, OP_0, OP_1, OP_1NEGATE, OP_CHECKMULTISIG, OP_CHECKSEQUENCEVERIFY,
    OP_DROP, OP_EQUAL, OP_HASH160, OP_PUSHDATA1, OP_PUSHDATA2,
};
use crate::ScriptError;

/// Builds serialized scripts push by push. Errors are deferred: the first
/// failing operation poisons the builder and `script()` reports it.
#[derive(Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
    err: Option<ScriptError>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_op(mut self, opcode: u8) -> Self {
        if self.err.is_none() {
            self.script.push(opcode);
        }
        self
    }

    /// Appends `data` using the canonical minimal push encoding.
    pub fn add_data(mut self, data: &[u8]) -> Self {
        if self.err.is_some() {
            return self;
        }
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            self.err = Some(ScriptError::ElementTooLarge);
            return self;
        }

        if data.is_empty() {
            self.script.push(OP_0);
        } else if data.len() == 1 && (1..=16).contains(&data[0]) {
            self.script.push(OP_1 + data[0] - 1);
        } else if data.len() == 1 && data[0] == 0x81 {
            self.script.push(OP_1NEGATE);
        } else if data.len() <= 75 {
            self.script.push(data.len() as u8);
            self.script.extend_from_slice(data);
        } else if data.len() <= 255 {
            self.script.push(OP_PUSHDATA1);
            self.script.push(data.len() as u8);
            self.script.extend_from_slice(data);
        } else {
            self.script.push(OP_PUSHDATA2);
            self.script
                .extend_from_slice(&(data.len() as u16).to_le_bytes());
            self.script.extend_from_slice(data);
        }
        self
    }

    pub fn add_int64(self, value: i64) -> Self {
        if value == 0 {
            return self.add_op(OP_0);
        }
        if value == -1 {
            return self.add_op(OP_1NEGATE);
        }
        if (1..=16).contains(&value) {
            return self.add_op(OP_1 + (value - 1) as u8);
        }
        let bytes = script_num_bytes(value);
        self.add_data(&bytes)
    }

    pub fn script(self) -> Result<Vec<u8>, ScriptError> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.script),
        }
    }
}

fn script_num_bytes(value: i64) -> Vec<u8> {
    let mut abs = value.unsigned_abs();
    let mut result = Vec::new();
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if let Some(last) = result.last_mut() {
        if (*last & 0x80) != 0 {
            result.push(if value < 0 { 0x80 } else { 0 });
        } else if value < 0 {
            *last |= 0x80;
        }
    }
    result
}

/// OP_0 followed by the 32-byte version-0 witness program.
pub fn pay_to_witness_script_hash_script(script_hash: &[u8]) -> Result<Vec<u8>, ScriptError> {
    if script_hash.len() != 32 {
        return Err(ScriptError::InvalidProgramLength);
    }
    ScriptBuilder::new().add_op(OP_0).add_data(script_hash).script()
}

/// The version-10 locktime program: an 8-byte little-endian lock height,
/// a sequence check, then the 20-byte script-hash comparison.
pub fn pay_to_locktime_script_hash_script(
    script_hash: &[u8],
    locktime: &[u8; 8],
) -> Result<Vec<u8>, ScriptError> {
    if script_hash.len() != 20 {
        return Err(ScriptError::InvalidProgramLength);
    }
    ScriptBuilder::new()
        .add_data(locktime)
        .add_op(OP_CHECKSEQUENCEVERIFY)
        .add_op(OP_DROP)
        .add_op(OP_HASH160)
        .add_data(script_hash)
        .add_op(OP_EQUAL)
        .script()
}

/// Multisig redemption script: `n_required` of the given keys must sign.
pub fn multisig_script(pubkeys: &[Address], n_required: usize) -> Result<Vec<u8>, ScriptError> {
    if pubkeys.len() < n_required {
        return Err(ScriptError::BadNumRequired);
    }

    let mut builder = ScriptBuilder::new().add_int64(n_required as i64);
    for key in pubkeys {
        builder = builder.add_data(key.script_address());
    }
    builder
        .add_int64(pubkeys.len() as i64)
        .add_op(OP_CHECKMULTISIG)
        .script()
}

/// Pay to a version-0 witness address. Any other variant is unsupported.
pub fn pay_to_addr_script(addr: &Address) -> Result<Vec<u8>, ScriptError> {
    if let Address::WitnessScriptHash {
        version, program, ..
    } = addr
    {
        if *version == WITNESS_V0 {
            return pay_to_witness_script_hash_script(program);
        }
    }
    plotd_log::log_error!("invalid address or key for pay-to-address script");
    Err(ScriptError::UnsupportedAddress)
}

/// Pay to a witness address, producing the locktime form for version-10
/// programs with the supplied lock height encoded little-endian.
pub fn pay_to_lock_addr_script(addr: &Address, locktime: i64) -> Result<Vec<u8>, ScriptError> {
    if let Address::WitnessScriptHash {
        version, program, ..
    } = addr
    {
        match *version {
            WITNESS_V0 => return pay_to_witness_script_hash_script(program),
            WITNESS_V10 => {
                let buf = (locktime as u64).to_le_bytes();
                return pay_to_locktime_script_hash_script(program, &buf);
            }
            _ => {}
        }
    }
    plotd_log::log_error!("invalid address or key for pay-to-lock-address script");
    Err(ScriptError::UnsupportedAddress)
}

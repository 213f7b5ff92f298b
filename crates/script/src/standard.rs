//! Standard script classification and analysis.

use plotd_consensus::ChainParams;
use plotd_primitives::address::{Address, WITNESS_V0, WITNESS_V10};
use secp256k1::PublicKey;

use crate::opcodes::{
    as_small_int, is_small_int, parse_script, ParsedOpcode, MAX_DATA_CARRIER_SIZE, OP_0,
    OP_CHECKMULTISIG, OP_CHECKSEQUENCEVERIFY, OP_DROP, OP_EQUAL, OP_HASH160, OP_PUSHDATA4,
    OP_RETURN,
};
use crate::sigops::{locktime_sig_op_count, sig_op_count, witness_sig_op_count};
use crate::ScriptError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptClass {
    NonStandard,
    MultiSig,
    NullData,
    WitnessV0ScriptHash,
    LocktimeScriptHash,
}

impl ScriptClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptClass::NonStandard => "nonstandard",
            ScriptClass::MultiSig => "multisig",
            ScriptClass::NullData => "nulldata",
            ScriptClass::WitnessV0ScriptHash => "witness_v0_scripthash",
            ScriptClass::LocktimeScriptHash => "locktime_scripthash",
        }
    }
}

impl std::fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multisig shape: a small-int signature count, 33/65-byte key pushes, a
/// small-int key count matching the push count, then OP_CHECKMULTISIG.
fn is_multisig(pops: &[ParsedOpcode]) -> bool {
    // The absolute minimum is one pubkey:
    // OP_0/OP_1-16 <pubkey> OP_1 OP_CHECKMULTISIG
    let l = pops.len();
    if l < 4 {
        return false;
    }
    if !is_small_int(pops[0].opcode) {
        return false;
    }
    if !is_small_int(pops[l - 2].opcode) {
        return false;
    }
    if pops[l - 1].opcode != OP_CHECKMULTISIG {
        return false;
    }
    if l - 3 != as_small_int(pops[l - 2].opcode) {
        return false;
    }
    pops[1..l - 2]
        .iter()
        .all(|pop| pop.data_len() == 33 || pop.data_len() == 65)
}

/// Null-data shape: a bare OP_RETURN, or OP_RETURN followed by one push of
/// at most MAX_DATA_CARRIER_SIZE bytes.
fn is_null_data(pops: &[ParsedOpcode]) -> bool {
    let l = pops.len();
    if l == 1 && pops[0].opcode == OP_RETURN {
        return true;
    }
    l == 2
        && pops[0].opcode == OP_RETURN
        && pops[1].opcode <= OP_PUSHDATA4
        && pops[1].data_len() <= MAX_DATA_CARRIER_SIZE
}

fn is_witness_script_hash(pops: &[ParsedOpcode]) -> bool {
    pops.len() == 2 && pops[0].opcode == OP_0 && pops[1].data_len() == 32
}

fn is_locktime_script_hash(pops: &[ParsedOpcode]) -> bool {
    pops.len() == 6
        && pops[0].data_len() == 8
        && pops[1].opcode == OP_CHECKSEQUENCEVERIFY
        && pops[2].opcode == OP_DROP
        && pops[3].opcode == OP_HASH160
        && pops[4].data_len() == 20
        && pops[5].opcode == OP_EQUAL
}

fn type_of_script(pops: &[ParsedOpcode]) -> ScriptClass {
    if is_multisig(pops) {
        ScriptClass::MultiSig
    } else if is_null_data(pops) {
        ScriptClass::NullData
    } else if is_witness_script_hash(pops) {
        ScriptClass::WitnessV0ScriptHash
    } else if is_locktime_script_hash(pops) {
        ScriptClass::LocktimeScriptHash
    } else {
        ScriptClass::NonStandard
    }
}

/// Classify a serialized script. Scripts that fail to parse are
/// `NonStandard`.
pub fn script_class(script: &[u8]) -> ScriptClass {
    match parse_script(script) {
        Ok(pops) => type_of_script(&pops),
        Err(_) => ScriptClass::NonStandard,
    }
}

/// Number of stack arguments a script of the given class consumes, or -1
/// when it cannot be determined. Script-hash classes report one argument;
/// the revealed script's own requirement is the caller's concern.
fn expected_inputs(pops: &[ParsedOpcode], class: ScriptClass) -> i32 {
    match class {
        ScriptClass::WitnessV0ScriptHash | ScriptClass::LocktimeScriptHash => 1,
        ScriptClass::MultiSig => as_small_int(pops[0].opcode) as i32,
        _ => -1,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScriptInfo {
    pub pk_script_class: ScriptClass,
    /// Inputs the witness actually provides.
    pub num_inputs: i32,
    /// Inputs the pk-script (plus any revealed redeem script) requires;
    /// -1 when unknown.
    pub expected_inputs: i32,
    pub sig_ops: usize,
}

/// Analyze a pk-script together with the witness that spends it. Missing
/// witness slots are treated as empty scripts.
pub fn calc_script_info(
    pk_script: &[u8],
    witness: &[Vec<u8>],
) -> Result<ScriptInfo, ScriptError> {
    let pk_pops = parse_script(pk_script)?;
    let class = type_of_script(&pk_pops);
    let mut expected = expected_inputs(&pk_pops, class);

    let redeem = witness.last().map(Vec::as_slice).unwrap_or(&[]);
    let sig_payload = witness.first().map(Vec::as_slice).unwrap_or(&[]);
    let redeem_pops = parse_script(redeem).unwrap_or_default();
    let sig_pops = parse_script(sig_payload).unwrap_or_default();

    let (num_inputs, sig_ops) = match class {
        ScriptClass::WitnessV0ScriptHash => {
            let inner = expected_inputs(&redeem_pops, type_of_script(&redeem_pops));
            expected = if inner == -1 { -1 } else { expected + inner };
            (
                sig_pops.len() as i32 + 1,
                witness_sig_op_count(pk_script, witness),
            )
        }
        ScriptClass::LocktimeScriptHash => {
            let inner = expected_inputs(&redeem_pops, type_of_script(&redeem_pops));
            expected = if inner == -1 { -1 } else { expected + inner };
            (
                sig_pops.len() as i32 + 1,
                locktime_sig_op_count(pk_script, witness),
            )
        }
        _ => (
            (sig_pops.len() + redeem_pops.len()) as i32,
            sig_op_count(pk_script, true),
        ),
    };

    Ok(ScriptInfo {
        pk_script_class: class,
        num_inputs,
        expected_inputs: expected,
        sig_ops,
    })
}

/// Key and signature counts of a multisig script:
/// `(num_pubkeys, num_required)`.
pub fn calc_multisig_stats(script: &[u8]) -> Result<(usize, usize), ScriptError> {
    let pops = parse_script(script)?;

    // The required-signature count is the first item and the key count the
    // second-to-last; the smallest well-formed script is
    // OP_1 <pubkey> OP_1 OP_CHECKMULTISIG.
    if pops.len() < 4 {
        return Err(ScriptError::StackUnderflow);
    }

    let num_sigs = as_small_int(pops[0].opcode);
    let num_pubkeys = as_small_int(pops[pops.len() - 2].opcode);
    Ok((num_pubkeys, num_sigs))
}

/// Lock height and script hash embedded in a locktime-script-hash output.
pub fn extract_locktime_script_data(script: &[u8]) -> Result<(u64, [u8; 20]), ScriptError> {
    let pops = parse_script(script)?;
    if type_of_script(&pops) != ScriptClass::LocktimeScriptHash {
        plotd_log::log_error!("invalid script hash type for locktime extraction");
        return Err(ScriptError::InvalidScriptHashType);
    }

    let height_bytes = pops[0].data.as_deref().unwrap_or(&[]);
    let hash_bytes = pops[4].data.as_deref().unwrap_or(&[]);
    let mut height = [0u8; 8];
    height.copy_from_slice(height_bytes);
    let mut script_hash = [0u8; 20];
    script_hash.copy_from_slice(hash_bytes);
    Ok((u64::from_le_bytes(height), script_hash))
}

/// Class, embedded addresses, public keys, and required signature count of a
/// pk-script. Invalid public keys inside a multisig script are skipped.
pub fn extract_pk_script_addrs(
    pk_script: &[u8],
    params: &ChainParams,
) -> Result<(ScriptClass, Vec<Address>, Vec<PublicKey>, usize), ScriptError> {
    let pops = parse_script(pk_script)?;

    let mut addrs = Vec::new();
    let mut pubkeys = Vec::new();
    let mut required_sigs = 0;

    let class = type_of_script(&pops);
    match class {
        ScriptClass::WitnessV0ScriptHash => {
            // The witness program is the second item; skip it if invalid.
            required_sigs = 1;
            let program = pops[1].data.as_deref().unwrap_or(&[]);
            if let Ok(addr) = Address::witness_script_hash(program, WITNESS_V0, params) {
                addrs.push(addr);
            }
        }
        ScriptClass::LocktimeScriptHash => {
            required_sigs = 1;
            let program = pops[4].data.as_deref().unwrap_or(&[]);
            if let Ok(addr) = Address::witness_script_hash(program, WITNESS_V10, params) {
                addrs.push(addr);
            }
        }
        ScriptClass::MultiSig => {
            required_sigs = as_small_int(pops[0].opcode);
            let num_pubkeys = as_small_int(pops[pops.len() - 2].opcode);
            addrs.reserve(num_pubkeys);
            pubkeys.reserve(num_pubkeys);
            for pop in pops.iter().skip(1).take(num_pubkeys) {
                let bytes = pop.data.as_deref().unwrap_or(&[]);
                let Ok(pk) = PublicKey::from_slice(bytes) else {
                    continue;
                };
                let Ok(addr) = Address::pub_key(bytes) else {
                    continue;
                };
                addrs.push(addr);
                pubkeys.push(pk);
            }
        }
        ScriptClass::NullData | ScriptClass::NonStandard => {
            // No addresses or required signatures to extract.
        }
    }

    Ok((class, addrs, pubkeys, required_sigs))
}

//! Signature-operation counting.

use crate::opcodes::{
    as_small_int, parse_script_prefix, ParsedOpcode, MAX_PUBKEYS_PER_MULTISIG, OP_1, OP_16,
    OP_CHECKMULTISIG, OP_CHECKMULTISIGVERIFY, OP_CHECKSIG, OP_CHECKSIGVERIFY,
};
use crate::standard::{script_class, ScriptClass};

fn count_sig_ops(pops: &[ParsedOpcode], precise: bool) -> usize {
    let mut count = 0;
    for (i, pop) in pops.iter().enumerate() {
        match pop.opcode {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                // A preceding small-int push names the key count; without it
                // the worst case is charged.
                if precise
                    && i > 0
                    && (OP_1..=OP_16).contains(&pops[i - 1].opcode)
                {
                    count += as_small_int(pops[i - 1].opcode);
                } else {
                    count += MAX_PUBKEYS_PER_MULTISIG;
                }
            }
            _ => {}
        }
    }
    count
}

/// Static sig-op count over a serialized script. Counting runs over the
/// prefix that parses, so malformed tails do not hide earlier operations.
pub fn sig_op_count(script: &[u8], precise: bool) -> usize {
    count_sig_ops(&parse_script_prefix(script), precise)
}

fn redeem_script(witness: &[Vec<u8>]) -> &[u8] {
    witness.last().map(Vec::as_slice).unwrap_or(&[])
}

/// Sig-op count charged to a witness-v0-script-hash spend: the precise count
/// over the revealed redeem script.
pub fn witness_sig_op_count(pk_script: &[u8], witness: &[Vec<u8>]) -> usize {
    if script_class(pk_script) != ScriptClass::WitnessV0ScriptHash {
        return 0;
    }
    sig_op_count(redeem_script(witness), true)
}

/// Sig-op count charged to a locktime-script-hash spend.
pub fn locktime_sig_op_count(pk_script: &[u8], witness: &[Vec<u8>]) -> usize {
    if script_class(pk_script) != ScriptClass::LocktimeScriptHash {
        return 0;
    }
    sig_op_count(redeem_script(witness), true)
}

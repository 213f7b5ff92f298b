//! Opcode constants and byte-stream script parsing.

use crate::ScriptError;

pub const OP_0: u8 = 0x00;
pub const OP_DATA_1: u8 = 0x01;
pub const OP_DATA_75: u8 = 0x4b;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_16: u8 = 0x60;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;

pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
pub const MAX_DATA_CARRIER_SIZE: usize = 80;
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// One decoded opcode. `data` is present only for push opcodes; `OP_0` and
/// `OP_1`..`OP_16` carry no payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedOpcode {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}

impl ParsedOpcode {
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// True for the opcodes that push a small integer: OP_0 and OP_1..OP_16.
pub fn is_small_int(opcode: u8) -> bool {
    opcode == OP_0 || (OP_1..=OP_16).contains(&opcode)
}

/// Numeric value of a small-int opcode: OP_0 is 0, OP_N is N. The opcode
/// byte itself is never the value.
pub fn as_small_int(opcode: u8) -> usize {
    if opcode == OP_0 {
        return 0;
    }
    (opcode - OP_1 + 1) as usize
}

fn parse_script_template(script: &[u8]) -> (Vec<ParsedOpcode>, Option<ScriptError>) {
    let mut pops = Vec::new();
    let mut cursor = 0usize;
    while cursor < script.len() {
        let opcode = script[cursor];
        cursor += 1;
        let len = match opcode {
            OP_DATA_1..=OP_DATA_75 => opcode as usize,
            OP_PUSHDATA1 => {
                if script.len() - cursor < 1 {
                    return (pops, Some(ScriptError::MalformedPush));
                }
                let len = script[cursor] as usize;
                cursor += 1;
                len
            }
            OP_PUSHDATA2 => {
                if script.len() - cursor < 2 {
                    return (pops, Some(ScriptError::MalformedPush));
                }
                let len = u16::from_le_bytes([script[cursor], script[cursor + 1]]) as usize;
                cursor += 2;
                len
            }
            OP_PUSHDATA4 => {
                if script.len() - cursor < 4 {
                    return (pops, Some(ScriptError::MalformedPush));
                }
                let len = u32::from_le_bytes([
                    script[cursor],
                    script[cursor + 1],
                    script[cursor + 2],
                    script[cursor + 3],
                ]) as usize;
                cursor += 4;
                len
            }
            _ => {
                pops.push(ParsedOpcode { opcode, data: None });
                continue;
            }
        };

        if script.len() - cursor < len {
            return (pops, Some(ScriptError::MalformedPush));
        }
        pops.push(ParsedOpcode {
            opcode,
            data: Some(script[cursor..cursor + len].to_vec()),
        });
        cursor += len;
    }
    (pops, None)
}

/// Decode a byte script into its opcode sequence.
pub fn parse_script(script: &[u8]) -> Result<Vec<ParsedOpcode>, ScriptError> {
    match parse_script_template(script) {
        (pops, None) => Ok(pops),
        (_, Some(err)) => Err(err),
    }
}

/// The opcodes that parsed before any malformed push. Sig-op counting works
/// on this prefix so a trailing garbage push does not zero the count.
pub(crate) fn parse_script_prefix(script: &[u8]) -> Vec<ParsedOpcode> {
    parse_script_template(script).0
}

/// All pushed payloads in script order. OP_0 contributes an empty entry;
/// OP_1..OP_16 contribute nothing.
pub fn pushed_data(script: &[u8]) -> Result<Vec<Vec<u8>>, ScriptError> {
    let pops = parse_script(script)?;
    let mut data = Vec::new();
    for pop in pops {
        if let Some(payload) = pop.data {
            data.push(payload);
        } else if pop.opcode == OP_0 {
            data.push(Vec::new());
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_int_values() {
        assert!(is_small_int(OP_0));
        assert!(is_small_int(OP_1));
        assert!(is_small_int(OP_16));
        assert!(!is_small_int(OP_RETURN));
        assert_eq!(as_small_int(OP_0), 0);
        assert_eq!(as_small_int(OP_1), 1);
        assert_eq!(as_small_int(OP_16), 16);
    }

    #[test]
    fn parse_direct_push() {
        let pops = parse_script(&[0x02, 0xaa, 0xbb, OP_CHECKSIG]).expect("parse");
        assert_eq!(pops.len(), 2);
        assert_eq!(pops[0].data.as_deref(), Some(&[0xaa, 0xbb][..]));
        assert_eq!(pops[1].opcode, OP_CHECKSIG);
        assert_eq!(pops[1].data, None);
    }

    #[test]
    fn parse_pushdata_variants() {
        let mut script = vec![OP_PUSHDATA1, 3, 1, 2, 3];
        script.extend_from_slice(&[OP_PUSHDATA2, 2, 0, 9, 9]);
        let pops = parse_script(&script).expect("parse");
        assert_eq!(pops[0].data_len(), 3);
        assert_eq!(pops[1].data_len(), 2);
    }

    #[test]
    fn truncated_push_is_error() {
        assert_eq!(
            parse_script(&[0x05, 0x01]),
            Err(ScriptError::MalformedPush)
        );
        assert_eq!(parse_script(&[OP_PUSHDATA1]), Err(ScriptError::MalformedPush));
        assert_eq!(
            parse_script(&[OP_PUSHDATA4, 0xff, 0xff]),
            Err(ScriptError::MalformedPush)
        );
    }

    #[test]
    fn pushed_data_includes_op_0() {
        let data = pushed_data(&[OP_0, 0x01, 0x7f, OP_1]).expect("pushed data");
        assert_eq!(data, vec![Vec::new(), vec![0x7f]]);
    }
}

//! Standard transaction script classification, construction, and analysis.

pub mod builder;
pub mod opcodes;
pub mod sigops;
pub mod standard;

pub use builder::{
    multisig_script, pay_to_addr_script, pay_to_lock_addr_script,
    pay_to_locktime_script_hash_script, pay_to_witness_script_hash_script, ScriptBuilder,
};
pub use opcodes::{parse_script, pushed_data, ParsedOpcode};
pub use sigops::{locktime_sig_op_count, sig_op_count, witness_sig_op_count};
pub use standard::{
    calc_multisig_stats, calc_script_info, extract_locktime_script_data,
    extract_pk_script_addrs, script_class, ScriptClass, ScriptInfo,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A push opcode ran past the end of the script.
    MalformedPush,
    /// Fewer parsed opcodes than the operation requires.
    StackUnderflow,
    /// A pushed element exceeds the script element size limit.
    ElementTooLarge,
    /// A script-hash argument has the wrong length for its program.
    InvalidProgramLength,
    /// More signatures required than public keys supplied.
    BadNumRequired,
    /// The address variant cannot be paid to by a standard script.
    UnsupportedAddress,
    /// The script is not one of the script-hash shapes.
    InvalidScriptHashType,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::MalformedPush => write!(f, "push opcode exceeds script length"),
            ScriptError::StackUnderflow => write!(f, "script stack underflow"),
            ScriptError::ElementTooLarge => write!(f, "script element size over limit"),
            ScriptError::InvalidProgramLength => write!(f, "invalid witness program length"),
            ScriptError::BadNumRequired => {
                write!(f, "more signatures required than keys provided")
            }
            ScriptError::UnsupportedAddress => write!(f, "unsupported address variant"),
            ScriptError::InvalidScriptHashType => write!(f, "invalid script hash type"),
        }
    }
}

impl std::error::Error for ScriptError {}

//! The EVM dialect: builtin functions that map to a single opcode.

use crate::{FxHashMap, opcodes};
use stackgen_config::EvmVersion;

/// A builtin function of the EVM dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub opcode: u8,
    /// Number of arguments, i.e. stack items consumed.
    pub inputs: usize,
    /// Number of return values, i.e. stack items produced.
    pub outputs: usize,
}

/// The builtins available for one EVM version.
#[derive(Clone, Debug)]
pub struct EvmDialect {
    builtins: FxHashMap<&'static str, BuiltinFunction>,
}

impl EvmDialect {
    pub fn new(evm_version: EvmVersion) -> Self {
        let builtins = BUILTINS
            .iter()
            .filter(|(_, _, available)| available(evm_version))
            .filter_map(|&(name, opcode, _)| {
                let info = opcodes::info(opcode)?;
                Some((
                    name,
                    BuiltinFunction {
                        name,
                        opcode,
                        inputs: info.inputs as usize,
                        outputs: info.outputs as usize,
                    },
                ))
            })
            .collect();
        Self { builtins }
    }

    /// Looks up the builtin called `name`.
    pub fn builtin(&self, name: &str) -> Option<&BuiltinFunction> {
        self.builtins.get(name)
    }
}

type Available = fn(EvmVersion) -> bool;

const ALWAYS: Available = |_| true;

#[rustfmt::skip]
static BUILTINS: &[(&str, u8, Available)] = &[
    ("stop", opcodes::STOP, ALWAYS),
    ("add", opcodes::ADD, ALWAYS),
    ("mul", opcodes::MUL, ALWAYS),
    ("sub", opcodes::SUB, ALWAYS),
    ("div", opcodes::DIV, ALWAYS),
    ("sdiv", opcodes::SDIV, ALWAYS),
    ("mod", opcodes::MOD, ALWAYS),
    ("smod", opcodes::SMOD, ALWAYS),
    ("addmod", opcodes::ADDMOD, ALWAYS),
    ("mulmod", opcodes::MULMOD, ALWAYS),
    ("exp", opcodes::EXP, ALWAYS),
    ("signextend", opcodes::SIGNEXTEND, ALWAYS),
    ("lt", opcodes::LT, ALWAYS),
    ("gt", opcodes::GT, ALWAYS),
    ("slt", opcodes::SLT, ALWAYS),
    ("sgt", opcodes::SGT, ALWAYS),
    ("eq", opcodes::EQ, ALWAYS),
    ("iszero", opcodes::ISZERO, ALWAYS),
    ("and", opcodes::AND, ALWAYS),
    ("or", opcodes::OR, ALWAYS),
    ("xor", opcodes::XOR, ALWAYS),
    ("not", opcodes::NOT, ALWAYS),
    ("byte", opcodes::BYTE, ALWAYS),
    ("shl", opcodes::SHL, EvmVersion::has_bitwise_shifting),
    ("shr", opcodes::SHR, EvmVersion::has_bitwise_shifting),
    ("sar", opcodes::SAR, EvmVersion::has_bitwise_shifting),
    ("keccak256", opcodes::KECCAK256, ALWAYS),
    ("address", opcodes::ADDRESS, ALWAYS),
    ("balance", opcodes::BALANCE, ALWAYS),
    ("origin", opcodes::ORIGIN, ALWAYS),
    ("caller", opcodes::CALLER, ALWAYS),
    ("callvalue", opcodes::CALLVALUE, ALWAYS),
    ("calldataload", opcodes::CALLDATALOAD, ALWAYS),
    ("calldatasize", opcodes::CALLDATASIZE, ALWAYS),
    ("calldatacopy", opcodes::CALLDATACOPY, ALWAYS),
    ("codesize", opcodes::CODESIZE, ALWAYS),
    ("codecopy", opcodes::CODECOPY, ALWAYS),
    ("gasprice", opcodes::GASPRICE, ALWAYS),
    ("extcodesize", opcodes::EXTCODESIZE, ALWAYS),
    ("extcodecopy", opcodes::EXTCODECOPY, ALWAYS),
    ("returndatasize", opcodes::RETURNDATASIZE, EvmVersion::supports_returndata),
    ("returndatacopy", opcodes::RETURNDATACOPY, EvmVersion::supports_returndata),
    ("extcodehash", opcodes::EXTCODEHASH, EvmVersion::has_ext_code_hash),
    ("blockhash", opcodes::BLOCKHASH, ALWAYS),
    ("coinbase", opcodes::COINBASE, ALWAYS),
    ("timestamp", opcodes::TIMESTAMP, ALWAYS),
    ("number", opcodes::NUMBER, ALWAYS),
    ("difficulty", opcodes::PREVRANDAO, |v| !v.has_prev_randao()),
    ("prevrandao", opcodes::PREVRANDAO, EvmVersion::has_prev_randao),
    ("gaslimit", opcodes::GASLIMIT, ALWAYS),
    ("chainid", opcodes::CHAINID, EvmVersion::has_chain_id),
    ("selfbalance", opcodes::SELFBALANCE, EvmVersion::has_self_balance),
    ("basefee", opcodes::BASEFEE, EvmVersion::has_base_fee),
    ("blobhash", opcodes::BLOBHASH, EvmVersion::has_blob_hash),
    ("blobbasefee", opcodes::BLOBBASEFEE, EvmVersion::has_blob_base_fee),
    ("pop", opcodes::POP, ALWAYS),
    ("mload", opcodes::MLOAD, ALWAYS),
    ("mstore", opcodes::MSTORE, ALWAYS),
    ("mstore8", opcodes::MSTORE8, ALWAYS),
    ("sload", opcodes::SLOAD, ALWAYS),
    ("sstore", opcodes::SSTORE, ALWAYS),
    ("msize", opcodes::MSIZE, ALWAYS),
    ("gas", opcodes::GAS, ALWAYS),
    ("tload", opcodes::TLOAD, EvmVersion::has_transient_storage),
    ("tstore", opcodes::TSTORE, EvmVersion::has_transient_storage),
    ("mcopy", opcodes::MCOPY, EvmVersion::has_mcopy),
    ("log0", opcodes::LOG0, ALWAYS),
    ("log1", opcodes::LOG0 + 1, ALWAYS),
    ("log2", opcodes::LOG0 + 2, ALWAYS),
    ("log3", opcodes::LOG0 + 3, ALWAYS),
    ("log4", opcodes::LOG4, ALWAYS),
    ("create", opcodes::CREATE, ALWAYS),
    ("call", opcodes::CALL, ALWAYS),
    ("callcode", opcodes::CALLCODE, ALWAYS),
    ("return", opcodes::RETURN, ALWAYS),
    ("delegatecall", opcodes::DELEGATECALL, ALWAYS),
    ("create2", opcodes::CREATE2, EvmVersion::has_create2),
    ("staticcall", opcodes::STATICCALL, EvmVersion::has_static_call),
    ("revert", opcodes::REVERT, ALWAYS),
    ("invalid", opcodes::INVALID, ALWAYS),
    ("selfdestruct", opcodes::SELFDESTRUCT, ALWAYS),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_signatures() {
        let dialect = EvmDialect::new(EvmVersion::Istanbul);
        let mstore = dialect.builtin("mstore").unwrap();
        assert_eq!((mstore.opcode, mstore.inputs, mstore.outputs), (opcodes::MSTORE, 2, 0));
        let call = dialect.builtin("call").unwrap();
        assert_eq!((call.inputs, call.outputs), (7, 1));
        assert_eq!(dialect.builtin("log2").map(|b| b.inputs), Some(4));
        assert!(dialect.builtin("f").is_none());
    }

    #[test]
    fn version_gating() {
        let old = EvmDialect::new(EvmVersion::Homestead);
        assert!(old.builtin("shl").is_none());
        assert!(old.builtin("returndatasize").is_none());
        assert!(old.builtin("difficulty").is_some());
        assert!(old.builtin("prevrandao").is_none());

        let new = EvmDialect::new(EvmVersion::Cancun);
        assert!(new.builtin("shl").is_some());
        assert!(new.builtin("prevrandao").is_some());
        assert!(new.builtin("difficulty").is_none());
        assert!(new.builtin("tstore").is_some());
        assert!(EvmDialect::new(EvmVersion::Shanghai).builtin("mcopy").is_none());
    }
}

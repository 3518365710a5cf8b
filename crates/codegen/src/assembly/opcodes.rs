//! EVM opcodes and their stack signatures.

use alloy_primitives::U256;
use std::fmt::Write;

pub const STOP: u8 = 0x00;
pub const ADD: u8 = 0x01;
pub const MUL: u8 = 0x02;
pub const SUB: u8 = 0x03;
pub const DIV: u8 = 0x04;
pub const SDIV: u8 = 0x05;
pub const MOD: u8 = 0x06;
pub const SMOD: u8 = 0x07;
pub const ADDMOD: u8 = 0x08;
pub const MULMOD: u8 = 0x09;
pub const EXP: u8 = 0x0a;
pub const SIGNEXTEND: u8 = 0x0b;

pub const LT: u8 = 0x10;
pub const GT: u8 = 0x11;
pub const SLT: u8 = 0x12;
pub const SGT: u8 = 0x13;
pub const EQ: u8 = 0x14;
pub const ISZERO: u8 = 0x15;
pub const AND: u8 = 0x16;
pub const OR: u8 = 0x17;
pub const XOR: u8 = 0x18;
pub const NOT: u8 = 0x19;
pub const BYTE: u8 = 0x1a;
pub const SHL: u8 = 0x1b;
pub const SHR: u8 = 0x1c;
pub const SAR: u8 = 0x1d;

pub const KECCAK256: u8 = 0x20;

pub const ADDRESS: u8 = 0x30;
pub const BALANCE: u8 = 0x31;
pub const ORIGIN: u8 = 0x32;
pub const CALLER: u8 = 0x33;
pub const CALLVALUE: u8 = 0x34;
pub const CALLDATALOAD: u8 = 0x35;
pub const CALLDATASIZE: u8 = 0x36;
pub const CALLDATACOPY: u8 = 0x37;
pub const CODESIZE: u8 = 0x38;
pub const CODECOPY: u8 = 0x39;
pub const GASPRICE: u8 = 0x3a;
pub const EXTCODESIZE: u8 = 0x3b;
pub const EXTCODECOPY: u8 = 0x3c;
pub const RETURNDATASIZE: u8 = 0x3d;
pub const RETURNDATACOPY: u8 = 0x3e;
pub const EXTCODEHASH: u8 = 0x3f;

pub const BLOCKHASH: u8 = 0x40;
pub const COINBASE: u8 = 0x41;
pub const TIMESTAMP: u8 = 0x42;
pub const NUMBER: u8 = 0x43;
pub const PREVRANDAO: u8 = 0x44;
pub const GASLIMIT: u8 = 0x45;
pub const CHAINID: u8 = 0x46;
pub const SELFBALANCE: u8 = 0x47;
pub const BASEFEE: u8 = 0x48;
pub const BLOBHASH: u8 = 0x49;
pub const BLOBBASEFEE: u8 = 0x4a;

pub const POP: u8 = 0x50;
pub const MLOAD: u8 = 0x51;
pub const MSTORE: u8 = 0x52;
pub const MSTORE8: u8 = 0x53;
pub const SLOAD: u8 = 0x54;
pub const SSTORE: u8 = 0x55;
pub const JUMP: u8 = 0x56;
pub const JUMPI: u8 = 0x57;
pub const PC: u8 = 0x58;
pub const MSIZE: u8 = 0x59;
pub const GAS: u8 = 0x5a;
pub const JUMPDEST: u8 = 0x5b;
pub const TLOAD: u8 = 0x5c;
pub const TSTORE: u8 = 0x5d;
pub const MCOPY: u8 = 0x5e;
pub const PUSH0: u8 = 0x5f;
pub const PUSH1: u8 = 0x60;
pub const PUSH32: u8 = 0x7f;

pub const DUP1: u8 = 0x80;
pub const DUP16: u8 = 0x8f;
pub const SWAP1: u8 = 0x90;
pub const SWAP16: u8 = 0x9f;

pub const LOG0: u8 = 0xa0;
pub const LOG4: u8 = 0xa4;

pub const CREATE: u8 = 0xf0;
pub const CALL: u8 = 0xf1;
pub const CALLCODE: u8 = 0xf2;
pub const RETURN: u8 = 0xf3;
pub const DELEGATECALL: u8 = 0xf4;
pub const CREATE2: u8 = 0xf5;
pub const STATICCALL: u8 = 0xfa;
pub const REVERT: u8 = 0xfd;
pub const INVALID: u8 = 0xfe;
pub const SELFDESTRUCT: u8 = 0xff;

/// Returns the DUP opcode for the given depth (1-16).
#[must_use]
pub const fn dup(n: u8) -> u8 {
    debug_assert!(n >= 1 && n <= 16);
    DUP1 + n - 1
}

/// Returns the SWAP opcode for the given depth (1-16).
#[must_use]
pub const fn swap(n: u8) -> u8 {
    debug_assert!(n >= 1 && n <= 16);
    SWAP1 + n - 1
}

/// Returns the PUSH opcode for an immediate of `width` bytes (0-32).
#[must_use]
pub const fn push(width: u8) -> u8 {
    debug_assert!(width <= 32);
    PUSH0 + width
}

/// Static information about an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpInfo {
    pub name: &'static str,
    /// Number of stack items consumed.
    pub inputs: u8,
    /// Number of stack items produced.
    pub outputs: u8,
    /// Number of immediate bytes following the opcode.
    pub immediate: u8,
}

const fn op(name: &'static str, inputs: u8, outputs: u8) -> Option<OpInfo> {
    Some(OpInfo { name, inputs, outputs, immediate: 0 })
}

const PUSH_NAMES: [&str; 33] = [
    "PUSH0", "PUSH1", "PUSH2", "PUSH3", "PUSH4", "PUSH5", "PUSH6", "PUSH7", "PUSH8", "PUSH9",
    "PUSH10", "PUSH11", "PUSH12", "PUSH13", "PUSH14", "PUSH15", "PUSH16", "PUSH17", "PUSH18",
    "PUSH19", "PUSH20", "PUSH21", "PUSH22", "PUSH23", "PUSH24", "PUSH25", "PUSH26", "PUSH27",
    "PUSH28", "PUSH29", "PUSH30", "PUSH31", "PUSH32",
];
const DUP_NAMES: [&str; 16] = [
    "DUP1", "DUP2", "DUP3", "DUP4", "DUP5", "DUP6", "DUP7", "DUP8", "DUP9", "DUP10", "DUP11",
    "DUP12", "DUP13", "DUP14", "DUP15", "DUP16",
];
const SWAP_NAMES: [&str; 16] = [
    "SWAP1", "SWAP2", "SWAP3", "SWAP4", "SWAP5", "SWAP6", "SWAP7", "SWAP8", "SWAP9", "SWAP10",
    "SWAP11", "SWAP12", "SWAP13", "SWAP14", "SWAP15", "SWAP16",
];
const LOG_NAMES: [&str; 5] = ["LOG0", "LOG1", "LOG2", "LOG3", "LOG4"];

/// Returns the information for `opcode`, or `None` if it is not a defined instruction.
pub const fn info(opcode: u8) -> Option<OpInfo> {
    match opcode {
        STOP => op("STOP", 0, 0),
        ADD => op("ADD", 2, 1),
        MUL => op("MUL", 2, 1),
        SUB => op("SUB", 2, 1),
        DIV => op("DIV", 2, 1),
        SDIV => op("SDIV", 2, 1),
        MOD => op("MOD", 2, 1),
        SMOD => op("SMOD", 2, 1),
        ADDMOD => op("ADDMOD", 3, 1),
        MULMOD => op("MULMOD", 3, 1),
        EXP => op("EXP", 2, 1),
        SIGNEXTEND => op("SIGNEXTEND", 2, 1),
        LT => op("LT", 2, 1),
        GT => op("GT", 2, 1),
        SLT => op("SLT", 2, 1),
        SGT => op("SGT", 2, 1),
        EQ => op("EQ", 2, 1),
        ISZERO => op("ISZERO", 1, 1),
        AND => op("AND", 2, 1),
        OR => op("OR", 2, 1),
        XOR => op("XOR", 2, 1),
        NOT => op("NOT", 1, 1),
        BYTE => op("BYTE", 2, 1),
        SHL => op("SHL", 2, 1),
        SHR => op("SHR", 2, 1),
        SAR => op("SAR", 2, 1),
        KECCAK256 => op("KECCAK256", 2, 1),
        ADDRESS => op("ADDRESS", 0, 1),
        BALANCE => op("BALANCE", 1, 1),
        ORIGIN => op("ORIGIN", 0, 1),
        CALLER => op("CALLER", 0, 1),
        CALLVALUE => op("CALLVALUE", 0, 1),
        CALLDATALOAD => op("CALLDATALOAD", 1, 1),
        CALLDATASIZE => op("CALLDATASIZE", 0, 1),
        CALLDATACOPY => op("CALLDATACOPY", 3, 0),
        CODESIZE => op("CODESIZE", 0, 1),
        CODECOPY => op("CODECOPY", 3, 0),
        GASPRICE => op("GASPRICE", 0, 1),
        EXTCODESIZE => op("EXTCODESIZE", 1, 1),
        EXTCODECOPY => op("EXTCODECOPY", 4, 0),
        RETURNDATASIZE => op("RETURNDATASIZE", 0, 1),
        RETURNDATACOPY => op("RETURNDATACOPY", 3, 0),
        EXTCODEHASH => op("EXTCODEHASH", 1, 1),
        BLOCKHASH => op("BLOCKHASH", 1, 1),
        COINBASE => op("COINBASE", 0, 1),
        TIMESTAMP => op("TIMESTAMP", 0, 1),
        NUMBER => op("NUMBER", 0, 1),
        PREVRANDAO => op("PREVRANDAO", 0, 1),
        GASLIMIT => op("GASLIMIT", 0, 1),
        CHAINID => op("CHAINID", 0, 1),
        SELFBALANCE => op("SELFBALANCE", 0, 1),
        BASEFEE => op("BASEFEE", 0, 1),
        BLOBHASH => op("BLOBHASH", 1, 1),
        BLOBBASEFEE => op("BLOBBASEFEE", 0, 1),
        POP => op("POP", 1, 0),
        MLOAD => op("MLOAD", 1, 1),
        MSTORE => op("MSTORE", 2, 0),
        MSTORE8 => op("MSTORE8", 2, 0),
        SLOAD => op("SLOAD", 1, 1),
        SSTORE => op("SSTORE", 2, 0),
        JUMP => op("JUMP", 1, 0),
        JUMPI => op("JUMPI", 2, 0),
        PC => op("PC", 0, 1),
        MSIZE => op("MSIZE", 0, 1),
        GAS => op("GAS", 0, 1),
        JUMPDEST => op("JUMPDEST", 0, 0),
        TLOAD => op("TLOAD", 1, 1),
        TSTORE => op("TSTORE", 2, 0),
        MCOPY => op("MCOPY", 3, 0),
        PUSH0..=PUSH32 => {
            let width = opcode - PUSH0;
            let name = PUSH_NAMES[width as usize];
            Some(OpInfo { name, inputs: 0, outputs: 1, immediate: width })
        }
        DUP1..=DUP16 => {
            let n = opcode - DUP1;
            let name = DUP_NAMES[n as usize];
            Some(OpInfo { name, inputs: n + 1, outputs: n + 2, immediate: 0 })
        }
        SWAP1..=SWAP16 => {
            let n = opcode - SWAP1;
            let name = SWAP_NAMES[n as usize];
            Some(OpInfo { name, inputs: n + 2, outputs: n + 2, immediate: 0 })
        }
        LOG0..=LOG4 => {
            let n = opcode - LOG0;
            let name = LOG_NAMES[n as usize];
            Some(OpInfo { name, inputs: n + 2, outputs: 0, immediate: 0 })
        }
        CREATE => op("CREATE", 3, 1),
        CALL => op("CALL", 7, 1),
        CALLCODE => op("CALLCODE", 7, 1),
        RETURN => op("RETURN", 2, 0),
        DELEGATECALL => op("DELEGATECALL", 6, 1),
        CREATE2 => op("CREATE2", 4, 1),
        STATICCALL => op("STATICCALL", 6, 1),
        REVERT => op("REVERT", 2, 0),
        INVALID => op("INVALID", 0, 0),
        SELFDESTRUCT => op("SELFDESTRUCT", 1, 0),
        _ => None,
    }
}

/// Renders `bytecode` as a space separated instruction listing: `PUSH1 0x1 POP `.
///
/// Immediates are printed in uppercase hex without leading zeros. Bytes that are not defined
/// instructions are printed as `INVALID`.
pub fn disassemble(bytecode: &[u8]) -> String {
    let mut out = String::new();
    let mut pc = 0;
    while pc < bytecode.len() {
        let opcode = bytecode[pc];
        pc += 1;
        let Some(info) = info(opcode) else {
            out.push_str("INVALID ");
            continue;
        };
        out.push_str(info.name);
        if info.immediate > 0 {
            let end = (pc + info.immediate as usize).min(bytecode.len());
            let value = U256::from_be_slice(&bytecode[pc..end]);
            let _ = write!(out, " 0x{value:X}");
            pc = end;
        }
        out.push(' ');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(info(ADD).map(|i| (i.inputs, i.outputs)), Some((2, 1)));
        assert_eq!(info(dup(3)).map(|i| i.name), Some("DUP3"));
        assert_eq!(info(swap(16)).map(|i| i.name), Some("SWAP16"));
        assert_eq!(info(push(2)).map(|i| i.immediate), Some(2));
        assert_eq!(info(0x0c), None);
    }

    #[test]
    fn disassembly() {
        assert_eq!(disassemble(&[]), "");
        assert_eq!(disassemble(&[0x60, 0x00, 0x50]), "PUSH1 0x0 POP ");
        assert_eq!(
            disassemble(&[0x60, 0x0a, 0x57, 0x61, 0x01, 0x00, 0x5b, 0x5f, 0x90]),
            "PUSH1 0xA JUMPI PUSH2 0x100 JUMPDEST PUSH0 SWAP1 "
        );
        assert_eq!(disassemble(&[0x0c, 0xfe]), "INVALID INVALID ");
        // Truncated immediate.
        assert_eq!(disassemble(&[0x61, 0x12]), "PUSH2 0x12 ");
    }
}

//! Two-pass assembler with label resolution.
//!
//! The assembler handles:
//! - Label definition and reference tracking
//! - Iterative sizing of label pushes based on the resolved offsets
//! - `PUSH0` for zero constants when the EVM version supports it

use super::{AbstractAssembly, Label, opcodes};
use alloy_primitives::U256;
use rustc_hash::FxHashMap;
use stackgen_config::EvmVersion;
use stackgen_ir::Span;
use std::fmt;

/// An instruction in the assembler.
#[derive(Clone, Debug, PartialEq, Eq)]
enum AsmInst {
    /// A raw opcode with no operands.
    Op(u8),
    /// Push an immediate value (will be sized appropriately).
    Push(U256),
    /// Push a label reference (will be resolved to offset).
    PushLabel(Label),
    /// A `JUMPDEST` that defines a label.
    Label(Label),
}

/// Assembly failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("label {0} is referenced but never placed")]
    UnresolvedLabel(Label),
    #[error("label {0} is placed more than once")]
    DuplicateLabel(Label),
    #[error("code generation failed, refusing to assemble invalid code")]
    Invalid,
}

/// Result of assembly.
#[derive(Debug)]
pub struct AssembledCode {
    /// The final bytecode.
    pub bytecode: Vec<u8>,
    /// Map from label to the offset of its `JUMPDEST`.
    pub label_offsets: FxHashMap<Label, usize>,
    /// The source location of each instruction, keyed by bytecode offset.
    pub source_map: Vec<(usize, Span)>,
}

/// Two-pass assembler for EVM bytecode.
#[derive(Debug)]
pub struct Assembler {
    /// Instructions to assemble.
    instructions: Vec<AsmInst>,
    /// The source location of each instruction.
    locations: Vec<Span>,
    /// Next label ID.
    next_label: u32,
    current_location: Span,
    has_push0: bool,
    invalid: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(EvmVersion::default())
    }
}

impl Assembler {
    /// Creates a new assembler targeting `evm_version`.
    #[must_use]
    pub fn new(evm_version: EvmVersion) -> Self {
        Self {
            instructions: Vec::new(),
            locations: Vec::new(),
            next_label: 0,
            current_location: Span::DUMMY,
            has_push0: evm_version.has_push0(),
            invalid: false,
        }
    }

    /// Returns `true` if [`mark_invalid`](AbstractAssembly::mark_invalid) was called.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    fn push_inst(&mut self, inst: AsmInst) {
        self.instructions.push(inst);
        self.locations.push(self.current_location);
    }

    /// Assembles the instructions into bytecode.
    ///
    /// Label pushes start out one byte wide and are widened until every resolved offset fits.
    /// Widths only ever grow, so this terminates.
    pub fn assemble(&self) -> Result<AssembledCode, AssembleError> {
        if self.invalid {
            return Err(AssembleError::Invalid);
        }

        let mut push_widths: FxHashMap<usize, u8> = self
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| matches!(inst, AsmInst::PushLabel(_)))
            .map(|(idx, _)| (idx, 1))
            .collect();

        loop {
            let label_offsets = self.compute_offsets(&push_widths)?;

            let mut changed = false;
            for (idx, inst) in self.instructions.iter().enumerate() {
                let AsmInst::PushLabel(label) = inst else { continue };
                let offset = label_offsets
                    .get(label)
                    .copied()
                    .ok_or(AssembleError::UnresolvedLabel(*label))?;
                let needed = push_width(U256::from(offset)).max(1);
                let width = push_widths.entry(idx).or_insert(1);
                if needed > *width {
                    *width = needed;
                    changed = true;
                }
            }

            if !changed {
                return Ok(self.emit_bytecode(label_offsets, &push_widths));
            }
        }
    }

    /// Computes label offsets given current PUSH widths.
    fn compute_offsets(
        &self,
        push_widths: &FxHashMap<usize, u8>,
    ) -> Result<FxHashMap<Label, usize>, AssembleError> {
        let mut offset = 0usize;
        let mut label_offsets = FxHashMap::default();

        for (idx, inst) in self.instructions.iter().enumerate() {
            match inst {
                AsmInst::Op(_) => offset += 1,
                AsmInst::Push(value) => offset += 1 + self.value_width(*value) as usize,
                AsmInst::PushLabel(_) => {
                    offset += 1 + push_widths.get(&idx).copied().unwrap_or(1) as usize;
                }
                AsmInst::Label(label) => {
                    if label_offsets.insert(*label, offset).is_some() {
                        return Err(AssembleError::DuplicateLabel(*label));
                    }
                    offset += 1;
                }
            }
        }

        Ok(label_offsets)
    }

    /// Emits the final bytecode.
    fn emit_bytecode(
        &self,
        label_offsets: FxHashMap<Label, usize>,
        push_widths: &FxHashMap<usize, u8>,
    ) -> AssembledCode {
        let mut bytecode = Vec::new();
        let mut source_map = Vec::with_capacity(self.instructions.len());

        for (idx, inst) in self.instructions.iter().enumerate() {
            source_map.push((bytecode.len(), self.locations[idx]));
            match inst {
                AsmInst::Op(opcode) => bytecode.push(*opcode),
                AsmInst::Push(value) => {
                    emit_push_fixed_width(&mut bytecode, *value, self.value_width(*value));
                }
                AsmInst::PushLabel(label) => {
                    let target_offset = label_offsets.get(label).copied().unwrap_or_default();
                    let width = push_widths.get(&idx).copied().unwrap_or(1);
                    emit_push_fixed_width(&mut bytecode, U256::from(target_offset), width);
                }
                AsmInst::Label(_) => bytecode.push(opcodes::JUMPDEST),
            }
        }

        AssembledCode { bytecode, label_offsets, source_map }
    }

    /// Returns the immediate width used to push `value`.
    fn value_width(&self, value: U256) -> u8 {
        let width = push_width(value);
        if width == 0 && !self.has_push0 { 1 } else { width }
    }
}

impl AbstractAssembly for Assembler {
    fn set_source_location(&mut self, span: Span) {
        self.current_location = span;
    }

    /// Heights are not needed to lay out the code.
    fn set_stack_height_hint(&mut self, _height: usize) {}

    fn append_constant(&mut self, value: U256) {
        self.push_inst(AsmInst::Push(value));
    }

    fn append_operation(&mut self, opcode: u8) {
        self.push_inst(AsmInst::Op(opcode));
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn append_label(&mut self, label: Label) {
        self.push_inst(AsmInst::Label(label));
    }

    fn append_label_reference(&mut self, label: Label) {
        self.push_inst(AsmInst::PushLabel(label));
    }

    fn mark_invalid(&mut self) {
        self.invalid = true;
    }
}

/// Textual listing, one instruction per line.
impl fmt::Display for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.instructions {
            match inst {
                AsmInst::Op(opcode) => match opcodes::info(*opcode) {
                    Some(info) => writeln!(f, "  {}", info.name)?,
                    None => writeln!(f, "  0x{opcode:02x}")?,
                },
                AsmInst::Push(value) => writeln!(f, "  PUSH 0x{value:x}")?,
                AsmInst::PushLabel(label) => writeln!(f, "  PUSH [{label}]")?,
                AsmInst::Label(label) => writeln!(f, "{label}:")?,
            }
        }
        Ok(())
    }
}

/// Returns the number of bytes needed to push a value.
fn push_width(value: U256) -> u8 {
    value.byte_len() as u8
}

/// Emits a PUSH instruction with a specific width.
fn emit_push_fixed_width(bytecode: &mut Vec<u8>, value: U256, width: u8) {
    bytecode.push(opcodes::push(width));

    let bytes = value.to_be_bytes::<32>();
    let start = 32 - width as usize;
    bytecode.extend_from_slice(&bytes[start..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_width() {
        assert_eq!(push_width(U256::ZERO), 0);
        assert_eq!(push_width(U256::from(1)), 1);
        assert_eq!(push_width(U256::from(255)), 1);
        assert_eq!(push_width(U256::from(256)), 2);
        assert_eq!(push_width(U256::from(0xFFFF)), 2);
        assert_eq!(push_width(U256::from(0x10000)), 3);
        assert_eq!(push_width(U256::MAX), 32);
    }

    #[test]
    fn test_simple_assembly() {
        let mut asm = Assembler::new(EvmVersion::Cancun);

        asm.append_constant(U256::from(42));
        asm.append_constant(U256::from(10));
        asm.append_operation(opcodes::ADD);
        asm.append_constant(U256::ZERO);
        asm.append_operation(opcodes::STOP);

        let result = asm.assemble().unwrap();

        // PUSH1 42, PUSH1 10, ADD, PUSH0, STOP
        assert_eq!(result.bytecode, vec![0x60, 42, 0x60, 10, 0x01, 0x5f, 0x00]);
    }

    #[test]
    fn test_zero_without_push0() {
        let mut asm = Assembler::new(EvmVersion::Istanbul);
        asm.append_constant(U256::ZERO);
        asm.append_discard();
        assert_eq!(asm.assemble().unwrap().bytecode, vec![0x60, 0x00, 0x50]);
    }

    #[test]
    fn test_label_resolution() {
        let mut asm = Assembler::new(EvmVersion::Cancun);

        let loop_label = asm.new_label();
        let end_label = asm.new_label();

        asm.append_label(loop_label);
        asm.append_constant(U256::from(1));
        asm.append_conditional_jump_to(end_label);
        asm.append_jump_to(loop_label);

        asm.append_label(end_label);
        asm.append_operation(opcodes::STOP);

        let result = asm.assemble().unwrap();

        // Loop label at 0, end label after: JUMPDEST(1) + PUSH1 1(2) + PUSH1 end(2) + JUMPI(1)
        // + PUSH1 loop(2) + JUMP(1) = 9
        assert_eq!(result.label_offsets[&loop_label], 0);
        assert_eq!(result.label_offsets[&end_label], 9);
        assert_eq!(
            result.bytecode,
            vec![0x5b, 0x60, 1, 0x60, 9, 0x57, 0x60, 0, 0x56, 0x5b, 0x00]
        );
    }

    #[test]
    fn test_wide_label() {
        let mut asm = Assembler::new(EvmVersion::Cancun);
        let end = asm.new_label();
        asm.append_jump_to(end);
        for _ in 0..300 {
            asm.append_operation(opcodes::CALLVALUE);
        }
        asm.append_label(end);

        let result = asm.assemble().unwrap();
        // PUSH2 + JUMP + 300 ops.
        assert_eq!(result.label_offsets[&end], 3 + 1 + 300);
        assert_eq!(&result.bytecode[..3], &[0x61, 0x01, 0x30]);
    }

    #[test]
    fn test_errors() {
        let mut asm = Assembler::default();
        let label = asm.new_label();
        asm.append_jump_to(label);
        assert_eq!(asm.assemble().unwrap_err(), AssembleError::UnresolvedLabel(label));

        asm.append_label(label);
        asm.append_label(label);
        assert_eq!(asm.assemble().unwrap_err(), AssembleError::DuplicateLabel(label));

        let mut asm = Assembler::default();
        asm.mark_invalid();
        assert!(asm.is_invalid());
        assert_eq!(asm.assemble().unwrap_err(), AssembleError::Invalid);
    }

    #[test]
    fn test_listing_and_source_map() {
        let mut asm = Assembler::default();
        let label = asm.new_label();
        asm.set_source_location(Span::new(3, 7));
        asm.append_constant(U256::from(0x2a));
        asm.append_label(label);
        asm.append_swap(1);
        asm.append_label_reference(label);

        assert_eq!(asm.to_string(), "  PUSH 0x2a\ntag_0:\n  SWAP1\n  PUSH [tag_0]\n");

        let code = asm.assemble().unwrap();
        assert_eq!(code.source_map[0], (0, Span::new(3, 7)));
        assert_eq!(code.source_map[1], (2, Span::new(3, 7)));
        assert_eq!(code.source_map.len(), 4);
    }
}

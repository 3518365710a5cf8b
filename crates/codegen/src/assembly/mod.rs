//! The instruction sink of the code transform.

use alloy_primitives::U256;
use stackgen_ir::Span;
use std::fmt;

mod assembler;
pub use assembler::{AssembleError, AssembledCode, Assembler};

pub mod opcodes;
pub use opcodes::disassemble;

/// A jump target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag_{}", self.0)
    }
}

/// Receives the instructions produced by the code transform.
///
/// The transform never inspects what the sink does with them; it only relies on every call being
/// recorded in order. Stack shuffles and jumps have default implementations in terms of
/// [`append_operation`](Self::append_operation) and
/// [`append_label_reference`](Self::append_label_reference).
pub trait AbstractAssembly {
    /// Sets the source location attached to the instructions appended from now on.
    fn set_source_location(&mut self, span: Span);

    /// Informs the sink about the stack height at the current position.
    ///
    /// Called after unconditional jumps and at jump destinations, where the height cannot be
    /// derived from the preceding instructions.
    fn set_stack_height_hint(&mut self, height: usize);

    /// Appends a push of `value`.
    fn append_constant(&mut self, value: U256);

    /// Appends a plain opcode.
    fn append_operation(&mut self, opcode: u8);

    /// Creates a new label that can be referenced before it is placed.
    fn new_label(&mut self) -> Label;

    /// Places `label` at the current position. The position is a valid jump destination.
    fn append_label(&mut self, label: Label);

    /// Appends a push of the position of `label`.
    fn append_label_reference(&mut self, label: Label);

    /// Appends an unconditional jump to the address on top of the stack.
    fn append_jump(&mut self) {
        self.append_operation(opcodes::JUMP);
    }

    /// Appends a conditional jump to the address on top of the stack.
    fn append_conditional_jump(&mut self) {
        self.append_operation(opcodes::JUMPI);
    }

    fn append_jump_to(&mut self, label: Label) {
        self.append_label_reference(label);
        self.append_jump();
    }

    fn append_conditional_jump_to(&mut self, label: Label) {
        self.append_label_reference(label);
        self.append_conditional_jump();
    }

    /// Appends `DUP{depth}`.
    fn append_duplicate(&mut self, depth: u8) {
        self.append_operation(opcodes::dup(depth));
    }

    /// Appends `SWAP{depth}`.
    fn append_swap(&mut self, depth: u8) {
        self.append_operation(opcodes::swap(depth));
    }

    /// Appends a `POP`.
    fn append_discard(&mut self) {
        self.append_operation(opcodes::POP);
    }

    /// Marks the generated code as unusable, e.g. after a function was abandoned.
    fn mark_invalid(&mut self) {}
}

//! Stack bookkeeping for code generation.
//!
//! The code transform mirrors every instruction it emits on a [`StackLayout`], so it always knows
//! which variable lives in which slot. At control-flow junctions the layouts of all incoming edges
//! are brought into agreement by [`reconcile`].
//!
//! ## Submodules
//!
//! - `layout`: the slot model and its primitive operations
//! - `shuffler`: swap/discard planning between two layouts

mod layout;
pub use layout::{LayoutError, Slot, StackLayout};

mod shuffler;
pub use shuffler::{ShuffleError, ShuffleResult, reconcile};

/// Maximum stack depth accessible via DUP/SWAP (DUP16, SWAP16).
pub const MAX_STACK_ACCESS: usize = 16;

/// Operations to emit for stack manipulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackOp {
    /// DUP1-DUP16: Duplicate the nth stack element.
    Dup(u8),
    /// SWAP1-SWAP16: Swap top with the nth stack element below it.
    Swap(u8),
    /// POP: Remove top of stack.
    Pop,
}

impl StackOp {
    /// Returns the opcode byte for this operation.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Dup(n) => crate::opcodes::dup(n),
            Self::Swap(n) => crate::opcodes::swap(n),
            Self::Pop => crate::opcodes::POP,
        }
    }
}

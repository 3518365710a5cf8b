//! Stack-reusing EVM code generation for block-structured Yul IR.
//!
//! [`CodeGenerator::assemble`] walks an analyzed [`Block`](stackgen_ir::Block) once, depth-first,
//! and emits EVM instructions into an [`AbstractAssembly`] sink. While doing so it keeps an exact
//! model of the operand stack, retires variables as soon as they have no further use and reuses
//! their slots for later declarations.
//!
//! ```ignore
//! let mut asm = Assembler::new(opts.evm_version);
//! CodeGenerator::assemble(&block, &mut asm, &opts)?;
//! let code = asm.assemble()?;
//! println!("{}", disassemble(&code.bytecode));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub use rustc_hash::{FxHashMap, FxHashSet};
pub use stackgen_config as config;
pub use stackgen_ir as ir;

pub mod analysis;
pub use analysis::{Liveness, ScopeTree};

pub mod assembly;
pub use assembly::{
    AbstractAssembly, AssembleError, AssembledCode, Assembler, Label, disassemble, opcodes,
};

pub mod dialect;
pub use dialect::{BuiltinFunction, EvmDialect};

mod error;
pub use error::{CodegenError, InternalError, StackTooDeep};

pub mod stack;
pub use stack::{MAX_STACK_ACCESS, ShuffleResult, Slot, StackLayout, StackOp};

pub mod transform;
pub use transform::CodeGenerator;

pub(crate) type FxIndexMap<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;

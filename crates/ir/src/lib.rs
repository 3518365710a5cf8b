//! The input of the stack code generator: an analyzed, block-structured Yul IR.
//!
//! Every [`Block`] carries a [`BlockId`] that is unique within a program; the code generator keys
//! its scopes by it. Statements and expressions carry [`Span`]s for diagnostics.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

mod span;
pub use span::{Ident, Span};

mod lit;
pub use lit::{Lit, LitKind};

mod ir;
pub use ir::*;

pub mod visit;
pub use visit::Visit;

pub use alloy_primitives::U256;

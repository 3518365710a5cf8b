//! Static analyses the code transform relies on.

pub mod liveness;
pub use liveness::Liveness;

pub mod scope;
pub use scope::{
    Declaration, FrameKind, FunctionId, FunctionInfo, Scope, ScopeFrame, ScopeId, ScopeKind,
    ScopeStack, ScopeTree, VarId, Variable,
};

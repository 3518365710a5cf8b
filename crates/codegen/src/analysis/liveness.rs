//! Remaining-use counts of variables.
//!
//! Code generation visits the program once, in textual order. If every syntactic reference to a
//! variable (reads and assignment targets) is counted up front and the count is decremented when
//! the transform visits the reference, then "no references left" means the current value has no
//! further use on any path: references in either arm of a conditional or anywhere inside a loop
//! are visited before the code after the construct. Return variables get one extra reference that
//! is never consumed, so they stay alive until the function exit.
//!
//! Inside a loop a variable of an enclosing scope can run out of references before the loop ends;
//! the transform only retires variables at statement boundaries of their own scope, which keeps
//! such a variable alive until the whole loop statement is done.

use super::{ScopeId, ScopeTree, VarId};
use crate::InternalError;
use index_vec::IndexVec;
use stackgen_ir::{Block, Function, Ident, StmtFor, Visit, visit::walk_block};
use std::ops::ControlFlow;

/// Remaining references per variable.
#[derive(Clone, Debug)]
pub struct Liveness {
    remaining: IndexVec<VarId, u32>,
}

impl Liveness {
    /// Counts the references of every variable of the program rooted at `block`.
    #[instrument(name = "reference_counter", level = "debug", skip_all)]
    pub fn compute(block: &Block, tree: &ScopeTree) -> Result<Self, InternalError> {
        let mut counter = ReferenceCounter {
            tree,
            scope: None,
            remaining: IndexVec::from_vec(vec![0; tree.num_variables()]),
        };
        match counter.visit_block(block) {
            ControlFlow::Continue(()) => Ok(Self { remaining: counter.remaining }),
            ControlFlow::Break(err) => Err(err),
        }
    }

    /// Returns `true` if `var` is referenced again after the current point.
    pub fn has_future_use(&self, var: VarId) -> bool {
        self.remaining[var] > 0
    }

    pub fn remaining_uses(&self, var: VarId) -> u32 {
        self.remaining[var]
    }

    /// Records that one reference of `var` has been generated.
    ///
    /// Returns `false` if all references were already consumed.
    pub fn consume(&mut self, var: VarId) -> bool {
        match self.remaining[var].checked_sub(1) {
            Some(n) => {
                self.remaining[var] = n;
                true
            }
            None => false,
        }
    }
}

struct ReferenceCounter<'a> {
    tree: &'a ScopeTree,
    scope: Option<ScopeId>,
    remaining: IndexVec<VarId, u32>,
}

impl ReferenceCounter<'_> {
    fn enter(&mut self, block: &Block) -> Result<Option<ScopeId>, InternalError> {
        let scope = self
            .tree
            .block_scope(block.id)
            .ok_or_else(|| InternalError::new("block", "block has no scope", block.span))?;
        Ok(self.scope.replace(scope))
    }
}

impl<'ir> Visit<'ir> for ReferenceCounter<'_> {
    type BreakValue = InternalError;

    fn visit_block(&mut self, block: &'ir Block) -> ControlFlow<InternalError> {
        let outer = into_flow(self.enter(block))?;
        walk_block(self, block)?;
        self.scope = outer;
        ControlFlow::Continue(())
    }

    fn visit_stmt_for(&mut self, for_: &'ir StmtFor) -> ControlFlow<InternalError> {
        let StmtFor { init, cond, step, body } = for_;
        let outer = into_flow(self.enter(init))?;
        walk_block(self, init)?;
        self.visit_expr(cond)?;
        self.visit_block(body)?;
        self.visit_block(step)?;
        self.scope = outer;
        ControlFlow::Continue(())
    }

    fn visit_function(&mut self, function: &'ir Function) -> ControlFlow<InternalError> {
        let Some(id) = self.tree.function_of_body(function.body.id) else {
            let err = InternalError::new("function", "unknown function", function.name.span);
            return ControlFlow::Break(err);
        };
        let info = self.tree.function(id);
        for &ret in &info.returns {
            self.remaining[ret] += 1;
        }
        let outer = self.scope.replace(info.scope);
        self.visit_block(&function.body)?;
        self.scope = outer;
        ControlFlow::Continue(())
    }

    fn visit_ident(&mut self, ident: &'ir Ident) -> ControlFlow<InternalError> {
        let var = self.scope.and_then(|scope| self.tree.lookup_variable(scope, &ident.name));
        match var {
            Some(var) => {
                self.remaining[var] += 1;
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(InternalError::new(
                "identifier",
                format!("unresolved variable `{}`", ident.name),
                ident.span,
            )),
        }
    }
}

fn into_flow<T>(res: Result<T, InternalError>) -> ControlFlow<InternalError, T> {
    match res {
        Ok(value) => ControlFlow::Continue(value),
        Err(err) => ControlFlow::Break(err),
    }
}

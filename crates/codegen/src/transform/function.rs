//! Function definitions.
//!
//! The caller pushes a return label and then the arguments, first argument on top, and jumps to
//! the entry label. The function leaves its return values in place of all of that, first return
//! value deepest:
//!
//! ```text
//! entry: [RET a_n .. a_1]
//! exit:  [r_1 .. r_m RET] JUMP
//! ```

use super::{CodeTransform, FunctionState, TResult, TransformError};
use crate::{
    AbstractAssembly, InternalError, Label, Slot, StackLayout,
    analysis::{FrameKind, FunctionId},
};
use alloy_primitives::U256;
use stackgen_ir::Function;
use std::iter;

impl<A: AbstractAssembly + ?Sized> CodeTransform<'_, '_, A> {
    /// Generates `function` with a transform of its own.
    ///
    /// Running out of stack reach abandons the function; the error is recorded and the sink is
    /// marked invalid.
    pub(super) fn visit_function(&mut self, function: &Function) -> TResult {
        let tree = self.ctx.tree;
        let id = tree
            .function_of_body(function.body.id)
            .ok_or_else(|| self.fault("function definition", "function was not analyzed"))?;
        let info = tree.function(id);
        debug!(
            name = %info.name,
            params = info.params.len(),
            returns = info.returns.len(),
            "generating function"
        );

        let layout = StackLayout::from_slots(
            iter::once(Slot::ReturnLabel).chain(info.params.iter().rev().map(|&p| Slot::Named(p))),
        );
        let entry = self.ctx.function_label(id, &mut *self.asm);
        let exit_label = self.asm.new_label();
        let state = FunctionState {
            id,
            exit_label,
            returns_pending: true,
            exit_layout: None,
            has_leave: false,
        };
        let res = CodeTransform::new(&mut *self.ctx, &mut *self.asm, layout, Some(state))
            .run_function(function, id, entry);
        match res {
            Ok(()) => Ok(()),
            Err(TransformError::StackTooDeep(err)) => {
                self.ctx.record(err);
                self.asm.mark_invalid();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn run_function(mut self, function: &Function, id: FunctionId, entry: Label) -> TResult {
        let span = function.name.span;
        self.set_location(span);
        self.generate_function(function, id, entry).map_err(|err| match err {
            TransformError::Layout(err) => {
                InternalError::new("function definition", err.to_string(), span).into()
            }
            err => err,
        })
    }

    fn generate_function(&mut self, function: &Function, id: FunctionId, entry: Label) -> TResult {
        let tree = self.ctx.tree;
        let info = tree.function(id);
        self.place_label(entry);
        self.scopes.enter(info.scope, self.layout.height(), FrameKind::Function);
        if self.optimize() {
            for &param in &info.params {
                if !self.ctx.liveness.has_future_use(param) {
                    self.layout.retire(param)?;
                }
            }
        } else {
            self.setup_return_variables()?;
        }

        self.visit_block(&function.body, FrameKind::FunctionBody)?;
        if self.function.as_ref().is_some_and(|f| f.returns_pending) {
            self.setup_return_variables()?;
        }

        self.set_location(function.name.span);
        let Some(state) = &self.function else {
            return Err(self.fault("function definition", "no function state"));
        };
        let exit_label = state.exit_label;
        if state.has_leave {
            let exit_layout = state.exit_layout.clone().unwrap_or_default();
            self.reconcile(&exit_layout, "function definition")?;
        }
        self.place_label(exit_label);
        let returns = info.returns.iter().map(|&r| Slot::Named(r));
        let target = StackLayout::from_slots(returns.chain(iter::once(Slot::ReturnLabel)));
        self.reconcile(&target, "function definition")?;
        self.asm.append_jump();
        self.scopes.leave();
        Ok(())
    }

    /// Pushes the return variables, zero-initialized, and fixes the exit layout.
    ///
    /// With stack allocation optimized, each return variable moves into the lowest free slot in
    /// reach.
    pub(super) fn setup_return_variables(&mut self) -> TResult {
        let Some(state) = &self.function else { return Ok(()) };
        let tree = self.ctx.tree;
        let returns = &tree.function(state.id).returns;
        for &ret in returns {
            self.asm.append_constant(U256::ZERO);
            self.layout.push_unnamed();
            self.layout.bind(0, ret)?;
            if self.optimize() {
                self.reuse_free_slot()?;
            }
        }

        let exit_slots = self.layout.slots().iter().map(|&slot| match slot {
            Slot::Named(var) if returns.contains(&var) => slot,
            Slot::ReturnLabel => slot,
            _ => Slot::Free,
        });
        let exit_layout = StackLayout::from_slots(exit_slots);
        trace!(%exit_layout, "return variables set up");
        self.pop_floor = self.layout.height();
        if let Some(state) = &mut self.function {
            state.returns_pending = false;
            state.exit_layout = Some(exit_layout);
        }
        Ok(())
    }
}

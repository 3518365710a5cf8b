//! Expression generation.

use super::{CodeTransform, TResult};
use crate::AbstractAssembly;
use stackgen_ir::{Expr, ExprCall, ExprKind};

impl<A: AbstractAssembly + ?Sized> CodeTransform<'_, '_, A> {
    /// Generates `expr`, leaving its values on top of the stack.
    pub(super) fn visit_expr(&mut self, expr: &Expr) -> TResult {
        self.set_location(expr.span);
        match &expr.kind {
            ExprKind::Lit(lit) => {
                let value = lit.to_u256().ok_or_else(|| {
                    self.fault("literal", format!("{lit} does not fit into a word"))
                })?;
                self.asm.append_constant(value);
                self.layout.push_unnamed();
            }
            ExprKind::Ident(ident) => {
                let var = self.resolve_variable(ident)?;
                self.dup_variable(var)?;
                self.consume(var)?;
            }
            ExprKind::Call(call) => self.visit_call(call)?,
        }
        Ok(())
    }

    /// Arguments are evaluated right to left, so that the first one ends up on top.
    fn visit_call(&mut self, call: &ExprCall) -> TResult {
        let name = call.name.as_str();
        if let Some(&builtin) = self.ctx.dialect.builtin(name) {
            self.check_arity(name, builtin.inputs, call.arguments.len())?;
            for arg in call.arguments.iter().rev() {
                self.visit_expr(arg)?;
            }
            self.set_location(call.name.span);
            self.asm.append_operation(builtin.opcode);
            self.layout.pop_n(builtin.inputs)?;
            for _ in 0..builtin.outputs {
                self.layout.push_unnamed();
            }
            return Ok(());
        }

        let tree = self.ctx.tree;
        let id = tree
            .lookup_function(self.scope()?, name)
            .ok_or_else(|| self.fault("function call", format!("unknown function `{name}`")))?;
        let info = tree.function(id);
        self.check_arity(name, info.params.len(), call.arguments.len())?;

        let return_label = self.asm.new_label();
        self.asm.append_label_reference(return_label);
        self.layout.push_unnamed();
        for arg in call.arguments.iter().rev() {
            self.visit_expr(arg)?;
        }
        self.set_location(call.name.span);
        let entry = self.ctx.function_label(id, &mut *self.asm);
        self.asm.append_jump_to(entry);
        self.layout.pop_n(info.params.len() + 1)?;
        for _ in &info.returns {
            self.layout.push_unnamed();
        }
        self.place_label(return_label);
        Ok(())
    }

    fn check_arity(&self, name: &str, expected: usize, found: usize) -> TResult {
        if expected == found {
            Ok(())
        } else {
            let msg = format!("`{name}` takes {expected} argument(s), {found} given");
            Err(self.fault("function call", msg))
        }
    }
}

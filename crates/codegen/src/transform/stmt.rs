//! Statement generation.

use super::{CodeTransform, LoopInfo, TResult, TransformError};
use crate::{
    AbstractAssembly, InternalError, Label, ScopeTree, StackLayout,
    analysis::{FrameKind, ScopeId, VarId},
    opcodes,
};
use alloy_primitives::U256;
use smallvec::SmallVec;
use stackgen_ir::{Block, Expr, Ident, Stmt, StmtFor, StmtKind, StmtSwitch, Visit};
use std::ops::ControlFlow;

impl<A: AbstractAssembly + ?Sized> CodeTransform<'_, '_, A> {
    /// Generates `block` in a new scope.
    pub(super) fn visit_block(&mut self, block: &Block, kind: FrameKind) -> TResult {
        self.enter_scope(block, kind)?;
        self.visit_statements(&block.stmts)?;
        self.finalize_block()
    }

    /// Generates the statements of the current scope.
    ///
    /// Dead variables are retired before every statement. Runs of function definitions are
    /// jumped over as a whole.
    pub(super) fn visit_statements(&mut self, stmts: &[Stmt]) -> TResult {
        let mut jump_over = None;
        for stmt in stmts {
            let is_function = matches!(stmt.kind, StmtKind::FunctionDef(_));
            if !is_function && let Some(label) = jump_over.take() {
                self.place_label(label);
            }

            self.set_location(stmt.span);
            self.free_unused_variables(true)?;
            if self.needs_return_variables(stmt) {
                self.setup_return_variables()?;
            }

            if is_function && jump_over.is_none() {
                let label = self.asm.new_label();
                self.asm.append_jump_to(label);
                jump_over = Some(label);
            }
            self.visit_stmt(stmt)?;
        }
        if let Some(label) = jump_over {
            self.place_label(label);
        }

        let frame = self.scopes.current();
        let at_body_top = frame.is_some_and(|frame| frame.kind == FrameKind::FunctionBody);
        if at_body_top && self.function.as_ref().is_some_and(|f| !f.has_leave) {
            self.pop_floor = 0;
        }
        self.free_unused_variables(true)
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> TResult {
        self.set_location(stmt.span);
        self.visit_stmt_kind(stmt).map_err(|err| match err {
            TransformError::Layout(err) => {
                InternalError::new(construct(&stmt.kind), err.to_string(), stmt.span).into()
            }
            err => err,
        })
    }

    fn visit_stmt_kind(&mut self, stmt: &Stmt) -> TResult {
        match &stmt.kind {
            StmtKind::Block(block) => self.visit_block(block, FrameKind::Block),
            StmtKind::Assign(targets, value) => self.visit_assign(targets, value),
            StmtKind::Expr(expr) => {
                let height = self.layout.height();
                self.visit_expr(expr)?;
                self.expect_height(height, "expression statement")
            }
            StmtKind::If(cond, body) => self.visit_if(cond, body),
            StmtKind::For(for_) => self.visit_for(for_),
            StmtKind::Switch(switch) => self.visit_switch(switch),
            StmtKind::Leave => self.visit_leave(),
            StmtKind::Break => self.visit_loop_exit(true),
            StmtKind::Continue => self.visit_loop_exit(false),
            StmtKind::FunctionDef(function) => self.visit_function(function),
            StmtKind::VarDecl(names, value) => self.visit_var_decl(names, value.as_ref()),
        }
    }

    fn visit_var_decl(&mut self, names: &[Ident], value: Option<&Expr>) -> TResult {
        let vars: SmallVec<[VarId; 4]> =
            names.iter().map(|name| self.resolve_variable(name)).collect::<TResult<_>>()?;
        let start = self.layout.height();
        match value {
            Some(value) => {
                self.visit_expr(value)?;
                self.expect_height(start + vars.len(), "variable declaration")?;
            }
            None => {
                for _ in &vars {
                    self.asm.append_constant(U256::ZERO);
                    self.layout.push_unnamed();
                }
            }
        }

        // Variables whose last use was in the initializer hand over their slots.
        self.free_unused_variables(false)?;

        let mut at_top = true;
        for (i, &var) in vars.iter().enumerate().rev() {
            let pos = start + i;
            let depth = self.layout.height() - 1 - pos;
            self.layout.bind(depth, var)?;
            if !self.optimize() || !at_top {
                continue;
            }
            if !self.ctx.liveness.has_future_use(var) {
                self.layout.retire(var)?;
                self.pop_slot()?;
            } else if !self.reuse_free_slot()? {
                at_top = false;
            }
        }
        Ok(())
    }

    fn visit_assign(&mut self, targets: &[Ident], value: &Expr) -> TResult {
        let start = self.layout.height();
        self.visit_expr(value)?;
        self.expect_height(start + targets.len(), "assignment")?;
        for target in targets.iter().rev() {
            let var = self.resolve_variable(target)?;
            let pos = self.layout.position(var).ok_or_else(|| {
                self.fault("assignment", format!("`{}` is not on the stack", target.name))
            })?;
            self.layout.bind(0, var)?;
            self.swap_top_with(pos, Some(var))?;
            self.pop_slot()?;
            self.consume(var)?;
        }
        Ok(())
    }

    fn visit_if(&mut self, cond: &Expr, body: &Block) -> TResult {
        self.visit_expr(cond)?;
        self.asm.append_operation(opcodes::ISZERO);
        let end = self.asm.new_label();
        self.asm.append_conditional_jump_to(end);
        self.layout.pop()?;

        let junction = self.layout.clone();
        self.visit_block(body, FrameKind::Block)?;
        self.reconcile(&junction, "if")?;
        self.place_label(end);
        Ok(())
    }

    /// The selector stays on the stack until all branches have joined.
    fn visit_switch(&mut self, switch: &StmtSwitch) -> TResult {
        let StmtSwitch { selector, branches, default_case } = switch;
        self.visit_expr(selector)?;
        let junction = self.layout.clone();
        let end = self.asm.new_label();

        let mut cases = SmallVec::<[_; 8]>::with_capacity(branches.len());
        for case in branches {
            self.set_location(case.span);
            let value = case.constant.to_u256().ok_or_else(|| {
                self.fault("switch", format!("case value {} does not fit a word", case.constant))
            })?;
            let label = self.asm.new_label();
            self.asm.append_constant(value);
            self.layout.push_unnamed();
            self.asm.append_duplicate(2);
            self.layout.dup(2)?;
            self.asm.append_operation(opcodes::EQ);
            self.layout.pop_n(2)?;
            self.layout.push_unnamed();
            self.asm.append_conditional_jump_to(label);
            self.layout.pop()?;
            cases.push((label, case));
        }

        if let Some(default_case) = default_case {
            self.visit_block(default_case, FrameKind::Block)?;
            self.reconcile(&junction, "switch")?;
        }
        self.asm.append_jump_to(end);

        let last = cases.len().saturating_sub(1);
        for (i, (label, case)) in cases.into_iter().enumerate() {
            self.layout = junction.clone();
            self.place_label(label);
            self.set_location(case.span);
            self.visit_block(&case.body, FrameKind::Block)?;
            self.reconcile(&junction, "switch")?;
            if i != last {
                self.asm.append_jump_to(end);
            }
        }

        self.layout = junction;
        self.place_label(end);
        self.pop_slot()
    }

    /// The init block's scope spans the whole loop. The layout at the loop header is fixed once,
    /// before the first iteration, and every back edge returns to it.
    fn visit_for(&mut self, for_: &StmtFor) -> TResult {
        let StmtFor { init, cond, step, body } = for_;
        self.enter_scope(init, FrameKind::Block)?;
        self.visit_statements(&init.stmts)?;

        let start = self.asm.new_label();
        let post = self.asm.new_label();
        let end = self.asm.new_label();
        self.place_label(start);
        let junction = self.layout.clone();

        self.set_location(cond.span);
        self.visit_expr(cond)?;
        self.asm.append_operation(opcodes::ISZERO);
        self.asm.append_conditional_jump_to(end);
        self.layout.pop()?;

        self.loops.push(LoopInfo { post, end, layout: junction.clone() });
        self.visit_block(body, FrameKind::Block)?;
        self.reconcile(&junction, "for")?;
        self.place_label(post);
        self.visit_block(step, FrameKind::Block)?;
        self.reconcile(&junction, "for")?;
        self.asm.append_jump_to(start);
        self.loops.pop();

        self.layout = junction;
        self.place_label(end);
        self.finalize_block()
    }

    /// `break` or `continue`.
    fn visit_loop_exit(&mut self, is_break: bool) -> TResult {
        let construct = if is_break { "break" } else { "continue" };
        let Some(info) = self.loops.last() else {
            return Err(self.fault(construct, "not inside a loop"));
        };
        let target = if is_break { info.end } else { info.post };
        let layout = info.layout.clone();
        self.jump_with_layout(target, &layout, construct)
    }

    fn visit_leave(&mut self) -> TResult {
        let Some(function) = self.function.as_mut() else {
            return Err(self.fault("leave", "not inside a function"));
        };
        function.has_leave = true;
        let exit = function.exit_label;
        let Some(layout) = function.exit_layout.clone() else {
            return Err(self.fault("leave", "return variables are not set up"));
        };
        self.jump_with_layout(exit, &layout, "leave")
    }

    /// Jumps to `label`, which expects `target`. Code after the jump continues with the current
    /// layout.
    fn jump_with_layout(
        &mut self,
        label: Label,
        target: &StackLayout,
        construct: &'static str,
    ) -> TResult {
        let saved = self.layout.clone();
        self.reconcile(target, construct)?;
        self.asm.append_jump_to(label);
        self.layout = saved;
        self.asm.set_stack_height_hint(self.layout.height());
        Ok(())
    }

    /// Whether the return variables have to exist before `stmt`.
    ///
    /// Only decided at the top level of a function body. Expression statements and assignments
    /// that do not mention a return variable can run without them.
    fn needs_return_variables(&self, stmt: &Stmt) -> bool {
        let Some(function) = &self.function else { return false };
        let Some(frame) = self.scopes.current() else { return false };
        if !function.returns_pending || frame.kind != FrameKind::FunctionBody {
            return false;
        }
        match &stmt.kind {
            StmtKind::Expr(_) | StmtKind::Assign(..) => {
                let tree = self.ctx.tree;
                let returns = &tree.function(function.id).returns;
                let mut mentions = ReturnMentions { tree, scope: frame.scope, returns };
                mentions.visit_stmt(stmt).is_break()
            }
            _ => true,
        }
    }
}

/// Finds a reference to one of `returns`.
struct ReturnMentions<'a> {
    tree: &'a ScopeTree,
    scope: ScopeId,
    returns: &'a [VarId],
}

impl<'ir> Visit<'ir> for ReturnMentions<'_> {
    type BreakValue = ();

    fn visit_ident(&mut self, ident: &'ir Ident) -> ControlFlow<()> {
        match self.tree.lookup_variable(self.scope, &ident.name) {
            Some(var) if self.returns.contains(&var) => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

fn construct(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Block(_) => "block",
        StmtKind::Assign(..) => "assignment",
        StmtKind::Expr(_) => "expression statement",
        StmtKind::If(..) => "if",
        StmtKind::For(_) => "for",
        StmtKind::Switch(_) => "switch",
        StmtKind::Leave => "leave",
        StmtKind::Break => "break",
        StmtKind::Continue => "continue",
        StmtKind::FunctionDef(_) => "function definition",
        StmtKind::VarDecl(..) => "variable declaration",
    }
}

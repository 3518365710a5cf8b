//! Constant IR visitor.

use crate::*;
use std::ops::ControlFlow;

/// IR traversal.
///
/// Every method has a default implementation that walks the children in source order; override
/// the ones you are interested in and call back into the walk where needed.
pub trait Visit<'ir> {
    /// The value returned when breaking from the traversal.
    type BreakValue;

    fn visit_block(&mut self, block: &'ir Block) -> ControlFlow<Self::BreakValue> {
        walk_block(self, block)
    }

    fn visit_stmt(&mut self, stmt: &'ir Stmt) -> ControlFlow<Self::BreakValue> {
        walk_stmt(self, stmt)
    }

    fn visit_stmt_for(&mut self, for_: &'ir StmtFor) -> ControlFlow<Self::BreakValue> {
        walk_stmt_for(self, for_)
    }

    fn visit_stmt_switch(&mut self, switch: &'ir StmtSwitch) -> ControlFlow<Self::BreakValue> {
        walk_stmt_switch(self, switch)
    }

    fn visit_function(&mut self, function: &'ir Function) -> ControlFlow<Self::BreakValue> {
        self.visit_block(&function.body)
    }

    fn visit_expr(&mut self, expr: &'ir Expr) -> ControlFlow<Self::BreakValue> {
        walk_expr(self, expr)
    }

    fn visit_expr_call(&mut self, call: &'ir ExprCall) -> ControlFlow<Self::BreakValue> {
        for arg in &call.arguments {
            self.visit_expr(arg)?;
        }
        ControlFlow::Continue(())
    }

    /// Visits a variable reference: an identifier expression or an assignment target.
    fn visit_ident(&mut self, ident: &'ir Ident) -> ControlFlow<Self::BreakValue> {
        let _ = ident;
        ControlFlow::Continue(())
    }
}

pub fn walk_block<'ir, V: Visit<'ir> + ?Sized>(
    v: &mut V,
    block: &'ir Block,
) -> ControlFlow<V::BreakValue> {
    for stmt in &block.stmts {
        v.visit_stmt(stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_stmt<'ir, V: Visit<'ir> + ?Sized>(
    v: &mut V,
    stmt: &'ir Stmt,
) -> ControlFlow<V::BreakValue> {
    match &stmt.kind {
        StmtKind::Block(block) => v.visit_block(block)?,
        StmtKind::Assign(idents, expr) => {
            for ident in idents {
                v.visit_ident(ident)?;
            }
            v.visit_expr(expr)?;
        }
        StmtKind::Expr(expr) => v.visit_expr(expr)?,
        StmtKind::If(cond, block) => {
            v.visit_expr(cond)?;
            v.visit_block(block)?;
        }
        StmtKind::For(for_) => v.visit_stmt_for(for_)?,
        StmtKind::Switch(switch) => v.visit_stmt_switch(switch)?,
        StmtKind::Leave | StmtKind::Break | StmtKind::Continue => {}
        StmtKind::FunctionDef(function) => v.visit_function(function)?,
        StmtKind::VarDecl(_, expr) => {
            if let Some(expr) = expr {
                v.visit_expr(expr)?;
            }
        }
    }
    ControlFlow::Continue(())
}

/// Walks the parts of a for statement in textual order: init, condition, body, step.
pub fn walk_stmt_for<'ir, V: Visit<'ir> + ?Sized>(
    v: &mut V,
    for_: &'ir StmtFor,
) -> ControlFlow<V::BreakValue> {
    let StmtFor { init, cond, step, body } = for_;
    v.visit_block(init)?;
    v.visit_expr(cond)?;
    v.visit_block(body)?;
    v.visit_block(step)?;
    ControlFlow::Continue(())
}

pub fn walk_stmt_switch<'ir, V: Visit<'ir> + ?Sized>(
    v: &mut V,
    switch: &'ir StmtSwitch,
) -> ControlFlow<V::BreakValue> {
    let StmtSwitch { selector, branches, default_case } = switch;
    v.visit_expr(selector)?;
    for case in branches {
        v.visit_block(&case.body)?;
    }
    if let Some(block) = default_case {
        v.visit_block(block)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_expr<'ir, V: Visit<'ir> + ?Sized>(
    v: &mut V,
    expr: &'ir Expr,
) -> ControlFlow<V::BreakValue> {
    match &expr.kind {
        ExprKind::Ident(ident) => v.visit_ident(ident)?,
        ExprKind::Call(call) => v.visit_expr_call(call)?,
        ExprKind::Lit(_) => {}
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Names(Vec<String>);

    impl<'ir> Visit<'ir> for Names {
        type BreakValue = ();

        fn visit_ident(&mut self, ident: &'ir Ident) -> ControlFlow<()> {
            self.0.push(ident.name.clone());
            ControlFlow::Continue(())
        }
    }

    fn ident(name: &str) -> Expr {
        Expr { span: Span::DUMMY, kind: ExprKind::Ident(Ident::dummy(name)) }
    }

    #[test]
    fn walks_references_in_order() {
        let mut ids = BlockIdGen::new();
        let call = Expr {
            span: Span::DUMMY,
            kind: ExprKind::Call(ExprCall {
                name: Ident::dummy("add"),
                arguments: vec![ident("a"), ident("b")],
            }),
        };
        let inner = Block::new(
            ids.next_id(),
            Span::DUMMY,
            vec![Stmt { span: Span::DUMMY, kind: StmtKind::Assign(vec![Ident::dummy("c")], call) }],
        );
        let block = Block::new(
            ids.next_id(),
            Span::DUMMY,
            vec![
                Stmt {
                    span: Span::DUMMY,
                    kind: StmtKind::VarDecl(vec![Ident::dummy("x")], Some(ident("y"))),
                },
                Stmt { span: Span::DUMMY, kind: StmtKind::If(ident("z"), inner) },
            ],
        );

        let mut names = Names(Vec::new());
        let _ = names.visit_block(&block);
        assert_eq!(names.0, ["y", "z", "c", "a", "b"]);
    }
}

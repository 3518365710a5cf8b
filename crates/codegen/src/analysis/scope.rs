//! Lexical scopes.
//!
//! [`ScopeTree`] is built once per program: one scope per block, keyed by [`BlockId`], plus one
//! scope per function definition that holds its parameters and return variables and is the parent
//! of the body's scope. [`ScopeStack`] is the runtime side used during code generation; it records
//! the stack height at which each active scope was entered.

use crate::{CodegenError, FxHashMap, FxIndexMap, InternalError};
use index_vec::IndexVec;
use stackgen_ir::{
    Block, BlockId, Function, Ident, Stmt, StmtFor, StmtKind, Visit,
    visit::{walk_block, walk_stmt},
};
use std::ops::ControlFlow;

index_vec::define_index_type! {
    /// A scope in a [`ScopeTree`].
    pub struct ScopeId = u32;
    DEBUG_FORMAT = "s{}";
}

index_vec::define_index_type! {
    /// A declared variable: a local, a function parameter or a return variable.
    pub struct VarId = u32;
    DEBUG_FORMAT = "v{}";
}

index_vec::define_index_type! {
    /// A user-defined function.
    pub struct FunctionId = u32;
    DEBUG_FORMAT = "f{}";
}

/// What a name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Declaration {
    Variable(VarId),
    Function(FunctionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// The scope of a block.
    Block(BlockId),
    /// The scope holding the parameters and return variables of a function.
    Function(FunctionId),
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub kind: ScopeKind,
    /// Declared names, in declaration order. Functions are declared first.
    pub identifiers: FxIndexMap<String, Declaration>,
}

impl Scope {
    /// Returns the variables declared in this scope, in declaration order.
    pub fn variables(&self) -> impl DoubleEndedIterator<Item = VarId> + '_ {
        self.identifiers.values().filter_map(|decl| match *decl {
            Declaration::Variable(var) => Some(var),
            Declaration::Function(_) => None,
        })
    }

    pub fn is_function_scope(&self) -> bool {
        matches!(self.kind, ScopeKind::Function(_))
    }
}

#[derive(Debug)]
pub struct Variable {
    pub name: Ident,
    pub scope: ScopeId,
}

#[derive(Debug)]
pub struct FunctionInfo {
    pub name: Ident,
    pub params: Vec<VarId>,
    pub returns: Vec<VarId>,
    /// The scope holding `params` and `returns`.
    pub scope: ScopeId,
    pub body: BlockId,
}

/// The scopes, variables and functions of a program.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    variables: IndexVec<VarId, Variable>,
    functions: IndexVec<FunctionId, FunctionInfo>,
    block_scopes: FxHashMap<BlockId, ScopeId>,
    function_bodies: FxHashMap<BlockId, FunctionId>,
}

impl ScopeTree {
    /// Builds the scope tree of the program rooted at `block`.
    #[instrument(name = "scope_filler", level = "debug", skip_all)]
    pub fn build(block: &Block) -> Result<Self, CodegenError> {
        let mut filler = ScopeFiller { tree: Self::default(), current: None };
        match filler.visit_block(block) {
            ControlFlow::Continue(()) => Ok(filler.tree),
            ControlFlow::Break(err) => Err(err),
        }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionInfo {
        &self.functions[id]
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Returns the scope opened by `block`.
    pub fn block_scope(&self, block: BlockId) -> Option<ScopeId> {
        self.block_scopes.get(&block).copied()
    }

    /// Returns the function whose body is `block`.
    pub fn function_of_body(&self, block: BlockId) -> Option<FunctionId> {
        self.function_bodies.get(&block).copied()
    }

    /// Resolves `name` as seen from `scope`.
    ///
    /// Walks up the parents. Variables declared outside of the innermost enclosing function are
    /// not visible; functions are.
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<Declaration> {
        let mut crossed_function = false;
        loop {
            let s = &self.scopes[scope];
            match s.identifiers.get(name) {
                Some(&Declaration::Variable(_)) if crossed_function => {}
                Some(&decl) => return Some(decl),
                None => {}
            }
            crossed_function |= s.is_function_scope();
            scope = s.parent?;
        }
    }

    pub fn lookup_variable(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        match self.lookup(scope, name)? {
            Declaration::Variable(var) => Some(var),
            Declaration::Function(_) => None,
        }
    }

    pub fn lookup_function(&self, scope: ScopeId, name: &str) -> Option<FunctionId> {
        match self.lookup(scope, name)? {
            Declaration::Function(f) => Some(f),
            Declaration::Variable(_) => None,
        }
    }

    fn new_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.push(Scope {
            parent,
            children: Vec::new(),
            kind,
            identifiers: FxIndexMap::default(),
        });
        if let Some(parent) = parent {
            self.scopes[parent].children.push(id);
        }
        id
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        ident: &Ident,
        decl: Declaration,
    ) -> Result<(), CodegenError> {
        let identifiers = &mut self.scopes[scope].identifiers;
        if identifiers.contains_key(&ident.name) {
            return Err(CodegenError::DuplicateDeclaration {
                name: ident.name.clone(),
                span: ident.span,
            });
        }
        identifiers.insert(ident.name.clone(), decl);
        Ok(())
    }

    fn declare_variable(&mut self, scope: ScopeId, ident: &Ident) -> Result<VarId, CodegenError> {
        let var = self.variables.push(Variable { name: ident.clone(), scope });
        self.declare(scope, ident, Declaration::Variable(var))?;
        Ok(var)
    }
}

/// Builds a [`ScopeTree`].
struct ScopeFiller {
    tree: ScopeTree,
    current: Option<ScopeId>,
}

impl ScopeFiller {
    /// Opens the scope of `block` and declares its functions.
    fn enter_block(&mut self, block: &Block) -> Result<ScopeId, CodegenError> {
        let scope = self.tree.new_scope(self.current, ScopeKind::Block(block.id));
        if self.tree.block_scopes.insert(block.id, scope).is_some() {
            return Err(InternalError::new(
                "block",
                format!("block id {:?} is used more than once", block.id),
                block.span,
            )
            .into());
        }
        for function in block.functions() {
            self.declare_function(scope, function)?;
        }
        self.current = Some(scope);
        Ok(scope)
    }

    fn leave_block(&mut self, scope: ScopeId) {
        self.current = self.tree.scopes[scope].parent;
    }

    fn declare_function(
        &mut self,
        scope: ScopeId,
        function: &Function,
    ) -> Result<(), CodegenError> {
        let id = self.tree.functions.next_idx();
        let fn_scope = self.tree.new_scope(Some(scope), ScopeKind::Function(id));
        let params = function
            .parameters
            .iter()
            .map(|p| self.tree.declare_variable(fn_scope, p))
            .collect::<Result<Vec<_>, _>>()?;
        let returns = function
            .returns
            .iter()
            .map(|r| self.tree.declare_variable(fn_scope, r))
            .collect::<Result<Vec<_>, _>>()?;
        self.tree.functions.push(FunctionInfo {
            name: function.name.clone(),
            params,
            returns,
            scope: fn_scope,
            body: function.body.id,
        });
        self.tree.function_bodies.insert(function.body.id, id);
        self.tree.declare(scope, &function.name, Declaration::Function(id))
    }

    fn current(&self, stmt: &Stmt) -> Result<ScopeId, CodegenError> {
        self.current
            .ok_or_else(|| InternalError::new("statement", "no active scope", stmt.span).into())
    }
}

impl<'ir> Visit<'ir> for ScopeFiller {
    type BreakValue = CodegenError;

    fn visit_block(&mut self, block: &'ir Block) -> ControlFlow<CodegenError> {
        let scope = into_flow(self.enter_block(block))?;
        walk_block(self, block)?;
        self.leave_block(scope);
        ControlFlow::Continue(())
    }

    fn visit_stmt(&mut self, stmt: &'ir Stmt) -> ControlFlow<CodegenError> {
        if let StmtKind::VarDecl(names, _) = &stmt.kind {
            let scope = into_flow(self.current(stmt))?;
            for name in names {
                into_flow(self.tree.declare_variable(scope, name))?;
            }
        }
        walk_stmt(self, stmt)
    }

    /// The init block stays open for the condition, the body and the step.
    fn visit_stmt_for(&mut self, for_: &'ir StmtFor) -> ControlFlow<CodegenError> {
        let StmtFor { init, cond, step, body } = for_;
        let scope = into_flow(self.enter_block(init))?;
        walk_block(self, init)?;
        self.visit_expr(cond)?;
        self.visit_block(body)?;
        self.visit_block(step)?;
        self.leave_block(scope);
        ControlFlow::Continue(())
    }

    fn visit_function(&mut self, function: &'ir Function) -> ControlFlow<CodegenError> {
        let Some(id) = self.tree.function_of_body(function.body.id) else {
            let err =
                InternalError::new("function", "function was not hoisted", function.name.span);
            return ControlFlow::Break(err.into());
        };
        let outer = self.current.replace(self.tree.functions[id].scope);
        self.visit_block(&function.body)?;
        self.current = outer;
        ControlFlow::Continue(())
    }
}

fn into_flow<T>(res: Result<T, CodegenError>) -> ControlFlow<CodegenError, T> {
    match res {
        Ok(value) => ControlFlow::Continue(value),
        Err(err) => ControlFlow::Break(err),
    }
}

/// How a [`ScopeFrame`] was entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// A plain block, including the init block of a for loop.
    Block,
    /// The scope of a function's parameters and return variables.
    Function,
    /// The outermost block of a function body. Its height changes: arguments are consumed and
    /// return values appear.
    FunctionBody,
}

/// An active scope during code generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeFrame {
    pub scope: ScopeId,
    /// The stack height when the scope was entered.
    pub base_height: usize,
    pub kind: FrameKind,
}

/// The active scopes during code generation, innermost last.
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `scope` at the current stack `height`.
    pub fn enter(&mut self, scope: ScopeId, height: usize, kind: FrameKind) {
        self.frames.push(ScopeFrame { scope, base_height: height, kind });
    }

    /// Closes the innermost scope.
    pub fn leave(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_ir::{BlockIdGen, Expr, ExprKind, Span};

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { span: Span::DUMMY, kind }
    }

    fn let_(names: &[&str]) -> Stmt {
        stmt(StmtKind::VarDecl(names.iter().map(|n| Ident::dummy(*n)).collect(), None))
    }

    fn function(ids: &mut BlockIdGen, name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
        stmt(StmtKind::FunctionDef(Function {
            name: Ident::dummy(name),
            parameters: params.iter().map(|n| Ident::dummy(*n)).collect(),
            returns: vec![Ident::dummy("r")],
            body: Block::new(ids.next_id(), Span::DUMMY, body),
        }))
    }

    #[test]
    fn nested_scopes_and_lookup() {
        let mut ids = BlockIdGen::new();
        let inner = Block::new(ids.next_id(), Span::DUMMY, vec![let_(&["y"])]);
        let f = function(&mut ids, "f", &["a"], vec![let_(&["z"])]);
        let root = Block::new(
            ids.next_id(),
            Span::DUMMY,
            vec![let_(&["x"]), stmt(StmtKind::Block(inner.clone())), f],
        );

        let tree = ScopeTree::build(&root).unwrap();
        let root_scope = tree.block_scope(root.id).unwrap();
        let inner_scope = tree.block_scope(inner.id).unwrap();
        assert_eq!(tree.scope(inner_scope).parent, Some(root_scope));
        assert!(tree.scope(root_scope).children.contains(&inner_scope));

        // Lexical lookup walks up.
        let x = tree.lookup_variable(inner_scope, "x").unwrap();
        assert_eq!(tree.variable(x).name.name, "x");
        assert_eq!(tree.variable(x).scope, root_scope);
        assert!(tree.lookup_variable(root_scope, "y").is_none());

        // Functions are hoisted and see their parameters, but not outer variables.
        let fid = tree.lookup_function(inner_scope, "f").unwrap();
        let info = tree.function(fid);
        assert_eq!(info.params.len(), 1);
        assert_eq!(info.returns.len(), 1);
        let body_scope = tree.block_scope(info.body).unwrap();
        assert_eq!(tree.scope(body_scope).parent, Some(info.scope));
        assert_eq!(tree.lookup_variable(body_scope, "a"), Some(info.params[0]));
        assert_eq!(tree.lookup_variable(body_scope, "r"), Some(info.returns[0]));
        assert!(tree.lookup_variable(body_scope, "x").is_none());
        assert_eq!(tree.lookup_function(body_scope, "f"), Some(fid));
        assert_eq!(tree.function_of_body(info.body), Some(fid));

        let vars: Vec<_> = tree.scope(info.scope).variables().collect();
        assert_eq!(vars, [info.params[0], info.returns[0]]);
    }

    #[test]
    fn for_init_encloses_loop() {
        let mut ids = BlockIdGen::new();
        let init = Block::new(ids.next_id(), Span::DUMMY, vec![let_(&["i"])]);
        let body = Block::new(ids.next_id(), Span::DUMMY, vec![]);
        let step = Block::new(ids.next_id(), Span::DUMMY, vec![]);
        let cond = Expr { span: Span::DUMMY, kind: ExprKind::Ident(Ident::dummy("i")) };
        let for_ = StmtFor { init: init.clone(), cond, step: step.clone(), body: body.clone() };
        let root =
            Block::new(ids.next_id(), Span::DUMMY, vec![stmt(StmtKind::For(Box::new(for_)))]);

        let tree = ScopeTree::build(&root).unwrap();
        let init_scope = tree.block_scope(init.id).unwrap();
        for block in [&body, &step] {
            let scope = tree.block_scope(block.id).unwrap();
            assert_eq!(tree.scope(scope).parent, Some(init_scope));
            assert!(tree.lookup_variable(scope, "i").is_some());
        }
    }

    #[test]
    fn duplicate_declaration() {
        let mut ids = BlockIdGen::new();
        let root = Block::new(ids.next_id(), Span::DUMMY, vec![let_(&["x"]), let_(&["x"])]);
        let err = ScopeTree::build(&root).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateDeclaration { name, .. } if name == "x"));

        // Shadowing in a nested block is not a redeclaration in the innermost scope.
        let inner = Block::new(ids.next_id(), Span::DUMMY, vec![let_(&["x"])]);
        let stmts = vec![let_(&["x"]), stmt(StmtKind::Block(inner))];
        let root = Block::new(ids.next_id(), Span::DUMMY, stmts);
        assert!(ScopeTree::build(&root).is_ok());

        let f = function(&mut ids, "f", &["a", "a"], vec![]);
        let root = Block::new(ids.next_id(), Span::DUMMY, vec![f]);
        assert!(matches!(
            ScopeTree::build(&root),
            Err(CodegenError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn duplicate_block_id() {
        let mut ids = BlockIdGen::new();
        let id = ids.next_id();
        let inner = Block::new(id, Span::DUMMY, vec![]);
        let root = Block::new(id, Span::DUMMY, vec![stmt(StmtKind::Block(inner))]);
        assert!(matches!(ScopeTree::build(&root), Err(CodegenError::Internal(_))));
    }

    #[test]
    fn scope_stack() {
        let mut stack = ScopeStack::new();
        assert!(stack.current().is_none());
        stack.enter(ScopeId::from_raw(0), 0, FrameKind::Block);
        stack.enter(ScopeId::from_raw(1), 3, FrameKind::Block);
        assert_eq!(stack.current().map(|f| f.base_height), Some(3));
        assert_eq!(stack.leave().map(|f| f.scope), Some(ScopeId::from_raw(1)));
        assert_eq!(stack.current().map(|f| f.base_height), Some(0));
    }
}

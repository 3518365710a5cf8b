use crate::{Ident, Lit, Span};

index_vec::define_index_type! {
    /// Identifies a [`Block`] within a program.
    pub struct BlockId = u32;
    DEBUG_FORMAT = "b{}";
}

/// Hands out fresh [`BlockId`]s while a program is being built.
#[derive(Debug, Default)]
pub struct BlockIdGen {
    next: u32,
}

impl BlockIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> BlockId {
        let id = BlockId::from_raw(self.next);
        self.next += 1;
        id
    }
}

/// A block of statements: `{ ... }`. Every block opens a scope.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(id: BlockId, span: Span, stmts: Vec<Stmt>) -> Self {
        Self { id, span, stmts }
    }

    /// Returns the function definitions declared directly in this block.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.stmts.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::FunctionDef(f) => Some(f),
            _ => None,
        })
    }
}

/// A statement.
#[derive(Clone, Debug)]
pub struct Stmt {
    /// The span of the statement.
    pub span: Span,
    /// The kind of statement.
    pub kind: StmtKind,
}

/// A kind of statement.
#[derive(Clone, Debug)]
pub enum StmtKind {
    /// A blocked scope: `{ ... }`.
    Block(Block),

    /// An assignment to one or more variables: `x := 1`, `x, y := f()`.
    ///
    /// Multi-assignments require a function call on the right-hand side.
    Assign(Vec<Ident>, Expr),

    /// An expression statement. This can only be a call returning nothing.
    Expr(Expr),

    /// An if statement: `if lt(a, b) { ... }`.
    If(Expr, Block),

    /// A for statement: `for { let i := 0 } lt(i, 10) { i := add(i, 1) } { ... }`.
    ///
    /// The scope of `init` encloses the condition, the step and the body.
    For(Box<StmtFor>),

    /// A switch statement: `switch x case 0 { ... } default { ... }`.
    Switch(StmtSwitch),

    /// A leave statement: `leave`.
    Leave,

    /// A break statement: `break`.
    Break,

    /// A continue statement: `continue`.
    Continue,

    /// A function definition statement: `function f(a) -> r { ... }`.
    FunctionDef(Function),

    /// A variable declaration statement: `let x, y := f()`.
    VarDecl(Vec<Ident>, Option<Expr>),
}

/// The parts of a for statement. See [`StmtKind::For`].
#[derive(Clone, Debug)]
pub struct StmtFor {
    pub init: Block,
    pub cond: Expr,
    pub step: Block,
    pub body: Block,
}

/// A switch statement consists of only a default case or one or more non-default cases,
/// optionally followed by a default case.
///
/// ```yul
/// switch exponent
/// case 0 { result := 1 }
/// case 1 { result := base }
/// default { revert(0, 0) }
/// ```
#[derive(Clone, Debug)]
pub struct StmtSwitch {
    pub selector: Expr,
    pub branches: Vec<StmtSwitchCase>,
    pub default_case: Option<Block>,
}

/// A non-default case of a switch statement.
#[derive(Clone, Debug)]
pub struct StmtSwitchCase {
    pub span: Span,
    pub constant: Lit,
    pub body: Block,
}

/// A function definition: `function f(a, b) -> x, y { ... }`.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Ident,
    pub parameters: Vec<Ident>,
    pub returns: Vec<Ident>,
    pub body: Block,
}

/// An expression.
#[derive(Clone, Debug)]
pub struct Expr {
    /// The span of the expression.
    pub span: Span,
    /// The kind of expression.
    pub kind: ExprKind,
}

/// A kind of expression.
#[derive(Clone, Debug)]
pub enum ExprKind {
    /// A variable reference.
    Ident(Ident),
    /// A function call: `foo(a, b)`.
    Call(ExprCall),
    /// A literal.
    Lit(Lit),
}

/// A function call expression: `foo(a, b)`.
#[derive(Clone, Debug)]
pub struct ExprCall {
    pub name: Ident,
    pub arguments: Vec<Expr>,
}

//! The stack-reusing code transform.
//!
//! A single depth-first pass over the IR that emits EVM instructions into an [`AbstractAssembly`]
//! and mirrors each of them on a [`StackLayout`]. Variables are retired at statement boundaries
//! as soon as the [`Liveness`] counts say they have no further use; their slots are then either
//! discarded (once on top) or taken over by the next declaration.
//!
//! Each function body is generated by its own `CodeTransform` with a fresh layout. Running out
//! of stack reach inside a function abandons that function only: the error is recorded, the sink
//! is marked invalid and generation continues, so that all such errors are reported at once.

use crate::{
    AbstractAssembly, CodegenError, EvmDialect, FxHashMap, InternalError, Label, Liveness,
    ScopeTree, StackTooDeep,
    analysis::{FrameKind, FunctionId, ScopeId, ScopeStack, VarId},
    stack::{self, LayoutError, MAX_STACK_ACCESS, ShuffleError, Slot, StackLayout, StackOp},
};
use stackgen_config::CodegenOpts;
use stackgen_ir::{Block, Ident, Span};

mod expr;
mod function;
mod stmt;

/// Generates EVM code for a whole program.
pub struct CodeGenerator;

impl CodeGenerator {
    /// Analyzes `block` and appends its code to `asm`.
    ///
    /// On [`CodegenError::StackTooDeep`] every function that could be generated was generated and
    /// `asm` was marked invalid.
    #[instrument(name = "codegen", level = "debug", skip_all)]
    pub fn assemble<A: AbstractAssembly + ?Sized>(
        block: &Block,
        asm: &mut A,
        opts: &CodegenOpts,
    ) -> Result<(), CodegenError> {
        let tree = ScopeTree::build(block)?;
        let liveness = Liveness::compute(block, &tree)?;
        let dialect = EvmDialect::new(opts.evm_version);
        let mut ctx = Context {
            tree: &tree,
            dialect: &dialect,
            opts,
            liveness,
            function_labels: FxHashMap::default(),
            stack_errors: Vec::new(),
        };

        let res = CodeTransform::new(&mut ctx, &mut *asm, StackLayout::new(), None).run(block);
        match res {
            Ok(()) => {}
            Err(TransformError::StackTooDeep(err)) => {
                ctx.record(err);
                asm.mark_invalid();
            }
            Err(TransformError::Internal(err)) => return Err(err.into()),
            Err(TransformError::Layout(err)) => {
                return Err(InternalError::new("block", err.to_string(), block.span).into());
            }
        }

        if ctx.stack_errors.is_empty() {
            Ok(())
        } else {
            Err(CodegenError::StackTooDeep(ctx.stack_errors))
        }
    }
}

/// State shared by the transforms of all functions.
struct Context<'a> {
    tree: &'a ScopeTree,
    dialect: &'a EvmDialect,
    opts: &'a CodegenOpts,
    liveness: Liveness,
    /// Entry labels, created on first reference.
    function_labels: FxHashMap<FunctionId, Label>,
    stack_errors: Vec<StackTooDeep>,
}

impl Context<'_> {
    fn function_label<A: AbstractAssembly + ?Sized>(
        &mut self,
        id: FunctionId,
        asm: &mut A,
    ) -> Label {
        *self.function_labels.entry(id).or_insert_with(|| asm.new_label())
    }

    fn record(&mut self, err: StackTooDeep) {
        debug!(%err, "stack too deep");
        self.stack_errors.push(err);
    }
}

#[derive(Debug, derive_more::From)]
enum TransformError {
    StackTooDeep(StackTooDeep),
    Internal(InternalError),
    /// Located by the enclosing statement.
    Layout(LayoutError),
}

type TResult<T = ()> = Result<T, TransformError>;

/// The function being generated.
#[derive(Debug)]
struct FunctionState {
    id: FunctionId,
    exit_label: Label,
    /// Return variables are pushed before the first statement that needs them.
    returns_pending: bool,
    /// The layout every path must have at the exit label. Fixed when the return variables are
    /// set up.
    exit_layout: Option<StackLayout>,
    has_leave: bool,
}

/// The innermost enclosing loop.
#[derive(Debug)]
struct LoopInfo {
    post: Label,
    end: Label,
    /// The layout at the loop header; `break` and `continue` jump with it.
    layout: StackLayout,
}

struct CodeTransform<'a, 'c, A: AbstractAssembly + ?Sized> {
    ctx: &'a mut Context<'c>,
    asm: &'a mut A,
    layout: StackLayout,
    scopes: ScopeStack,
    loops: Vec<LoopInfo>,
    function: Option<FunctionState>,
    /// Free slots at or below this height are not discarded.
    pop_floor: usize,
    span: Span,
}

impl<'a, 'c, A: AbstractAssembly + ?Sized> CodeTransform<'a, 'c, A> {
    fn new(
        ctx: &'a mut Context<'c>,
        asm: &'a mut A,
        layout: StackLayout,
        function: Option<FunctionState>,
    ) -> Self {
        Self {
            ctx,
            asm,
            layout,
            scopes: ScopeStack::new(),
            loops: Vec::new(),
            function,
            pop_floor: 0,
            span: Span::DUMMY,
        }
    }

    /// Generates the top-level block.
    fn run(mut self, block: &Block) -> TResult {
        self.visit_block(block, FrameKind::Block)
    }

    fn optimize(&self) -> bool {
        self.ctx.opts.optimize_stack_allocation
    }

    fn set_location(&mut self, span: Span) {
        self.span = span;
        self.asm.set_source_location(span);
    }

    fn fault(&self, construct: &'static str, message: impl Into<String>) -> TransformError {
        InternalError::new(construct, message, self.span).into()
    }

    fn too_deep(&self, var: Option<VarId>, excess: usize, comment: &str) -> TransformError {
        let tree = self.ctx.tree;
        StackTooDeep {
            function: self.function.as_ref().map(|f| tree.function(f.id).name.name.clone()),
            variable: var.map(|var| tree.variable(var).name.name.clone()),
            depth: excess,
            comment: comment.to_string(),
            span: self.span,
        }
        .into()
    }

    fn scope(&self) -> TResult<ScopeId> {
        let frame = self.scopes.current();
        frame.map(|frame| frame.scope).ok_or_else(|| self.fault("block", "no active scope"))
    }

    fn resolve_variable(&self, ident: &Ident) -> TResult<VarId> {
        let scope = self.scope()?;
        self.ctx.tree.lookup_variable(scope, &ident.name).ok_or_else(|| {
            self.fault("identifier", format!("unresolved variable `{}`", ident.name))
        })
    }

    fn consume(&mut self, var: VarId) -> TResult {
        if self.ctx.liveness.consume(var) {
            Ok(())
        } else {
            let tree = self.ctx.tree;
            let name = &tree.variable(var).name;
            Err(self.fault("identifier", format!("more references to `{name}` than counted")))
        }
    }

    fn expect_height(&self, height: usize, construct: &'static str) -> TResult {
        if self.layout.height() == height {
            Ok(())
        } else {
            let msg = format!("expected stack height {height}, found {}", self.layout.height());
            Err(self.fault(construct, msg))
        }
    }

    /// Places `label` and tells the sink the stack height there.
    fn place_label(&mut self, label: Label) {
        self.asm.append_label(label);
        self.asm.set_stack_height_hint(self.layout.height());
    }

    fn append_stack_op(&mut self, op: StackOp) {
        match op {
            StackOp::Dup(n) => self.asm.append_duplicate(n),
            StackOp::Swap(n) => self.asm.append_swap(n),
            StackOp::Pop => self.asm.append_discard(),
        }
    }

    /// Discards the top slot.
    fn pop_slot(&mut self) -> TResult {
        self.layout.pop()?;
        self.asm.append_discard();
        Ok(())
    }

    /// Copies `var` to the top.
    fn dup_variable(&mut self, var: VarId) -> TResult {
        let pos = self.layout.position(var).ok_or(LayoutError::NotBound(var))?;
        let diff = self.layout.height() - pos;
        if diff > MAX_STACK_ACCESS {
            return Err(self.too_deep(Some(var), diff - MAX_STACK_ACCESS, ""));
        }
        let op = StackOp::Dup(diff as u8);
        self.layout.apply(op)?;
        self.append_stack_op(op);
        Ok(())
    }

    /// Exchanges the top slot with the slot at position `pos`.
    fn swap_top_with(&mut self, pos: usize, var: Option<VarId>) -> TResult {
        let depth = self.layout.height().saturating_sub(pos + 1);
        if depth == 0 {
            return Ok(());
        }
        if depth > MAX_STACK_ACCESS {
            return Err(self.too_deep(var, depth - MAX_STACK_ACCESS, ""));
        }
        let op = StackOp::Swap(depth as u8);
        self.layout.apply(op)?;
        self.append_stack_op(op);
        Ok(())
    }

    /// Moves the top value into the lowest free slot, if there is one in reach.
    fn reuse_free_slot(&mut self) -> TResult<bool> {
        let top = self.layout.height().saturating_sub(1);
        match self.layout.lowest_free() {
            Some(free) if free < top && top - free <= MAX_STACK_ACCESS => {
                self.swap_top_with(free, None)?;
                self.pop_slot()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Rearranges the stack into `target`.
    fn reconcile(&mut self, target: &StackLayout, construct: &'static str) -> TResult {
        match stack::reconcile(&mut self.layout, target) {
            Ok(result) => {
                for op in result.ops {
                    self.append_stack_op(op);
                }
                Ok(())
            }
            Err(ShuffleError::TooDeep { slot, excess }) => {
                Err(self.too_deep(slot.var(), excess, "while joining control flow"))
            }
            Err(err) => Err(self.fault(construct, err.to_string())),
        }
    }

    /// Retires the variables of the current scope that have no further use and, if `pop` is set,
    /// discards free slots from the top.
    ///
    /// At the top level of a function body the parameters are retired as well.
    fn free_unused_variables(&mut self, pop: bool) -> TResult {
        if !self.optimize() {
            return Ok(());
        }
        let Some(frame) = self.scopes.current().copied() else { return Ok(()) };
        let tree = self.ctx.tree;
        let function_scope = match (&self.function, frame.kind) {
            (Some(function), FrameKind::FunctionBody) => Some(tree.function(function.id).scope),
            _ => None,
        };
        for scope in std::iter::once(frame.scope).chain(function_scope) {
            for var in tree.scope(scope).variables() {
                if self.layout.contains(var) && !self.ctx.liveness.has_future_use(var) {
                    trace!(var = %tree.variable(var).name, "retired");
                    self.layout.retire(var)?;
                }
            }
        }
        if pop {
            while self.layout.height() > self.pop_floor && self.layout.top() == Some(Slot::Free) {
                self.pop_slot()?;
            }
        }
        Ok(())
    }

    /// Opens the scope of `block` at the current height.
    fn enter_scope(&mut self, block: &Block, kind: FrameKind) -> TResult {
        let scope = self
            .ctx
            .tree
            .block_scope(block.id)
            .ok_or_else(|| self.fault("block", "block has no scope"))?;
        self.scopes.enter(scope, self.layout.height(), kind);
        Ok(())
    }

    /// Closes the innermost scope and restores its entry height.
    ///
    /// Function bodies are exempt from the height check: parameters may have been discarded and
    /// return variables pushed.
    fn finalize_block(&mut self) -> TResult {
        self.free_unused_variables(true)?;
        let frame = self.scopes.leave().ok_or_else(|| self.fault("block", "no active scope"))?;
        let tree = self.ctx.tree;
        let scope = tree.scope(frame.scope);
        if self.optimize() {
            if let Some(var) = scope.variables().find(|&var| self.layout.contains(var)) {
                let name = &tree.variable(var).name;
                return Err(self.fault("block", format!("`{name}` is still live at scope exit")));
            }
        } else {
            for var in scope.variables() {
                if self.layout.contains(var) {
                    self.layout.retire(var)?;
                }
            }
            while self.layout.height() > frame.base_height {
                self.pop_slot()?;
            }
        }
        if frame.kind != FrameKind::FunctionBody {
            self.expect_height(frame.base_height, "block")?;
        }
        Ok(())
    }
}

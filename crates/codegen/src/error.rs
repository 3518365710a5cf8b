use stackgen_ir::Span;
use std::fmt;

/// Code generation failure.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// One or more functions (or the top-level code) need more than 16 stack slots of reach.
    ///
    /// Every other function was still generated; the sink was marked invalid.
    #[error("{}", StackErrors(.0))]
    StackTooDeep(Vec<StackTooDeep>),
    /// A name was declared twice in the same scope.
    #[error("duplicate declaration of `{name}` at {span}")]
    DuplicateDeclaration { name: String, span: Span },
    /// An internal consistency check failed.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CodegenError {
    /// Returns the collected stack errors, if this is [`CodegenError::StackTooDeep`].
    pub fn stack_errors(&self) -> &[StackTooDeep] {
        match self {
            Self::StackTooDeep(errors) => errors,
            _ => &[],
        }
    }
}

struct StackErrors<'a>(&'a [StackTooDeep]);

impl fmt::Display for StackErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// A stack slot that has to be reached is more than 16 slots deep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackTooDeep {
    /// The function being generated, `None` for top-level code.
    pub function: Option<String>,
    /// The variable that could not be reached, if any.
    pub variable: Option<String>,
    /// How many slots too deep the access is.
    pub depth: usize,
    /// Additional context.
    pub comment: String,
    pub span: Span,
}

impl fmt::Display for StackTooDeep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.depth;
        match &self.variable {
            Some(var) => {
                write!(f, "variable `{var}` is {depth} slot(s) too deep inside the stack")?
            }
            None => write!(f, "stack too deep, {depth} slot(s) out of reach")?,
        }
        if let Some(function) = &self.function {
            write!(f, " in function `{function}`")?;
        }
        if !self.comment.is_empty() {
            write!(f, " ({})", self.comment)?;
        }
        if !self.span.is_dummy() {
            write!(f, " at {}", self.span)?;
        }
        Ok(())
    }
}

impl std::error::Error for StackTooDeep {}

/// An invariant of the code transform was violated.
///
/// This never depends on the input program alone; it points at a bug in this crate or in the
/// analysis that produced the input.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("internal error in {construct} at {span}: {message}")]
pub struct InternalError {
    /// The kind of construct that was being generated.
    pub construct: &'static str,
    pub message: String,
    pub span: Span,
}

impl InternalError {
    pub fn new(construct: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self { construct, message: message.into(), span }
    }
}

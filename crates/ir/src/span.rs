use std::fmt;

/// A byte range in the source the IR was produced from.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Span {
    /// A dummy span, used for generated code.
    pub const DUMMY: Self = Self { lo: 0, hi: 0 };

    /// Creates a new span. The bounds are swapped if `hi < lo`.
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        if hi < lo { Self { lo: hi, hi: lo } } else { Self { lo, hi } }
    }

    /// Returns `true` if this is the dummy span.
    #[inline]
    pub const fn is_dummy(self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// Returns a span that covers both `self` and `end`.
    #[inline]
    pub fn to(self, end: Self) -> Self {
        Self::new(self.lo.min(end.lo), self.hi.max(end.hi))
    }
}

/// An identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:?}", self.name, self.span)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Ident {
    #[inline]
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }

    /// Creates an identifier with a dummy span.
    #[inline]
    pub fn dummy(name: impl Into<String>) -> Self {
        Self::new(name, Span::DUMMY)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

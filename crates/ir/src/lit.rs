use crate::Span;
use alloy_primitives::U256;
use std::fmt;

/// A literal: `1`, `0x2a`, `true`, `"abc"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lit {
    pub span: Span,
    pub kind: LitKind,
}

/// A kind of literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LitKind {
    /// A decimal or hexadecimal number literal.
    Number(U256),
    /// `true` or `false`.
    Bool(bool),
    /// A string literal of at most 32 bytes.
    Str(Vec<u8>),
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LitKind::Number(n) => write!(f, "{n}"),
            LitKind::Bool(b) => write!(f, "{b}"),
            LitKind::Str(s) => write!(f, "\"{}\"", s.escape_ascii()),
        }
    }
}

impl Lit {
    pub fn new(kind: LitKind, span: Span) -> Self {
        Self { span, kind }
    }

    pub fn number(value: U256, span: Span) -> Self {
        Self::new(LitKind::Number(value), span)
    }

    /// Returns the word this literal pushes onto the stack.
    ///
    /// Strings are left-aligned; `None` if a string is longer than 32 bytes.
    pub fn to_u256(&self) -> Option<U256> {
        match &self.kind {
            LitKind::Number(n) => Some(*n),
            LitKind::Bool(b) => Some(U256::from(*b as u8)),
            LitKind::Str(s) => {
                if s.len() > 32 {
                    return None;
                }
                let mut word = [0u8; 32];
                word[..s.len()].copy_from_slice(s);
                Some(U256::from_be_bytes(word))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_values() {
        assert_eq!(Lit::number(U256::from(42), Span::DUMMY).to_u256(), Some(U256::from(42)));
        assert_eq!(Lit::new(LitKind::Bool(true), Span::DUMMY).to_u256(), Some(U256::from(1)));

        let s = Lit::new(LitKind::Str(b"ab".to_vec()), Span::DUMMY);
        assert_eq!(s.to_u256(), Some(U256::from(0x6162u64) << 240));

        let long = Lit::new(LitKind::Str(vec![b'x'; 33]), Span::DUMMY);
        assert_eq!(long.to_u256(), None);
    }
}

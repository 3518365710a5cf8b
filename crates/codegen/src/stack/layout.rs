//! The slot model of the operand stack.

use super::StackOp;
use crate::analysis::VarId;
use smallvec::SmallVec;
use std::fmt;

/// What occupies a stack slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The current value of a variable.
    Named(VarId),
    /// The return address of the function being generated.
    ReturnLabel,
    /// A transient value: an argument, a call result or a copy.
    Unnamed,
    /// The slot of a retired variable. Reused by later declarations or discarded once on top.
    Free,
}

impl Slot {
    /// Returns `true` for slots that junction layouts require at an exact position.
    pub const fn is_exact(self) -> bool {
        matches!(self, Self::Named(_) | Self::ReturnLabel)
    }

    pub const fn var(self) -> Option<VarId> {
        match self {
            Self::Named(var) => Some(var),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(var) => write!(f, "{var:?}"),
            Self::ReturnLabel => f.write_str("RET"),
            Self::Unnamed => f.write_str("_"),
            Self::Free => f.write_str("~"),
        }
    }
}

/// Bookkeeping violation on a [`StackLayout`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("stack underflow")]
    Underflow,
    #[error("popping the live variable {0:?}")]
    PopNamed(VarId),
    #[error("variable {0:?} is already bound to a slot")]
    AlreadyBound(VarId),
    #[error("variable {0:?} is not on the stack")]
    NotBound(VarId),
    #[error("depth {depth} is out of range for a stack of height {height}")]
    OutOfRange { depth: usize, height: usize },
}

/// The operand stack, bottom to top.
///
/// Positions count from the bottom (0 is the bottom slot), depths from the top (0 is the top
/// slot). Every live variable is bound to exactly one slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackLayout {
    slots: SmallVec<[Slot; 16]>,
}

impl StackLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a layout from slots listed bottom to top.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if a variable appears twice.
    pub fn from_slots(slots: impl IntoIterator<Item = Slot>) -> Self {
        let layout = Self { slots: slots.into_iter().collect() };
        debug_assert!(layout.bindings_are_unique(), "duplicate binding in {layout}");
        layout
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slots, bottom to top.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns the slot at position `pos` from the bottom.
    pub fn get(&self, pos: usize) -> Option<Slot> {
        self.slots.get(pos).copied()
    }

    pub fn top(&self) -> Option<Slot> {
        self.slots.last().copied()
    }

    /// Returns the slot `depth` slots below the top.
    pub fn peek(&self, depth: usize) -> Option<Slot> {
        self.height().checked_sub(depth + 1).and_then(|pos| self.get(pos))
    }

    pub fn push(&mut self, slot: Slot) -> Result<(), LayoutError> {
        if let Slot::Named(var) = slot
            && self.contains(var)
        {
            return Err(LayoutError::AlreadyBound(var));
        }
        self.slots.push(slot);
        Ok(())
    }

    pub fn push_unnamed(&mut self) {
        self.slots.push(Slot::Unnamed);
    }

    pub fn push_named(&mut self, var: VarId) -> Result<(), LayoutError> {
        self.push(Slot::Named(var))
    }

    /// Pops the top slot. Live variables have to be retired first.
    pub fn pop(&mut self) -> Result<Slot, LayoutError> {
        match self.top() {
            None => Err(LayoutError::Underflow),
            Some(Slot::Named(var)) => Err(LayoutError::PopNamed(var)),
            Some(_) => Ok(self.slots.pop().unwrap_or(Slot::Free)),
        }
    }

    pub fn pop_n(&mut self, count: usize) -> Result<(), LayoutError> {
        for _ in 0..count {
            self.pop()?;
        }
        Ok(())
    }

    /// Binds the slot `depth` slots below the top to `var`.
    ///
    /// If `var` was bound to another slot, that slot keeps the old value as [`Slot::Unnamed`].
    pub fn bind(&mut self, depth: usize, var: VarId) -> Result<(), LayoutError> {
        let pos = self.pos_of_depth(depth)?;
        if let Some(old) = self.position(var) {
            self.slots[old] = Slot::Unnamed;
        }
        self.slots[pos] = Slot::Named(var);
        Ok(())
    }

    /// Marks the slot of `var` as free.
    pub fn retire(&mut self, var: VarId) -> Result<(), LayoutError> {
        let pos = self.position(var).ok_or(LayoutError::NotBound(var))?;
        self.slots[pos] = Slot::Free;
        Ok(())
    }

    /// `DUPn`: pushes an unnamed copy of the slot `n - 1` below the top.
    pub fn dup(&mut self, n: u8) -> Result<(), LayoutError> {
        let depth = usize::from(n).saturating_sub(1);
        self.pos_of_depth(depth)?;
        self.slots.push(Slot::Unnamed);
        Ok(())
    }

    /// `SWAPn`: exchanges the top slot with the slot `n` below it.
    pub fn swap(&mut self, n: u8) -> Result<(), LayoutError> {
        let pos = self.pos_of_depth(usize::from(n))?;
        let top = self.height() - 1;
        self.slots.swap(pos, top);
        Ok(())
    }

    /// Mirrors `op` on the layout.
    pub fn apply(&mut self, op: StackOp) -> Result<(), LayoutError> {
        match op {
            StackOp::Dup(n) => self.dup(n),
            StackOp::Swap(n) => self.swap(n),
            StackOp::Pop => self.pop().map(drop),
        }
    }

    /// Returns the position of the lowest free slot.
    pub fn lowest_free(&self) -> Option<usize> {
        self.slots.iter().position(|&slot| slot == Slot::Free)
    }

    /// Returns the position of `var` from the bottom.
    pub fn position(&self, var: VarId) -> Option<usize> {
        self.position_of(Slot::Named(var))
    }

    pub(super) fn position_of(&self, slot: Slot) -> Option<usize> {
        self.slots.iter().position(|&s| s == slot)
    }

    /// Returns how many slots `var` is below the top.
    pub fn depth_of(&self, var: VarId) -> Option<usize> {
        self.position(var).map(|pos| self.height() - 1 - pos)
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.position(var).is_some()
    }

    /// Returns the variables bound in this layout, bottom to top.
    pub fn variables(&self) -> impl DoubleEndedIterator<Item = VarId> + '_ {
        self.slots.iter().filter_map(|slot| slot.var())
    }

    pub(super) fn set(&mut self, pos: usize, slot: Slot) {
        self.slots[pos] = slot;
    }

    fn pos_of_depth(&self, depth: usize) -> Result<usize, LayoutError> {
        let height = self.height();
        height.checked_sub(depth + 1).ok_or(LayoutError::OutOfRange { depth, height })
    }

    fn bindings_are_unique(&self) -> bool {
        self.variables().enumerate().all(|(i, var)| self.variables().skip(i + 1).all(|v| v != var))
    }
}

impl fmt::Display for StackLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{slot}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: u32) -> VarId {
        VarId::from_raw(i)
    }

    #[test]
    fn push_pop() {
        let mut layout = StackLayout::new();
        layout.push_named(v(0)).unwrap();
        layout.push_unnamed();
        assert_eq!(layout.height(), 2);
        assert_eq!(layout.top(), Some(Slot::Unnamed));
        assert_eq!(layout.pop(), Ok(Slot::Unnamed));

        // Live variables cannot be discarded.
        assert_eq!(layout.pop(), Err(LayoutError::PopNamed(v(0))));
        layout.retire(v(0)).unwrap();
        assert_eq!(layout.pop(), Ok(Slot::Free));
        assert_eq!(layout.pop(), Err(LayoutError::Underflow));
    }

    #[test]
    fn double_binding() {
        let mut layout = StackLayout::new();
        layout.push_named(v(0)).unwrap();
        assert_eq!(layout.push_named(v(0)), Err(LayoutError::AlreadyBound(v(0))));
        assert_eq!(layout.retire(v(1)), Err(LayoutError::NotBound(v(1))));
    }

    #[test]
    fn positions_and_depths() {
        let layout = StackLayout::from_slots([
            Slot::ReturnLabel,
            Slot::Named(v(0)),
            Slot::Free,
            Slot::Named(v(1)),
        ]);
        assert_eq!(layout.position(v(0)), Some(1));
        assert_eq!(layout.depth_of(v(0)), Some(2));
        assert_eq!(layout.depth_of(v(1)), Some(0));
        assert_eq!(layout.lowest_free(), Some(2));
        assert_eq!(layout.peek(3), Some(Slot::ReturnLabel));
        assert_eq!(layout.peek(4), None);
        assert_eq!(layout.variables().collect::<Vec<_>>(), [v(0), v(1)]);
        assert_eq!(layout.to_string(), "[RET v0 ~ v1]");
    }

    #[test]
    fn bind_moves_the_name() {
        let mut layout = StackLayout::from_slots([Slot::Named(v(0)), Slot::Unnamed]);
        layout.bind(0, v(0)).unwrap();
        assert_eq!(layout.slots(), [Slot::Unnamed, Slot::Named(v(0))]);
        assert_eq!(layout.bind(2, v(1)), Err(LayoutError::OutOfRange { depth: 2, height: 2 }));
    }

    #[test]
    fn dup_and_swap() {
        let mut layout = StackLayout::from_slots([Slot::Named(v(0)), Slot::Named(v(1))]);
        layout.apply(StackOp::Dup(2)).unwrap();
        assert_eq!(layout.slots(), [Slot::Named(v(0)), Slot::Named(v(1)), Slot::Unnamed]);
        layout.apply(StackOp::Swap(2)).unwrap();
        assert_eq!(layout.slots(), [Slot::Unnamed, Slot::Named(v(1)), Slot::Named(v(0))]);
        assert!(layout.apply(StackOp::Swap(3)).is_err());
        assert!(layout.apply(StackOp::Dup(4)).is_err());
        assert_eq!(layout.apply(StackOp::Pop), Err(LayoutError::PopNamed(v(0))));
    }
}

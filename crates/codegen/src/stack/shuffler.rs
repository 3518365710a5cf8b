//! Stack shuffler for layout transitions at control-flow junctions.
//!
//! The shuffler converts a source layout to a target layout using SWAP and POP only. The target's
//! named slots and its return label are exact requirements; its unnamed and free slots accept
//! anything that is not required elsewhere.
//!
//! ## Algorithm Overview
//!
//! Greedy and driven by the top of the stack:
//! 1. Retire named values that the target does not mention
//! 2. If the top belongs at another position, swap it there
//! 3. If the top belongs nowhere and the stack is too tall, pop it
//! 4. Otherwise bring the value of the lowest misplaced position to the top
//!
//! Don't-care positions finally take the target's slot kind, so reconciling twice is a no-op.

use super::{LayoutError, MAX_STACK_ACCESS, Slot, StackLayout, StackOp};

/// Result of a shuffle operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShuffleResult {
    /// The sequence of operations to perform.
    pub ops: Vec<StackOp>,
    /// Number of DUP operations.
    pub dup_count: usize,
    /// Number of SWAP operations.
    pub swap_count: usize,
    /// Number of POP operations.
    pub pop_count: usize,
}

impl ShuffleResult {
    /// Creates an empty shuffle result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no operations are needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn push(&mut self, op: StackOp) {
        match op {
            StackOp::Dup(_) => self.dup_count += 1,
            StackOp::Swap(_) => self.swap_count += 1,
            StackOp::Pop => self.pop_count += 1,
        }
        self.ops.push(op);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ShuffleError {
    /// A slot that has to move is out of reach.
    #[error("{slot} is {excess} slot(s) out of reach")]
    TooDeep { slot: Slot, excess: usize },
    /// The target cannot be reached by swapping and discarding.
    #[error("cannot shuffle {from} into {to}: {reason}")]
    Underivable { from: String, to: String, reason: &'static str },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Rearranges `layout` into `target` and returns the operations to emit.
///
/// On success `layout` equals `target` slot for slot.
pub fn reconcile(
    layout: &mut StackLayout,
    target: &StackLayout,
) -> Result<ShuffleResult, ShuffleError> {
    let from = layout.clone();
    let underivable = |reason| ShuffleError::Underivable {
        from: from.to_string(),
        to: target.to_string(),
        reason,
    };

    // Named values the target does not mention are dead on this edge.
    let dead: Vec<_> = layout.variables().filter(|&var| !target.contains(var)).collect();
    for var in dead {
        layout.retire(var)?;
    }

    if target.height() > layout.height() {
        return Err(underivable("target is taller"));
    }
    for &slot in target.slots().iter().filter(|slot| slot.is_exact()) {
        if layout.slots().iter().filter(|&&s| s == slot).count() != 1 {
            return Err(underivable("required slot is missing"));
        }
    }
    if layout.slots().contains(&Slot::ReturnLabel) && !target.slots().contains(&Slot::ReturnLabel)
    {
        return Err(underivable("return label would be discarded"));
    }

    let mut shuffler = Shuffler { layout, target, result: ShuffleResult::new() };
    let max_steps = 2 * (shuffler.layout.height() + 1) * (shuffler.layout.height() + 1);
    for _ in 0..max_steps {
        if shuffler.fits() {
            let result = shuffler.finish();
            if !result.is_empty() {
                trace!(%from, %target, ops = ?result.ops, "shuffled");
            }
            return Ok(result);
        }
        shuffler.step()?;
    }
    Err(underivable("no progress"))
}

struct Shuffler<'a> {
    layout: &'a mut StackLayout,
    target: &'a StackLayout,
    result: ShuffleResult,
}

impl Shuffler<'_> {
    fn fits(&self) -> bool {
        self.layout.height() == self.target.height()
            && self
                .target
                .slots()
                .iter()
                .zip(self.layout.slots())
                .all(|(want, have)| !want.is_exact() || want == have)
    }

    /// Where the slot at `pos` has to go, if anywhere.
    fn destination(&self, pos: usize) -> Option<usize> {
        let slot = self.layout.get(pos)?;
        if slot.is_exact() { self.target.position_of(slot) } else { None }
    }

    fn step(&mut self) -> Result<(), ShuffleError> {
        let height = self.layout.height();
        let top = height - 1;
        match self.destination(top) {
            Some(dst) if dst != top => return self.swap_top_with(dst),
            None if height > self.target.height() => return self.emit(StackOp::Pop),
            _ => {}
        }

        // The top is settled; fetch what belongs at the lowest misplaced position.
        let misplaced = self
            .target
            .slots()
            .iter()
            .zip(self.layout.slots())
            .position(|(want, have)| want.is_exact() && want != have);
        let Some(want) = misplaced.and_then(|pos| self.target.get(pos)) else {
            return Ok(());
        };
        match self.layout.position_of(want) {
            Some(src) => self.swap_top_with(src),
            None => Ok(()),
        }
    }

    fn swap_top_with(&mut self, pos: usize) -> Result<(), ShuffleError> {
        let depth = self.layout.height() - 1 - pos;
        if depth > MAX_STACK_ACCESS {
            let slot = self.layout.get(pos).unwrap_or(Slot::Unnamed);
            return Err(ShuffleError::TooDeep { slot, excess: depth - MAX_STACK_ACCESS });
        }
        self.emit(StackOp::Swap(depth as u8))
    }

    fn emit(&mut self, op: StackOp) -> Result<(), ShuffleError> {
        self.layout.apply(op)?;
        self.result.push(op);
        Ok(())
    }

    fn finish(self) -> ShuffleResult {
        for (pos, &slot) in self.target.slots().iter().enumerate() {
            if !slot.is_exact() {
                self.layout.set(pos, slot);
            }
        }
        self.result
    }
}

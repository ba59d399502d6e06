//! Bounded operand stack for one voice's program evaluation.
//!
//! The stack holds a guard band of four zeros below the logical bottom, so
//! stereo arithmetic that reaches two slots below the top reads silence on a
//! fresh stack instead of faulting. Programs must return the stack to
//! exactly the guard depth by their advance instruction; anything else is a
//! stack fault. Pushing past the fixed depth or popping through the guard
//! band faults immediately.

use crate::fault::Fault;

/// Guard zeros below the logical stack bottom.
pub(crate) const STACK_GUARD: usize = 4;
/// Logical operand depth above the guard.
pub(crate) const STACK_DEPTH: usize = 16;

const CAPACITY: usize = STACK_GUARD + STACK_DEPTH;

pub(crate) struct OperandStack {
    slots: [f32; CAPACITY],
    len: usize,
}

impl OperandStack {
    pub fn new() -> OperandStack {
        OperandStack {
            slots: [0.0; CAPACITY],
            len: STACK_GUARD,
        }
    }

    /// Reset to the guard baseline for the next voice.
    pub fn reset(&mut self) {
        self.slots[..STACK_GUARD].fill(0.0);
        self.len = STACK_GUARD;
    }

    pub fn push(&mut self, value: f32) -> Result<(), Fault> {
        if self.len == CAPACITY {
            return Err(Fault::STACK_OVERFLOW);
        }
        self.slots[self.len] = value;
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<f32, Fault> {
        if self.len == 0 {
            return Err(Fault::STACK_UNDERFLOW);
        }
        self.len -= 1;
        Ok(self.slots[self.len])
    }

    /// Read the slot `depth` positions below the top (0 = top).
    pub fn get(&self, depth: usize) -> Result<f32, Fault> {
        self.len
            .checked_sub(depth + 1)
            .map(|i| self.slots[i])
            .ok_or(Fault::STACK_UNDERFLOW)
    }

    /// Overwrite the slot `depth` positions below the top (0 = top).
    pub fn set(&mut self, depth: usize, value: f32) -> Result<(), Fault> {
        let i = self.len.checked_sub(depth + 1).ok_or(Fault::STACK_UNDERFLOW)?;
        self.slots[i] = value;
        Ok(())
    }

    /// A voice program is balanced when it ends at exactly the guard depth.
    pub fn is_balanced(&self) -> bool {
        self.len == STACK_GUARD
    }

    /// The fault describing how an unbalanced program went wrong.
    pub fn imbalance(&self) -> Fault {
        if self.len < STACK_GUARD {
            Fault::STACK_UNDERFLOW
        } else {
            Fault::STACK_OVERFLOW
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_balanced_with_zero_guard() {
        let stack = OperandStack::new();
        assert!(stack.is_balanced());
        assert_eq!(stack.get(0).unwrap(), 0.0);
        assert_eq!(stack.get(3).unwrap(), 0.0);
    }

    #[test]
    fn push_pop_roundtrip() {
        let mut stack = OperandStack::new();
        stack.push(1.5).unwrap();
        stack.push(-2.0).unwrap();
        assert!(!stack.is_balanced());
        assert_eq!(stack.pop().unwrap(), -2.0);
        assert_eq!(stack.pop().unwrap(), 1.5);
        assert!(stack.is_balanced());
    }

    #[test]
    fn overflow_is_a_fault() {
        let mut stack = OperandStack::new();
        for i in 0..STACK_DEPTH {
            stack.push(i as f32).unwrap();
        }
        assert_eq!(stack.push(99.0), Err(Fault::STACK_OVERFLOW));
    }

    #[test]
    fn popping_through_the_guard_is_a_fault() {
        let mut stack = OperandStack::new();
        for _ in 0..STACK_GUARD {
            stack.pop().unwrap(); // guard zeros are consumable
        }
        assert_eq!(stack.pop(), Err(Fault::STACK_UNDERFLOW));
        assert_eq!(stack.imbalance(), Fault::STACK_UNDERFLOW);
    }

    #[test]
    fn residue_reports_overflow_imbalance() {
        let mut stack = OperandStack::new();
        stack.push(1.0).unwrap();
        assert!(!stack.is_balanced());
        assert_eq!(stack.imbalance(), Fault::STACK_OVERFLOW);
    }
}

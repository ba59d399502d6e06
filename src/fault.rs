//! Non-fatal anomaly reporting for the render path.
//!
//! The engine never aborts on a malformed or adversarial program; it contains
//! the damage to the offending voice and tick, keeps rendering, and reports
//! what happened through this bitfield. Caller policy decides whether a
//! nonzero fault stops playback or is merely logged.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bitfield of fault conditions observed during a render call.
///
/// Multiple simultaneous faults are representable; a clean render returns
/// [`Fault::empty`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fault(u16);

impl Fault {
    /// Operand stack dropped below its baseline.
    pub const STACK_UNDERFLOW: Fault = Fault(1 << 0);
    /// Operand stack exceeded its fixed depth, or a voice program left
    /// residue on the stack at its advance instruction.
    pub const STACK_OVERFLOW: Fault = Fault(1 << 1);
    /// A non-finite value (NaN/Inf) reached a sink commit.
    pub const NONFINITE: Fault = Fault(1 << 2);
    /// A kernel attempted to divide by a zero parameter.
    pub const DIV_BY_ZERO: Fault = Fault(1 << 3);
    /// Opcode byte does not name any registered kernel.
    pub const BAD_OPCODE: Fault = Fault(1 << 4);
    /// Opcode or operand stream ended mid-instruction.
    pub const BAD_OPERANDS: Fault = Fault(1 << 5);
    /// Index into voices, units, buses, delay workspaces, delay times or
    /// sample data was out of range.
    pub const BAD_INDEX: Fault = Fault(1 << 6);

    pub const fn empty() -> Fault {
        Fault(0)
    }

    pub const fn is_clean(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Fault) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit pattern, for callers that log or compare fault codes.
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for Fault {
    type Output = Fault;

    fn bitor(self, rhs: Fault) -> Fault {
        Fault(self.0 | rhs.0)
    }
}

impl BitOrAssign for Fault {
    fn bitor_assign(&mut self, rhs: Fault) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "clean");
        }
        const NAMES: [(Fault, &str); 7] = [
            (Fault::STACK_UNDERFLOW, "stack-underflow"),
            (Fault::STACK_OVERFLOW, "stack-overflow"),
            (Fault::NONFINITE, "nonfinite"),
            (Fault::DIV_BY_ZERO, "div-by-zero"),
            (Fault::BAD_OPCODE, "bad-opcode"),
            (Fault::BAD_OPERANDS, "bad-operands"),
            (Fault::BAD_INDEX, "bad-index"),
        ];
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

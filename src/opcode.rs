//! The closed opcode set of the virtual machine.
//!
//! An opcode byte encodes the kernel id in its upper seven bits and a stereo
//! flag in its lowest bit (`byte = id * 2 + stereo`). Byte 0 is the `advance`
//! instruction that ends one voice's program. The id set is fixed at compile
//! time of the engine, so dispatch is a plain `match` rather than any kind of
//! virtual call.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Marks the end of a voice program in the opcode stream.
pub const ADVANCE: u8 = 0;

/// Kernel identifier, one per unit type the compiler can emit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Add = 1,
    Addp = 2,
    Aux = 3,
    Clip = 4,
    Compressor = 5,
    Crush = 6,
    Dbgain = 7,
    Delay = 8,
    Distort = 9,
    Envelope = 10,
    Filter = 11,
    Gain = 12,
    Hold = 13,
    In = 14,
    Invgain = 15,
    Loadnote = 16,
    Loadval = 17,
    Mul = 18,
    Mulp = 19,
    Noise = 20,
    Oscillator = 21,
    Out = 22,
    Outaux = 23,
    Pan = 24,
    Pop = 25,
    Push = 26,
    Receive = 27,
    Send = 28,
    Speed = 29,
    Sync = 30,
    Xch = 31,
    Eq = 32,
}

/// The four-and-a-half kernel families of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Pure stack manipulation.
    Arithmetic,
    /// Pushes a newly computed value (oscillator, envelope, noise, ...).
    Source,
    /// Pops one or two operands, transforms through persistent state.
    Effect,
    /// Alters evaluation itself (row speed, sync points).
    Flow,
    /// Accumulates popped values into the shared output buses.
    Sink,
}

impl Opcode {
    /// Decode a kernel id (the opcode byte shifted right by one).
    /// Unknown ids return `None`; the interpreter reports them as a
    /// [`crate::Fault::BAD_OPCODE`] instead of panicking.
    pub const fn from_id(id: u8) -> Option<Opcode> {
        Some(match id {
            1 => Opcode::Add,
            2 => Opcode::Addp,
            3 => Opcode::Aux,
            4 => Opcode::Clip,
            5 => Opcode::Compressor,
            6 => Opcode::Crush,
            7 => Opcode::Dbgain,
            8 => Opcode::Delay,
            9 => Opcode::Distort,
            10 => Opcode::Envelope,
            11 => Opcode::Filter,
            12 => Opcode::Gain,
            13 => Opcode::Hold,
            14 => Opcode::In,
            15 => Opcode::Invgain,
            16 => Opcode::Loadnote,
            17 => Opcode::Loadval,
            18 => Opcode::Mul,
            19 => Opcode::Mulp,
            20 => Opcode::Noise,
            21 => Opcode::Oscillator,
            22 => Opcode::Out,
            23 => Opcode::Outaux,
            24 => Opcode::Pan,
            25 => Opcode::Pop,
            26 => Opcode::Push,
            27 => Opcode::Receive,
            28 => Opcode::Send,
            29 => Opcode::Speed,
            30 => Opcode::Sync,
            31 => Opcode::Xch,
            32 => Opcode::Eq,
            _ => return None,
        })
    }

    /// The opcode byte for this kernel, mono or stereo variant.
    pub const fn byte(self, stereo: bool) -> u8 {
        (self as u8) * 2 + stereo as u8
    }

    /// Number of modulatable parameter bytes this opcode consumes from the
    /// operand stream. Each byte is resolved to `byte/128 + port` before the
    /// kernel runs.
    pub const fn param_count(self) -> usize {
        match self {
            Opcode::Add
            | Opcode::Addp
            | Opcode::Clip
            | Opcode::In
            | Opcode::Loadnote
            | Opcode::Mul
            | Opcode::Mulp
            | Opcode::Pop
            | Opcode::Push
            | Opcode::Receive
            | Opcode::Speed
            | Opcode::Sync
            | Opcode::Xch => 0,
            Opcode::Aux
            | Opcode::Crush
            | Opcode::Dbgain
            | Opcode::Distort
            | Opcode::Gain
            | Opcode::Hold
            | Opcode::Invgain
            | Opcode::Loadval
            | Opcode::Out
            | Opcode::Pan
            | Opcode::Send => 1,
            Opcode::Filter | Opcode::Noise | Opcode::Outaux => 2,
            Opcode::Eq => 3,
            Opcode::Delay => 4,
            Opcode::Compressor | Opcode::Envelope => 5,
            Opcode::Oscillator => 6,
        }
    }

    /// Number of raw trailing bytes (flags, channel selectors, addresses)
    /// consumed after the parameters.
    pub const fn tail_count(self) -> usize {
        match self {
            Opcode::Aux | Opcode::In | Opcode::Filter | Opcode::Oscillator => 1,
            Opcode::Delay | Opcode::Send => 2,
            _ => 0,
        }
    }

    pub const fn category(self) -> Category {
        match self {
            Opcode::Add
            | Opcode::Addp
            | Opcode::Mul
            | Opcode::Mulp
            | Opcode::Push
            | Opcode::Pop
            | Opcode::Xch
            | Opcode::Loadnote => Category::Arithmetic,
            Opcode::Envelope
            | Opcode::Noise
            | Opcode::Oscillator
            | Opcode::Loadval
            | Opcode::Receive
            | Opcode::In => Category::Source,
            Opcode::Distort
            | Opcode::Hold
            | Opcode::Crush
            | Opcode::Gain
            | Opcode::Invgain
            | Opcode::Dbgain
            | Opcode::Clip
            | Opcode::Filter
            | Opcode::Pan
            | Opcode::Delay
            | Opcode::Compressor
            | Opcode::Eq => Category::Effect,
            Opcode::Speed | Opcode::Sync => Category::Flow,
            Opcode::Out | Opcode::Outaux | Opcode::Aux | Opcode::Send => Category::Sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrip() {
        for id in 1..=32u8 {
            let op = Opcode::from_id(id).expect("id in closed set");
            assert_eq!(op as u8, id);
            assert_eq!(op.byte(false) >> 1, id);
            assert_eq!(op.byte(true), op.byte(false) + 1);
        }
        assert_eq!(Opcode::from_id(0), None);
        assert_eq!(Opcode::from_id(33), None);
        assert_eq!(Opcode::from_id(255), None);
    }

    #[test]
    fn sink_opcodes_are_sinks() {
        for op in [Opcode::Out, Opcode::Outaux, Opcode::Aux, Opcode::Send] {
            assert_eq!(op.category(), Category::Sink);
        }
        assert_eq!(Opcode::Oscillator.category(), Category::Source);
        assert_eq!(Opcode::Speed.category(), Category::Flow);
    }
}

//! The compiled program consumed by the engine.
//!
//! The engine does not compile anything itself: an external compiler hands it
//! an opcode byte stream, an operand byte stream, a voice count, a polyphony
//! bitmask, and optional delay-time and sample-offset tables. Everything is
//! validated against the fixed capacities once, at load time; the render path
//! never grows or reallocates any of it.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{MAX_OPCODES, MAX_OPERANDS, MAX_VOICES};

/// Delay-time table capacity, in entries. Generous enough for every delay
/// unit of a full 32-voice patch to use distinct times.
pub const MAX_DELAY_TIMES: usize = 768;
/// Sample-offset table capacity. Sample oscillators address the table with a
/// single operand byte, so 256 is also the hard addressing limit.
pub const MAX_SAMPLE_OFFSETS: usize = 256;

/// Start offset and loop points of one entry in the sample bank, in 16-bit
/// words. Read-only reference data for sample-playback oscillators.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleOffset {
    pub start: u32,
    pub loop_start: u16,
    pub loop_len: u16,
}

/// Structural problems detected when loading a program. These are caller
/// errors, distinct from the runtime [`crate::Fault`] bitfield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// More voices requested than the fixed 32 slots.
    TooManyVoices(u32),
    /// Opcode stream longer than its fixed capacity.
    OpcodeStreamTooLong(usize),
    /// Operand stream longer than its fixed capacity.
    OperandStreamTooLong(usize),
    /// Delay-time table longer than its fixed capacity.
    DelayTableTooLong(usize),
    /// Sample-offset table longer than its fixed capacity.
    SampleTableTooLong(usize),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::TooManyVoices(n) => {
                write!(f, "program uses {n} voices, the engine supports at most {MAX_VOICES}")
            }
            ProgramError::OpcodeStreamTooLong(n) => {
                write!(f, "opcode stream of {n} bytes exceeds capacity {MAX_OPCODES}")
            }
            ProgramError::OperandStreamTooLong(n) => {
                write!(f, "operand stream of {n} bytes exceeds capacity {MAX_OPERANDS}")
            }
            ProgramError::DelayTableTooLong(n) => {
                write!(f, "delay-time table of {n} entries exceeds capacity {MAX_DELAY_TIMES}")
            }
            ProgramError::SampleTableTooLong(n) => {
                write!(f, "sample-offset table of {n} entries exceeds capacity {MAX_SAMPLE_OFFSETS}")
            }
        }
    }
}

impl std::error::Error for ProgramError {}

/// One compiled instruction stream plus its lookup tables.
///
/// All voices of the same part execute the same byte ranges of `opcodes` and
/// `operands`; the polyphony bitmask tells the interpreter when to rewind the
/// stream pointers for the next voice instead of moving on.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) opcodes: Box<[u8]>,
    pub(crate) operands: Box<[u8]>,
    pub(crate) num_voices: u32,
    pub(crate) polyphony_bitmask: u32,
    pub(crate) delay_times: Box<[u16]>,
    pub(crate) sample_offsets: Box<[SampleOffset]>,
}

impl Program {
    pub fn new(
        opcodes: &[u8],
        operands: &[u8],
        num_voices: u32,
        polyphony_bitmask: u32,
    ) -> Result<Program, ProgramError> {
        if num_voices as usize > MAX_VOICES {
            return Err(ProgramError::TooManyVoices(num_voices));
        }
        if opcodes.len() > MAX_OPCODES {
            return Err(ProgramError::OpcodeStreamTooLong(opcodes.len()));
        }
        if operands.len() > MAX_OPERANDS {
            return Err(ProgramError::OperandStreamTooLong(operands.len()));
        }
        Ok(Program {
            opcodes: opcodes.into(),
            operands: operands.into(),
            num_voices,
            polyphony_bitmask,
            delay_times: Box::from([]),
            sample_offsets: Box::from([]),
        })
    }

    /// Attach the delay-time lookup table referenced by delay units.
    pub fn with_delay_times(mut self, times: &[u16]) -> Result<Program, ProgramError> {
        if times.len() > MAX_DELAY_TIMES {
            return Err(ProgramError::DelayTableTooLong(times.len()));
        }
        self.delay_times = times.into();
        Ok(self)
    }

    /// Attach the sample-offset table referenced by sample oscillators.
    pub fn with_sample_offsets(mut self, offsets: &[SampleOffset]) -> Result<Program, ProgramError> {
        if offsets.len() > MAX_SAMPLE_OFFSETS {
            return Err(ProgramError::SampleTableTooLong(offsets.len()));
        }
        self.sample_offsets = offsets.into();
        Ok(self)
    }

    pub fn num_voices(&self) -> u32 {
        self.num_voices
    }

    pub fn opcodes(&self) -> &[u8] {
        &self.opcodes
    }

    pub fn operands(&self) -> &[u8] {
        &self.operands
    }
}

/// Build the polyphony bitmask from per-part voice widths.
///
/// For each part, `width - 1` one-bits mean "the next voice reruns the same
/// program", followed by a zero-bit meaning "the next voice starts the next
/// part's program". The interpreter tests bit `1 << voices_remaining` after
/// each advance.
pub fn polyphony_bitmask(voices_per_part: &[u32]) -> u32 {
    let mut mask = 0u32;
    for &width in voices_per_part {
        for _ in 1..width {
            mask = (mask << 1) | 1;
        }
        mask <<= 1;
    }
    mask
}

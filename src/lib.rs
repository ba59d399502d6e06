pub mod bytecode; // Compiled instruction stream consumed from an external compiler
pub mod dsp; // Allocation-free kernel math
pub mod fault;
pub mod io;
pub mod opcode;
pub mod render;
pub mod state;
pub mod synth; // Voice management and polyphony
mod vm;

pub use bytecode::{Program, ProgramError, SampleOffset};
pub use fault::Fault;
pub use render::{RenderResult, RenderStatus};
pub use synth::Synth;

/// Physical voice slots available to the whole engine.
pub const MAX_VOICES: usize = 32;
/// Stack-machine nodes per voice program.
pub const MAX_UNITS: usize = 63;
/// Independent delay workspaces addressable by delay units.
pub const MAX_DELAY_LINES: usize = 64;
/// Circular buffer length of one delay workspace, in samples.
pub const DELAY_BUFFER_LEN: usize = 65536;
/// Bus accumulators: left, right, and six auxiliary sends.
pub const NUM_BUSES: usize = 8;
/// Capacity of the opcode byte stream.
pub const MAX_OPCODES: usize = MAX_VOICES * 64;
/// Capacity of the operand byte stream.
pub const MAX_OPERANDS: usize = MAX_OPCODES * 8;

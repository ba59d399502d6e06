//! The program interpreter: a bounded operand stack and the per-sample
//! evaluation pass that dispatches opcodes to their kernels.

pub(crate) mod interp;
pub(crate) mod stack;

pub(crate) use interp::{run_sample, SampleOutput};

//! Low-level kernel math used by the program interpreter.
//!
//! These functions are allocation-free and realtime-safe: they operate on
//! unit state slots passed in by reference and never touch anything beyond
//! their arguments. The interpreter layers stack discipline, port resolution
//! and fault containment on top.
//!
//! The numeric formulas are a versioned contract matched against reference
//! output within a 1e-3 per-sample tolerance, not something to re-derive.

/// Power-follower dynamics compressor.
pub mod compressor;
/// Damped feedback delay workspaces with DC blocking.
pub mod delay;
/// Attack/decay/sustain/release stepping over two unit state slots.
pub mod envelope;
/// Peaking biquad equalizer.
pub mod eq;
/// State-variable filter with sign-selectable output taps.
pub mod filter;
/// Oscillator waveforms, pitch mapping and unison detune.
pub mod oscillator;
/// Stateless waveshaping helpers shared by several kernels.
pub mod shape;

pub use delay::DelayWorkspace;

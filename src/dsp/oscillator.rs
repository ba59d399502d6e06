//! Oscillator waveforms and pitch mapping.
//!
//! An oscillator unit's flags byte selects the waveform (one-hot bits),
//! whether it runs at audio rate or LFO rate, and the unison count in the
//! two low bits. The phase accumulator lives in the unit's state slots; this
//! module only provides the pure math, the interpreter owns the state
//! threading and the sample-playback table lookups.

use std::f32::consts::TAU;

/// Unison voice count mask (0..3 extra detuned copies).
pub const UNISON_MASK: u8 = 0x03;
/// Gate "waveform": pattern bits stepped by the phase accumulator.
pub const FLAG_GATE: u8 = 0x04;
/// LFO rate instead of audio rate; the voice note is ignored.
pub const FLAG_LFO: u8 = 0x08;
pub const FLAG_PULSE: u8 = 0x10;
pub const FLAG_TRISAW: u8 = 0x20;
pub const FLAG_SINE: u8 = 0x40;
/// Sample playback through the program's sample-offset table.
pub const FLAG_SAMPLE: u8 = 0x80;

/// Phase increment per sample for a pitch in semitones.
///
/// The audio-rate scaling constant puts middle C where it belongs at the
/// nominal 44.1 kHz rate; the LFO constant is a historical value that lands
/// usable modulation rates.
pub fn omega(pitch_semitones: f64, lfo: bool) -> f64 {
    let octaves = pitch_semitones * 0.083333333333;
    let scale = if lfo { 0.000038 } else { 0.000092696138 };
    octaves.exp2() * scale
}

/// Wrap a phase accumulator back into [0, 1).
pub fn wrap_phase(phase: f32) -> f32 {
    phase - ((phase + 1.0) as i32 - 1) as f32
}

/// Evaluate the selected geometric waveform at `phase` in [0, 1).
/// `color` skews the shape: sine active fraction, trisaw ramp split point,
/// pulse duty cycle.
pub fn waveform(flags: u8, phase: f32, color: f32) -> f32 {
    if flags & FLAG_SINE != 0 {
        if phase < color {
            (TAU * (phase / color)).sin()
        } else {
            0.0
        }
    } else if flags & FLAG_TRISAW != 0 {
        let (mut phase, mut color) = (phase, color);
        if phase >= color {
            phase = 1.0 - phase;
            color = 1.0 - color;
        }
        phase / color * 2.0 - 1.0
    } else if flags & FLAG_PULSE != 0 {
        if phase >= color {
            -1.0
        } else {
            1.0
        }
    } else {
        0.0
    }
}

/// One step of the gate pattern: pick bit `phase * 16` from the 16-bit mask
/// and low-pass it slightly against the previous output to soften clicks.
pub fn gate_step(smooth_state: &mut f32, phase: f32, gate_bits: u16) -> f32 {
    let bit_index = ((phase * 16.0 + 0.5) as i32 & 15) as u16;
    let mut amplitude = ((gate_bits >> bit_index) & 1) as f32;
    amplitude += 0.99609375 * (*smooth_state - amplitude);
    *smooth_state = amplitude;
    amplitude
}

//! Peaking equalizer: one biquad per channel in transposed direct form II,
//! coefficients recomputed from the parameters each sample so they can be
//! modulated freely.

use std::f64::consts::PI;

/// Advance the biquad one sample. `z1`/`z2` are the unit's state slots.
/// Parameters map 0..1 onto 32..16000 Hz center frequency, 0.1..10 Q and
/// -12..+12 dB of gain, referenced to the nominal 44.1 kHz rate.
pub fn eq_step(z1: &mut f32, z2: &mut f32, input: f32, freq: f32, q: f32, gain: f32) -> f32 {
    let center = 32.0 * (16000.0f64 / 32.0).powf(freq as f64);
    let omega = 2.0 * PI * center / 44100.0;
    let alpha = (omega.sin() / (2.0 * (q as f64 * 9.9 + 0.1))) as f32;
    let db = (gain * 24.0 - 12.0) as f64;
    let a = 10.0f64.powf(db / 20.0) as f32;
    let den = 1.0 + alpha / a;

    let b0 = (1.0 + alpha * a) / den;
    let b1 = (-2.0 * omega.cos() as f32) / den;
    let b2 = (1.0 - alpha * a) / den;
    let a2 = (1.0 - alpha / a) / den;

    let output = b0 * input + *z1;
    *z1 = b1 * input - b1 * output + *z2;
    *z2 = b2 * input - a2 * output;
    output
}

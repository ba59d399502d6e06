//! Power-follower compressor gain computation.
//!
//! The unit squares its input to estimate signal power, smooths it with
//! separate attack and release coefficients, and computes a gain that pulls
//! the level back toward the threshold once exceeded. The kernel pushes the
//! gain onto the stack rather than applying it, so a program can route the
//! same gain to several signals (classic sidechain).

use crate::dsp::shape::nonlinear_map;

/// Advance the level follower (unit state slot 0) and return the
/// uncompensated gain. `ratio` is the exponent parameter: 0 leaves the
/// signal alone, 1 is full limiting at the threshold.
pub fn compressor_gain(level: &mut f32, power: f32, attack: f32, release: f32, threshold: f32, ratio: f32) -> f32 {
    let alpha = if power < *level {
        nonlinear_map(release)
    } else {
        nonlinear_map(attack)
    };
    *level += (power - *level) * alpha;

    let threshold2 = threshold * threshold;
    if *level > threshold2 {
        (threshold2 / *level).powf(ratio / 2.0)
    } else {
        1.0
    }
}

//! Stateless waveshaping helpers shared by distort, crush, noise and the
//! envelope/compressor time mappings.

/// Variable-hardness waveshaper. `amount = 0.5` is the identity; lower
/// values compress toward zero, higher values push toward a square.
pub fn waveshape(value: f32, amount: f32) -> f32 {
    value * amount / (1.0 - amount + (2.0 * amount - 1.0) * value.abs())
}

/// Map a 0..1 parameter onto an exponential 2^0 .. 2^-24 range. Used for
/// envelope increments and compressor smoothing so that knob travel feels
/// roughly linear in time.
pub fn nonlinear_map(value: f32) -> f32 {
    (-24.0 * value).exp2()
}

/// Hard-clip to [-1, 1].
pub fn clip(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Bit-crush by quantizing to steps of `nonlinear_map(amount)`.
pub fn crush(value: f32, amount: f32) -> f32 {
    let step = nonlinear_map(amount);
    (value / step).round() * step
}

/// Map a 0..1 parameter onto a gain of roughly -40..+40 dB.
pub fn db_gain(value: f32) -> f32 {
    ((value * 2.0 - 1.0) * 6.643856189774724).exp2()
}

//! Chamberlin state-variable filter.
//!
//! One integrator pair per channel lives in the unit's state slots; the
//! flags byte selects which taps (low, band, high) are summed into the
//! output, with negative band/high taps available for notch and allpass
//! style responses.

pub const FLAG_LOWPASS: u8 = 0x40;
pub const FLAG_BANDPASS: u8 = 0x20;
pub const FLAG_HIGHPASS: u8 = 0x10;
pub const FLAG_NEG_BANDPASS: u8 = 0x08;
pub const FLAG_NEG_HIGHPASS: u8 = 0x04;

/// Advance the filter one sample. `freq2` is the squared frequency
/// parameter (the square makes low cutoffs controllable), `res` the
/// resonance damping.
pub fn svf_step(low: &mut f32, band: &mut f32, input: f32, freq2: f32, res: f32, flags: u8) -> f32 {
    *low += freq2 * *band;
    let high = input - *low - res * *band;
    *band += freq2 * high;

    let mut output = 0.0;
    if flags & FLAG_LOWPASS != 0 {
        output += *low;
    }
    if flags & FLAG_BANDPASS != 0 {
        output += *band;
    }
    if flags & FLAG_HIGHPASS != 0 {
        output += high;
    }
    if flags & FLAG_NEG_BANDPASS != 0 {
        output -= *band;
    }
    if flags & FLAG_NEG_HIGHPASS != 0 {
        output -= high;
    }
    output
}

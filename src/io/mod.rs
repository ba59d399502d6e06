//! Boundary helpers for platform audio sinks.
//!
//! The engine renders 32-bit float internally; devices negotiated for 16-bit
//! signed PCM get a clamped, rounded conversion. Nothing here is used on the
//! render path itself.

/// Convert one float sample to 16-bit signed PCM, clamping to full scale.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Convert a rendered float buffer into an equally sized PCM buffer.
/// Panics if the lengths differ; the caller owns buffer sizing.
pub fn write_i16(src: &[f32], dst: &mut [i16]) {
    assert_eq!(src.len(), dst.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d = f32_to_i16(*s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_and_silence() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
    }

    #[test]
    fn out_of_range_input_clamps() {
        assert_eq!(f32_to_i16(3.5), 32767);
        assert_eq!(f32_to_i16(-2.0), -32767);
        assert_eq!(f32_to_i16(f32::INFINITY), 32767);
    }

    #[test]
    fn buffer_conversion() {
        let src = [0.5f32, -0.5];
        let mut dst = [0i16; 2];
        write_i16(&src, &mut dst);
        assert_eq!(dst, [16384, -16384]);
    }
}

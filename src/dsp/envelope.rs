//! ADSR envelope stepping.
//!
//! The envelope keeps its whole runtime state in two unit state slots: the
//! stage (stored as a float because unit slots are floats) and the current
//! level. Attack ramps to 1, decay falls to the sustain level, and dropping
//! the gate forces the release stage from wherever the level currently is.
//! Rates go through [`nonlinear_map`] so parameter travel is exponential in
//! time; a rate parameter of 0 jumps in a single sample, 1 takes 2^24
//! samples.
//!
//! The engine never silences a voice itself; a released envelope decaying to
//! zero is what makes a voice inaudible, and voice reuse is the polyphony
//! manager's decision.

use crate::dsp::shape::nonlinear_map;

pub const STAGE_ATTACK: f32 = 0.0;
pub const STAGE_DECAY: f32 = 1.0;
pub const STAGE_SUSTAIN: f32 = 2.0;
pub const STAGE_RELEASE: f32 = 3.0;

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub gain: f32,
}

/// Advance the envelope by one sample and return its output level scaled by
/// the gain parameter. `stage` and `level` are the unit's state slots 0
/// and 1.
pub fn envelope_step(stage: &mut f32, level: &mut f32, gate: bool, p: &EnvelopeParams) -> f32 {
    if !gate {
        *stage = STAGE_RELEASE;
    }
    if *stage == STAGE_ATTACK {
        *level += nonlinear_map(p.attack);
        if *level >= 1.0 {
            *level = 1.0;
            *stage = STAGE_DECAY;
        }
    } else if *stage == STAGE_DECAY {
        *level -= nonlinear_map(p.decay);
        if *level <= p.sustain {
            *level = p.sustain;
        }
    } else if *stage == STAGE_RELEASE {
        *level -= nonlinear_map(p.release);
        if *level <= 0.0 {
            *level = 0.0;
        }
    }
    *level * p.gain
}

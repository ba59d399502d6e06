//! Fixed-capacity audio state.
//!
//! Everything a render call touches lives here or in the delay workspaces:
//! voices with their per-unit persistent state, the bus accumulators, the
//! deterministic noise seed and the row/time counters. The whole aggregate is
//! sized at construction and never grows; all indexing against it is
//! bounds-checked by the interpreter and reported as faults.

use crate::{MAX_UNITS, MAX_VOICES, NUM_BUSES};

/// One stack-machine node: 8 persistent state slots (filter memory, envelope
/// phase, held samples, ...) and 8 ports that modulation `send` units write
/// into. Ports are consumed and zeroed every time the unit's parameters are
/// resolved; state slots persist across samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub state: [f32; 8],
    pub ports: [f32; 8],
}

impl Unit {
    pub const ZEROED: Unit = Unit {
        state: [0.0; 8],
        ports: [0.0; 8],
    };
}

/// One polyphonic voice: the note it plays, its sustain gate, 8 input
/// registers holding the resolved parameters of the unit currently being
/// evaluated, and the persistent state of up to 63 units.
///
/// All voices of a part run the same program bytes but keep independent unit
/// state, which is the whole point of polyphony here.
#[derive(Debug, Clone)]
pub struct Voice {
    pub note: u8,
    pub sustain: bool,
    pub inputs: [f32; 8],
    pub units: [Unit; MAX_UNITS],
}

impl Voice {
    pub fn zeroed() -> Voice {
        Voice {
            note: 0,
            sustain: false,
            inputs: [0.0; 8],
            units: [Unit::ZEROED; MAX_UNITS],
        }
    }

    /// Retrigger: wipe unit state, set the note and raise the sustain gate.
    /// The documented policy is a full state reset so repeated notes attack
    /// cleanly instead of inheriting filter and envelope memory.
    pub fn trigger(&mut self, note: u8) {
        *self = Voice::zeroed();
        self.note = note;
        self.sustain = true;
    }

    /// Lower the sustain gate. The voice keeps rendering (and consuming CPU)
    /// until its envelope decays on its own; the engine never silences a
    /// voice based on amplitude.
    pub fn release(&mut self) {
        self.sustain = false;
    }
}

/// The top-level mutable aggregate owned by one engine instance.
///
/// Heap-backed because 32 voices of unit state are ~0.5 MB, but the backing
/// slices are allocated once and never resized. Exclusively owned by the
/// rendering thread for the duration of a render call; there is no internal
/// locking.
#[derive(Debug, Clone)]
pub struct SynthState {
    pub voices: Box<[Voice]>,
    /// Bus accumulators: 0 = left, 1 = right, 2..8 = aux sends.
    pub buses: [f32; NUM_BUSES],
    /// Linear-congruential noise state. Zero stays zero forever, which
    /// effectively disables noise-derived sources; callers should seed with
    /// a nonzero value (1 is the conventional default).
    pub rand_seed: u32,
    /// Samples rendered since the engine started.
    pub global_tick: u32,
    /// Time ticks elapsed within the current row; reset when a row boundary
    /// is returned to the caller. Advances by more or less than one per
    /// sample under `speed` modulation.
    pub row_tick: u32,
    /// Nominal row length in ticks. Zero is the degenerate infinite-row
    /// guard: the driver renders nothing at all.
    pub samples_per_row: u32,
}

impl SynthState {
    pub fn new(seed: u32) -> SynthState {
        SynthState {
            voices: (0..MAX_VOICES).map(|_| Voice::zeroed()).collect(),
            buses: [0.0; NUM_BUSES],
            rand_seed: seed,
            global_tick: 0,
            row_tick: 0,
            samples_per_row: 0,
        }
    }

    /// Advance the shared noise generator. Deterministic: identical seeds
    /// and programs render bit-identical output.
    pub fn next_rand(&mut self) -> f32 {
        self.rand_seed = self.rand_seed.wrapping_mul(16007);
        self.rand_seed as i32 as f32 / -2147483648.0
    }
}

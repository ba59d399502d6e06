//! The public engine facade and the voice/polyphony manager.

pub mod message;
pub mod parts;

use crate::bytecode::Program;
use crate::dsp::DelayWorkspace;
use crate::state::SynthState;
use crate::synth::message::{MessageReceiver, SynthMessage};
use crate::synth::parts::Parts;
use crate::MAX_DELAY_LINES;

/// One engine instance: a compiled program, the fixed-capacity audio state
/// it mutates, the delay workspace pool and the part-to-voice mapping.
///
/// Exclusively owned by one rendering thread; there is no internal locking.
/// Construction allocates everything up front (the workspace pool dominates
/// at 64 x 65 536 samples); the render path allocates nothing.
pub struct Synth {
    pub(crate) program: Program,
    pub(crate) state: SynthState,
    pub(crate) delays: Vec<DelayWorkspace>,
    pub(crate) sample_data: Option<Box<[i16]>>,
    parts: Parts,
}

impl Synth {
    pub fn new(program: Program, seed: u32) -> Synth {
        let parts = Parts::from_bitmask(program.num_voices, program.polyphony_bitmask);
        Synth {
            program,
            state: SynthState::new(seed),
            delays: (0..MAX_DELAY_LINES).map(|_| DelayWorkspace::new()).collect(),
            sample_data: None,
            parts,
        }
    }

    /// Swap in a recompiled program between render calls. Unit and delay
    /// state carry over when the opcode stream is unchanged (a live tweak of
    /// operand values); a structural change resets voice state so stale
    /// filter and envelope memory cannot bleed into the new patch.
    pub fn update(&mut self, program: Program) {
        let structure_changed = program.opcodes != self.program.opcodes
            || program.num_voices != self.program.num_voices
            || program.polyphony_bitmask != self.program.polyphony_bitmask;
        if structure_changed {
            for voice in self.state.voices.iter_mut() {
                *voice = crate::state::Voice::zeroed();
            }
            for workspace in &mut self.delays {
                workspace.reset();
            }
            self.parts = Parts::from_bitmask(program.num_voices, program.polyphony_bitmask);
        }
        self.program = program;
    }

    /// Attach the 16-bit PCM bank that sample-playback oscillators read.
    pub fn set_sample_data(&mut self, data: Box<[i16]>) {
        self.sample_data = Some(data);
    }

    pub fn set_samples_per_row(&mut self, samples_per_row: u32) {
        self.state.samples_per_row = samples_per_row;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn state(&self) -> &SynthState {
        &self.state
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Trigger a note on the next voice in the part's rotation. Returns the
    /// physical voice index the note landed on.
    pub fn note_on(&mut self, part: usize, note: u8) -> Option<usize> {
        let voice = self.parts.next_voice(part)?;
        self.state.voices.get_mut(voice)?.trigger(note);
        Some(voice)
    }

    /// Release the voice in `part` currently sustaining `note`, if any.
    pub fn note_off(&mut self, part: usize, note: u8) -> Option<usize> {
        let range = self.parts.voice_range(part)?;
        for index in range {
            let voice = &mut self.state.voices[index];
            if voice.sustain && voice.note == note {
                voice.release();
                return Some(index);
            }
        }
        None
    }

    /// Trigger a physical voice directly, bypassing the rotation.
    pub fn trigger(&mut self, voice: usize, note: u8) {
        if let Some(v) = self.state.voices.get_mut(voice) {
            v.trigger(note);
        }
    }

    /// Release a physical voice directly.
    pub fn release(&mut self, voice: usize) {
        if let Some(v) = self.state.voices.get_mut(voice) {
            v.release();
        }
    }

    pub fn all_notes_off(&mut self) {
        for voice in self.state.voices.iter_mut() {
            voice.release();
        }
    }

    /// Drain pending control messages from a lock-free receiver. Called at
    /// the top of the render callback, before rendering the block.
    pub fn drain_messages<R: MessageReceiver>(&mut self, rx: &mut R) {
        while let Some(msg) = rx.pop() {
            match msg {
                SynthMessage::NoteOn { part, note } => {
                    self.note_on(part as usize, note);
                }
                SynthMessage::NoteOff { part, note } => {
                    self.note_off(part as usize, note);
                }
                SynthMessage::AllNotesOff => self.all_notes_off(),
            }
        }
    }
}

//! One-sample evaluation of the compiled program across all voices.
//!
//! The opcode and operand streams are shared program state: every voice of a
//! part interprets the same bytes, and the polyphony bitmask tells the pass
//! whether to rewind the stream pointers after an advance (next voice, same
//! part) or to let them run on (next part). Unit state is per voice.
//!
//! Fault containment works at two granularities. Stack and numeric faults
//! leave the streams decodable, so the rest of the offending voice's program
//! is decoded without being executed and its sink contributions are dropped;
//! the remaining voices render normally. An unknown opcode or a truncated
//! stream makes the rest of the pass undecodable, so the remaining voices
//! fall silent for this tick and the pass ends. Either way the caller gets a
//! fault bitfield, never a panic.
//!
//! Sinks accumulate into a bus accumulator local to the current voice, which
//! is committed to the shared buses by the advance instruction only if the
//! voice evaluated cleanly, its stack is balanced, and every accumulated
//! value is finite.

use crate::bytecode::Program;
use crate::dsp::compressor::compressor_gain;
use crate::dsp::envelope::{envelope_step, EnvelopeParams};
use crate::dsp::eq::eq_step;
use crate::dsp::filter::svf_step;
use crate::dsp::oscillator::{
    self, FLAG_GATE, FLAG_LFO, FLAG_SAMPLE, UNISON_MASK,
};
use crate::dsp::shape::{clip, crush, db_gain, waveshape};
use crate::dsp::DelayWorkspace;
use crate::fault::Fault;
use crate::opcode::{Opcode, ADVANCE};
use crate::state::SynthState;
use crate::vm::stack::OperandStack;
use crate::{MAX_UNITS, MAX_VOICES, NUM_BUSES};

/// Result of rendering one sample tick across all voices.
pub(crate) struct SampleOutput {
    pub left: f32,
    pub right: f32,
    /// Time ticks this sample advanced the row counter: 1, plus whatever
    /// `speed` units added or removed. A sample whose speed units sum below
    /// minus one clamps to zero ticks; the row counter never runs backwards.
    pub ticks: u32,
    pub faults: Fault,
}

/// Render one sample. Reads the program, mutates voice/unit state, the bus
/// accumulators, the noise seed and the delay workspaces; allocates nothing.
pub(crate) fn run_sample(
    program: &Program,
    state: &mut SynthState,
    delays: &mut [DelayWorkspace],
    sample_data: Option<&[i16]>,
) -> SampleOutput {
    let mut pass = Pass {
        program,
        state: &mut *state,
        delays: &mut *delays,
        sample_data,
        stack: OperandStack::new(),
        local_bus: [0.0; NUM_BUSES],
        ip: 0,
        vp: 0,
        voice: 0,
        unit: 0,
        delay_cursor: 0,
        ticks: 1,
        faults: Fault::empty(),
    };
    pass.run();

    let Pass { ticks, faults, .. } = pass;
    let left = state.buses[0];
    let right = state.buses[1];
    state.buses[0] = 0.0;
    state.buses[1] = 0.0;
    SampleOutput {
        left,
        right,
        ticks: ticks.clamp(0, u32::MAX as i64) as u32,
        faults,
    }
}

struct Pass<'a> {
    program: &'a Program,
    state: &'a mut SynthState,
    delays: &'a mut [DelayWorkspace],
    sample_data: Option<&'a [i16]>,
    stack: OperandStack,
    /// Sink accumulation for the voice currently being evaluated.
    local_bus: [f32; NUM_BUSES],
    /// Position in the opcode stream.
    ip: usize,
    /// Position in the operand stream.
    vp: usize,
    voice: usize,
    unit: usize,
    /// Delay workspaces are assigned to delay kernels in program order,
    /// restarting every sample.
    delay_cursor: usize,
    ticks: i64,
    faults: Fault,
}

impl Pass<'_> {
    fn run(&mut self) {
        let mut voices_remaining = self.program.num_voices;
        let (mut part_ip, mut part_vp) = (0usize, 0usize);
        let mut voice_fault = Fault::empty();

        while voices_remaining > 0 {
            let Some(&op) = self.program.opcodes.get(self.ip) else {
                self.faults |= Fault::BAD_OPERANDS;
                return;
            };
            self.ip += 1;

            if op == ADVANCE {
                self.commit(voice_fault);
                voice_fault = Fault::empty();
                self.stack.reset();
                self.unit = 0;
                self.voice += 1;
                voices_remaining -= 1;
                if voices_remaining > 0 {
                    let mask = 1u32 << voices_remaining;
                    if self.program.polyphony_bitmask & mask == mask {
                        // Next voice reruns this part's program.
                        self.ip = part_ip;
                        self.vp = part_vp;
                    } else {
                        part_ip = self.ip;
                        part_vp = self.vp;
                    }
                }
                continue;
            }

            let stereo = op & 1 == 1;
            let Some(opcode) = Opcode::from_id(op >> 1) else {
                // The operand width of an unknown opcode is unknowable, so
                // the rest of the stream cannot be decoded this tick.
                self.faults |= Fault::BAD_OPCODE;
                return;
            };
            if self.voice >= MAX_VOICES || self.unit >= MAX_UNITS {
                self.faults |= Fault::BAD_INDEX;
                return;
            }

            // Decode: parameter bytes, then raw trailing bytes. This happens
            // even for a faulted voice so the stream pointers stay in sync.
            let pcount = opcode.param_count();
            let mut raw = [0u8; 8];
            let Some(bytes) = self.program.operands.get(self.vp..self.vp + pcount) else {
                self.faults |= Fault::BAD_OPERANDS;
                return;
            };
            raw[..pcount].copy_from_slice(bytes);
            self.vp += pcount;

            let tcount = opcode.tail_count();
            let mut tail = [0u8; 2];
            let Some(bytes) = self.program.operands.get(self.vp..self.vp + tcount) else {
                self.faults |= Fault::BAD_OPERANDS;
                return;
            };
            tail[..tcount].copy_from_slice(bytes);
            self.vp += tcount;

            if voice_fault.is_clean() {
                self.resolve_params(pcount, &raw);
                if let Err(fault) = self.exec(opcode, stereo, raw, tail) {
                    voice_fault |= fault;
                }
            }
            self.unit += 1;
        }
    }

    /// Fold a finished voice's contribution into the shared buses, or drop
    /// it and record why.
    fn commit(&mut self, voice_fault: Fault) {
        let mut fault = voice_fault;
        if fault.is_clean() && !self.stack.is_balanced() {
            fault |= self.stack.imbalance();
        }
        if fault.is_clean() && self.local_bus.iter().any(|v| !v.is_finite()) {
            fault |= Fault::NONFINITE;
        }
        if fault.is_clean() {
            for (bus, local) in self.state.buses.iter_mut().zip(self.local_bus) {
                *bus += local;
            }
        }
        self.faults |= fault;
        self.local_bus = [0.0; NUM_BUSES];
    }

    /// Resolve operand bytes and accumulated port modulation into the
    /// voice's input registers. Ports are consumed by the read.
    fn resolve_params(&mut self, pcount: usize, raw: &[u8; 8]) {
        let voice = &mut self.state.voices[self.voice];
        let unit = &mut voice.units[self.unit];
        for i in 0..pcount {
            voice.inputs[i] = raw[i] as f32 / 128.0 + unit.ports[i];
            unit.ports[i] = 0.0;
        }
    }

    fn exec(&mut self, opcode: Opcode, stereo: bool, raw: [u8; 8], tail: [u8; 2]) -> Result<(), Fault> {
        let params = self.state.voices[self.voice].inputs;
        let channels = if stereo { 2 } else { 1 };
        match opcode {
            Opcode::Add => {
                if stereo {
                    self.stack.set(0, self.stack.get(0)? + self.stack.get(2)?)?;
                    self.stack.set(1, self.stack.get(1)? + self.stack.get(3)?)?;
                } else {
                    self.stack.set(0, self.stack.get(0)? + self.stack.get(1)?)?;
                }
            }
            Opcode::Addp => {
                if stereo {
                    let a = self.stack.pop()?;
                    let b = self.stack.pop()?;
                    self.stack.set(0, self.stack.get(0)? + a)?;
                    self.stack.set(1, self.stack.get(1)? + b)?;
                } else {
                    let a = self.stack.pop()?;
                    self.stack.set(0, self.stack.get(0)? + a)?;
                }
            }
            Opcode::Mul => {
                if stereo {
                    self.stack.set(0, self.stack.get(0)? * self.stack.get(2)?)?;
                    self.stack.set(1, self.stack.get(1)? * self.stack.get(3)?)?;
                } else {
                    self.stack.set(0, self.stack.get(0)? * self.stack.get(1)?)?;
                }
            }
            Opcode::Mulp => {
                if stereo {
                    let a = self.stack.pop()?;
                    let b = self.stack.pop()?;
                    self.stack.set(0, self.stack.get(0)? * a)?;
                    self.stack.set(1, self.stack.get(1)? * b)?;
                } else {
                    let a = self.stack.pop()?;
                    self.stack.set(0, self.stack.get(0)? * a)?;
                }
            }
            Opcode::Xch => {
                if stereo {
                    let (a, c) = (self.stack.get(0)?, self.stack.get(2)?);
                    self.stack.set(0, c)?;
                    self.stack.set(2, a)?;
                    let (b, d) = (self.stack.get(1)?, self.stack.get(3)?);
                    self.stack.set(1, d)?;
                    self.stack.set(3, b)?;
                } else {
                    let (a, b) = (self.stack.get(0)?, self.stack.get(1)?);
                    self.stack.set(0, b)?;
                    self.stack.set(1, a)?;
                }
            }
            Opcode::Push => {
                let a = self.stack.get(0)?;
                if stereo {
                    let b = self.stack.get(1)?;
                    self.stack.push(b)?;
                }
                self.stack.push(a)?;
            }
            Opcode::Pop => {
                self.stack.pop()?;
                if stereo {
                    self.stack.pop()?;
                }
            }
            Opcode::Loadnote => {
                let note = self.state.voices[self.voice].note as f32 / 64.0 - 1.0;
                self.stack.push(note)?;
                if stereo {
                    self.stack.push(note)?;
                }
            }
            Opcode::Loadval => {
                let value = params[0] * 2.0 - 1.0;
                if stereo {
                    self.stack.push(value)?;
                }
                self.stack.push(value)?;
            }
            Opcode::Receive => {
                let unit = &mut self.state.voices[self.voice].units[self.unit];
                if stereo {
                    let v = unit.ports[1];
                    unit.ports[1] = 0.0;
                    self.stack.push(v)?;
                }
                let v = unit.ports[0];
                unit.ports[0] = 0.0;
                self.stack.push(v)?;
            }
            Opcode::In => {
                let channel = tail[0] as usize;
                if channel + channels > NUM_BUSES {
                    return Err(Fault::BAD_INDEX);
                }
                if stereo {
                    self.stack.push(self.state.buses[channel + 1])?;
                    self.state.buses[channel + 1] = 0.0;
                }
                self.stack.push(self.state.buses[channel])?;
                self.state.buses[channel] = 0.0;
            }
            Opcode::Envelope => {
                let gate = self.state.voices[self.voice].sustain;
                let env = EnvelopeParams {
                    attack: params[0],
                    decay: params[1],
                    sustain: params[2],
                    release: params[3],
                    gain: params[4],
                };
                let unit = &mut self.state.voices[self.voice].units[self.unit];
                let (mut stage, mut level) = (unit.state[0], unit.state[1]);
                let out = envelope_step(&mut stage, &mut level, gate, &env);
                unit.state[0] = stage;
                unit.state[1] = level;
                self.stack.push(out)?;
                if stereo {
                    self.stack.push(out)?;
                }
            }
            Opcode::Noise => {
                if stereo {
                    let r = self.state.next_rand();
                    self.stack.push(waveshape(r, params[0]) * params[1])?;
                }
                let r = self.state.next_rand();
                self.stack.push(waveshape(r, params[0]) * params[1])?;
            }
            Opcode::Oscillator => self.oscillator(stereo, raw, tail[0])?,
            Opcode::Distort => {
                if stereo {
                    let v = self.stack.get(1)?;
                    self.stack.set(1, waveshape(v, params[0]))?;
                }
                let v = self.stack.get(0)?;
                self.stack.set(0, waveshape(v, params[0]))?;
            }
            Opcode::Hold => {
                let freq2 = params[0] * params[0];
                for i in 0..channels {
                    let input = self.stack.get(i)?;
                    let unit = &mut self.state.voices[self.voice].units[self.unit];
                    let mut phase = unit.state[i] - freq2;
                    if phase <= 0.0 {
                        unit.state[2 + i] = input;
                        phase += 1.0;
                    }
                    let held = unit.state[2 + i];
                    unit.state[i] = phase;
                    self.stack.set(i, held)?;
                }
            }
            Opcode::Crush => {
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.stack.set(i, crush(v, params[0]))?;
                }
            }
            Opcode::Gain => {
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.stack.set(i, v * params[0])?;
                }
            }
            Opcode::Invgain => {
                if params[0] == 0.0 {
                    return Err(Fault::DIV_BY_ZERO);
                }
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.stack.set(i, v / params[0])?;
                }
            }
            Opcode::Dbgain => {
                let gain = db_gain(params[0]);
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.stack.set(i, v * gain)?;
                }
            }
            Opcode::Clip => {
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.stack.set(i, clip(v))?;
                }
            }
            Opcode::Pan => {
                if !stereo {
                    let v = self.stack.get(0)?;
                    self.stack.push(v)?;
                }
                let left = self.stack.get(1)?;
                self.stack.set(1, left * params[0])?;
                let right = self.stack.get(0)?;
                self.stack.set(0, right * (1.0 - params[0]))?;
            }
            Opcode::Filter => {
                let freq2 = params[0] * params[0];
                let res = params[1];
                for i in 0..channels {
                    let input = self.stack.get(i)?;
                    let unit = &mut self.state.voices[self.voice].units[self.unit];
                    let (mut low, mut band) = (unit.state[i], unit.state[2 + i]);
                    let out = svf_step(&mut low, &mut band, input, freq2, res, tail[0]);
                    unit.state[i] = low;
                    unit.state[2 + i] = band;
                    self.stack.set(i, out)?;
                }
            }
            Opcode::Delay => self.delay(stereo, params, tail)?,
            Opcode::Compressor => {
                let top = self.stack.get(0)?;
                let mut power = top * top;
                if stereo {
                    let v = self.stack.get(1)?;
                    power += v * v;
                }
                if params[2] == 0.0 {
                    return Err(Fault::DIV_BY_ZERO);
                }
                let unit = &mut self.state.voices[self.voice].units[self.unit];
                let mut level = unit.state[0];
                let gain = compressor_gain(&mut level, power, params[0], params[1], params[3], params[4]);
                unit.state[0] = level;
                let gain = gain / params[2];
                self.stack.push(gain)?;
                if stereo {
                    self.stack.push(gain)?;
                }
            }
            Opcode::Eq => {
                for i in 0..channels {
                    let input = self.stack.get(i)?;
                    let unit = &mut self.state.voices[self.voice].units[self.unit];
                    let (mut z1, mut z2) = (unit.state[i], unit.state[2 + i]);
                    let out = eq_step(&mut z1, &mut z2, input, params[0], params[1], params[2]);
                    unit.state[i] = z1;
                    unit.state[2 + i] = z2;
                    self.stack.set(i, out)?;
                }
            }
            Opcode::Out => {
                let a = self.stack.pop()?;
                self.local_bus[0] += params[0] * a;
                if stereo {
                    let b = self.stack.pop()?;
                    self.local_bus[1] += params[0] * b;
                }
            }
            Opcode::Outaux => {
                let a = self.stack.pop()?;
                self.local_bus[0] += params[0] * a;
                self.local_bus[2] += params[1] * a;
                if stereo {
                    let b = self.stack.pop()?;
                    self.local_bus[1] += params[0] * b;
                    self.local_bus[3] += params[1] * b;
                }
            }
            Opcode::Aux => {
                let channel = tail[0] as usize;
                if channel + channels > NUM_BUSES {
                    return Err(Fault::BAD_INDEX);
                }
                if stereo {
                    self.local_bus[channel + 1] += params[0] * self.stack.get(1)?;
                }
                self.local_bus[channel] += params[0] * self.stack.get(0)?;
                for _ in 0..channels {
                    self.stack.pop()?;
                }
            }
            Opcode::Send => {
                let addr = u16::from_le_bytes(tail);
                let amount = params[0] * 2.0 - 1.0;
                let (target, addr) = if addr & 0x8000 != 0 {
                    let global = addr.wrapping_sub(0x8010);
                    ((global >> 10) as usize, global)
                } else {
                    (self.voice, addr)
                };
                if target >= MAX_VOICES {
                    return Err(Fault::BAD_INDEX);
                }
                let unit_index = ((addr & 0x01F0) >> 4)
                    .checked_sub(1)
                    .ok_or(Fault::BAD_INDEX)? as usize;
                if unit_index >= MAX_UNITS {
                    return Err(Fault::BAD_INDEX);
                }
                let port = (addr & 7) as usize;
                if port + channels > 8 {
                    return Err(Fault::BAD_INDEX);
                }
                for i in 0..channels {
                    let v = self.stack.get(i)?;
                    self.state.voices[target].units[unit_index].ports[port + i] += v * amount;
                }
                if addr & 0x8 != 0 {
                    for _ in 0..channels {
                        self.stack.pop()?;
                    }
                }
            }
            Opcode::Speed => {
                let v = self.stack.pop()?;
                let unit = &mut self.state.voices[self.voice].units[self.unit];
                let r = unit.state[0] + ((v as f64 * 2.206896551724138).exp2() - 1.0) as f32;
                let whole = (r + 1.5) as i32 - 1;
                unit.state[0] = r - whole as f32;
                self.ticks += whole as i64;
            }
            Opcode::Sync => {
                // Sync points only matter to visualizers; the audio path
                // treats them as a timing no-op.
            }
        }
        Ok(())
    }

    fn oscillator(&mut self, stereo: bool, raw: [u8; 8], flags: u8) -> Result<(), Fault> {
        let params = self.state.voices[self.voice].inputs;
        let channels = if stereo { 2 } else { 1 };
        let lfo = flags & FLAG_LFO != 0;
        let unison = (flags & UNISON_MASK) as usize;
        let note = self.state.voices[self.voice].note;
        let fm = self.state.voices[self.voice].units[self.unit].ports[6] as f64;

        // The phase offset accumulates across unison copies and carries into
        // the second channel, spreading all the copies out of phase.
        let mut phase_param = params[2];
        let mut detune_stereo = params[1] * 2.0 - 1.0;

        for i in 0..channels {
            let mut detune = detune_stereo;
            let mut output = 0.0f32;
            for j in 0..=unison {
                let slot = i + j * 2;
                let mut pitch = (64.0 * (params[0] * 2.0 - 1.0) + detune) as f64;
                if !lfo {
                    pitch += note as f64;
                }
                let omega = oscillator::omega(pitch, lfo) + fm;

                let amplitude = if flags & FLAG_SAMPLE != 0 {
                    let unit = &mut self.state.voices[self.voice].units[self.unit];
                    unit.state[slot] += omega as f32;
                    let phase = unit.state[slot] + phase_param;
                    self.sample_amplitude(raw[3], phase)?
                } else {
                    let unit = &mut self.state.voices[self.voice].units[self.unit];
                    unit.state[slot] = oscillator::wrap_phase(unit.state[slot] + omega as f32);
                    let mut phase = unit.state[slot] + phase_param;
                    phase -= phase as i32 as f32;
                    if flags & FLAG_GATE != 0 {
                        let gate_bits = u16::from_le_bytes([raw[3], raw[4]]);
                        let mut smooth = unit.state[4 + i];
                        let amp = oscillator::gate_step(&mut smooth, phase, gate_bits);
                        unit.state[4 + i] = smooth;
                        amp
                    } else {
                        oscillator::waveform(flags, phase, params[3])
                    }
                };

                if flags & FLAG_GATE != 0 {
                    output += amplitude * params[5];
                } else {
                    output += waveshape(amplitude, params[4]) * params[5];
                }
                if j < unison {
                    phase_param += 0.08333333;
                }
                detune = -detune * 0.5;
            }
            self.stack.push(output)?;
            detune_stereo = -detune_stereo;
        }
        self.state.voices[self.voice].units[self.unit].ports[6] = 0.0;
        Ok(())
    }

    /// Look up one sample-playback amplitude through the offset table,
    /// honoring the loop points. Missing sample data and out-of-range
    /// indices fault instead of reading garbage.
    fn sample_amplitude(&self, sample_no: u8, phase: f32) -> Result<f32, Fault> {
        let data = self.sample_data.ok_or(Fault::BAD_INDEX)?;
        let offset = self
            .program
            .sample_offsets
            .get(sample_no as usize)
            .ok_or(Fault::BAD_INDEX)?;
        let mut index = (phase * 84.28074964676522 + 0.5) as i64;
        let loop_start = offset.loop_start as i64;
        let loop_len = offset.loop_len.max(1) as i64;
        if index >= loop_start {
            index = (index - loop_start) % loop_len + loop_start;
        }
        index += offset.start as i64;
        let word = usize::try_from(index)
            .ok()
            .and_then(|i| data.get(i))
            .ok_or(Fault::BAD_INDEX)?;
        Ok(*word as f32 / 32767.0)
    }

    fn delay(&mut self, stereo: bool, params: [f32; 8], tail: [u8; 2]) -> Result<(), Fault> {
        let channels = if stereo { 2 } else { 1 };
        let pregain2 = params[0] * params[0];
        let dry = params[1];
        let feedback = params[2];
        let damp = params[3];
        let mut line = tail[0] as usize;
        let count = tail[1];
        let tick = self.state.global_tick as u16;
        let note = self.state.voices[self.voice].note;
        let time_mod = self.state.voices[self.voice].units[self.unit].ports[4];

        for i in 0..channels {
            // The stereo operand pair is processed bottom-up.
            let depth = channels - 1 - i;
            let signal = self.stack.get(depth)?;
            let mut output = dry * signal;
            let mut last_workspace = None;
            let mut j = 0;
            while j < count {
                let cursor = self.delay_cursor;
                let workspace = self.delays.get_mut(cursor).ok_or(Fault::BAD_INDEX)?;
                self.delay_cursor += 1;
                let base = *self.program.delay_times.get(line).ok_or(Fault::BAD_INDEX)?;
                let mut time = base as f32 + time_mod * 32767.0;
                if count & 1 == 0 {
                    // Even count flags note tracking: shorten the line with
                    // pitch so the echo stays harmonic.
                    time /= (note as f64 * 0.083333333333).exp2() as f32;
                }
                output += workspace.tap(tick, time, damp, feedback, pregain2, signal);
                last_workspace = Some(cursor);
                line += 1;
                j += 2;
            }
            let wet = match last_workspace {
                Some(cursor) => self.delays[cursor].dc_block(output),
                None => output,
            };
            self.stack.set(depth, wet)?;
        }
        self.state.voices[self.voice].units[self.unit].ports[4] = 0.0;
        Ok(())
    }
}

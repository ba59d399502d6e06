//! End-to-end regression tests against the render driver's contract:
//! determinism, row/buffer bookkeeping, degenerate inputs, fault containment
//! and a reference-checked envelope scenario.

use rowsynth::bytecode::polyphony_bitmask;
use rowsynth::dsp::envelope::{envelope_step, EnvelopeParams, STAGE_ATTACK};
use rowsynth::dsp::oscillator::{FLAG_SAMPLE, FLAG_TRISAW};
use rowsynth::opcode::{Opcode, ADVANCE};
use rowsynth::{Fault, Program, RenderStatus, SampleOffset, Synth};

struct Assembler {
    opcodes: Vec<u8>,
    operands: Vec<u8>,
}

impl Assembler {
    fn new() -> Assembler {
        Assembler {
            opcodes: Vec::new(),
            operands: Vec::new(),
        }
    }

    fn unit(mut self, opcode: Opcode, stereo: bool, operands: &[u8]) -> Self {
        self.opcodes.push(opcode.byte(stereo));
        self.operands.extend_from_slice(operands);
        self
    }

    fn advance(mut self) -> Self {
        self.opcodes.push(ADVANCE);
        self
    }

    fn program(self, num_voices: u32, bitmask: u32) -> Program {
        Program::new(&self.opcodes, &self.operands, num_voices, bitmask).unwrap()
    }
}

/// Noise through an envelope into the stereo outs: exercises the LCG, the
/// envelope state slots and the sink path in one voice.
fn noisy_program() -> Program {
    Assembler::new()
        .unit(Opcode::Envelope, false, &[16, 72, 80, 88, 110])
        .unit(Opcode::Noise, false, &[48, 100])
        .unit(Opcode::Mulp, false, &[])
        .unit(Opcode::Pan, false, &[64])
        .unit(Opcode::Out, true, &[110])
        .advance()
        .program(1, 0)
}

fn render_total(synth: &mut Synth, frames: usize) -> (Vec<f32>, Fault) {
    let mut out = vec![0.0f32; frames * 2];
    let mut filled = 0;
    let mut faults = Fault::empty();
    let mut guard = 0;
    while filled < frames {
        let result = synth.render(&mut out[filled * 2..]);
        filled += result.frames;
        faults |= result.faults;
        guard += 1;
        assert!(guard < 10_000, "driver made no forward progress");
    }
    (out, faults)
}

#[test]
fn identical_seeds_render_bit_identical_buffers() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut synth = Synth::new(noisy_program(), 12345);
        synth.set_samples_per_row(512);
        synth.note_on(0, 64);
        let (buffer, faults) = render_total(&mut synth, 2048);
        assert!(faults.is_clean());
        runs.push(buffer);
    }
    let bits =
        |buf: &[f32]| buf.iter().map(|s| s.to_bits()).collect::<Vec<u32>>();
    assert_eq!(bits(&runs[0]), bits(&runs[1]));
    assert!(runs[0].iter().any(|s| *s != 0.0), "noise voice rendered silence");
}

#[test]
fn row_boundary_is_observed_exactly_once_per_row() {
    let row = 37u32;
    let mut synth = Synth::new(noisy_program(), 7);
    synth.set_samples_per_row(row);
    synth.note_on(0, 52);

    // Awkward buffer sizes on purpose: boundaries must still land every
    // `row` ticks, counted across calls.
    let mut since_boundary = 0u32;
    let mut boundaries = 0;
    for call in 0..200 {
        let mut out = vec![0.0f32; 2 * (call % 13 + 1)];
        let result = synth.render(&mut out);
        since_boundary += result.ticks;
        assert!(
            since_boundary <= row,
            "row tick ran past the row without a boundary"
        );
        if result.status == RenderStatus::RowBoundary {
            assert_eq!(since_boundary, row);
            since_boundary = 0;
            boundaries += 1;
        }
    }
    assert!(boundaries > 10);
}

#[test]
fn zero_budget_renders_nothing_and_keeps_counters() {
    let mut synth = Synth::new(noisy_program(), 3);
    synth.set_samples_per_row(100);
    synth.note_on(0, 60);
    synth.render(&mut vec![0.0; 14]);
    let row_tick = synth.state().row_tick;
    let global_tick = synth.state().global_tick;

    let result = synth.render(&mut []);
    assert_eq!(result.frames, 0);
    assert_eq!(result.ticks, 0);
    assert!(result.faults.is_clean());
    assert_eq!(synth.state().row_tick, row_tick);
    assert_eq!(synth.state().global_tick, global_tick);
}

#[test]
fn zero_row_length_never_advances_anything() {
    let mut synth = Synth::new(noisy_program(), 3);
    synth.set_samples_per_row(0);
    synth.note_on(0, 60);
    let mut out = [5.0f32; 128];
    for _ in 0..4 {
        let result = synth.render(&mut out);
        assert_eq!(result.frames, 0);
        assert_eq!(result.status, RenderStatus::BufferFull);
    }
    assert_eq!(synth.state().global_tick, 0);
    assert_eq!(synth.state().row_tick, 0);
    assert!(out.iter().all(|s| *s == 5.0), "buffer region was written");
}

#[test]
fn unknown_opcode_reports_bad_opcode_without_crashing() {
    // Kernel id one past the last defined one, as a mono opcode byte.
    let bad_byte = 33 * 2;
    let program = Program::new(&[bad_byte, ADVANCE], &[], 1, 0).unwrap();
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(64);
    synth.note_on(0, 64);

    let mut out = [1.0f32; 128];
    let result = synth.render(&mut out);
    assert_eq!(result.frames, 64);
    assert!(result.faults.contains(Fault::BAD_OPCODE));
    assert!(out.iter().all(|s| *s == 0.0), "undecodable pass must be silent");
}

#[test]
fn truncated_operand_stream_reports_bad_operands() {
    // Envelope consumes five parameter bytes; only three are supplied, so
    // the stream ends mid-instruction every sample.
    let program = Assembler::new()
        .unit(Opcode::Envelope, false, &[64, 64, 64])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(32);
    synth.note_on(0, 64);

    let mut out = [1.0f32; 64];
    let result = synth.render(&mut out);
    assert_eq!(result.frames, 32);
    assert!(result.faults.contains(Fault::BAD_OPERANDS));
    assert!(out.iter().all(|s| *s == 0.0), "undecodable pass must be silent");
}

#[test]
fn zero_gain_division_faults_and_silences_the_voice() {
    // invgain with a zero parameter divides by zero; the voice is dropped
    // for the tick instead of pushing an infinity.
    let invgain = Assembler::new()
        .unit(Opcode::Loadval, false, &[96])
        .unit(Opcode::Invgain, false, &[0])
        .unit(Opcode::Out, false, &[128])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(invgain, 1);
    synth.set_samples_per_row(8);
    synth.note_on(0, 64);
    let mut out = [0.0f32; 16];
    let result = synth.render(&mut out);
    assert!(result.faults.contains(Fault::DIV_BY_ZERO));
    assert!(out.iter().all(|s| *s == 0.0));

    // Same contract for the compressor's inverse-gain parameter.
    let compressor = Assembler::new()
        .unit(Opcode::Loadval, false, &[96])
        .unit(Opcode::Compressor, false, &[0, 64, 0, 64, 64])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(compressor, 1);
    synth.set_samples_per_row(8);
    synth.note_on(0, 64);
    let result = synth.render(&mut [0.0; 16]);
    assert!(result.faults.contains(Fault::DIV_BY_ZERO));
}

#[test]
fn sample_playback_faults_without_a_bank_and_plays_with_one() {
    let program = Assembler::new()
        .unit(Opcode::Oscillator, false, &[64, 64, 0, 0, 64, 96, FLAG_SAMPLE])
        .unit(Opcode::Out, false, &[110])
        .advance()
        .program(1, 0)
        .with_sample_offsets(&[SampleOffset {
            start: 0,
            loop_start: 0,
            loop_len: 4,
        }])
        .unwrap();

    // No sample bank attached: the oscillator faults and stays silent.
    let mut bare = Synth::new(program.clone(), 1);
    bare.set_samples_per_row(16);
    bare.note_on(0, 64);
    let mut out = [0.0f32; 32];
    let result = bare.render(&mut out);
    assert!(result.faults.contains(Fault::BAD_INDEX));
    assert!(out.iter().all(|s| *s == 0.0));

    // With the bank in place the same program renders cleanly.
    let mut synth = Synth::new(program.clone(), 1);
    synth.set_sample_data(Box::new([16384i16, -16384, 8192, -8192]));
    synth.set_samples_per_row(16);
    synth.note_on(0, 64);
    let mut out = [0.0f32; 32];
    let result = synth.render(&mut out);
    assert!(result.faults.is_clean());
    assert!(out.iter().any(|s| s.abs() > 1e-4), "sample voice rendered silence");

    // An offset pointing past the bank is an index fault, not a wild read.
    let past_the_end = program
        .with_sample_offsets(&[SampleOffset {
            start: 1000,
            loop_start: 0,
            loop_len: 4,
        }])
        .unwrap();
    let mut synth = Synth::new(past_the_end, 1);
    synth.set_sample_data(Box::new([16384i16, -16384, 8192, -8192]));
    synth.set_samples_per_row(16);
    synth.note_on(0, 64);
    let result = synth.render(&mut [0.0; 32]);
    assert!(result.faults.contains(Fault::BAD_INDEX));
}

#[test]
fn stack_underflow_has_a_documented_bit_pattern() {
    // Five pops eat through the four-zero guard band.
    let program = Assembler::new()
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(16);
    synth.note_on(0, 64);

    let result = synth.render(&mut [0.0; 32]);
    assert_eq!(result.faults.bits(), 1 << 0, "stack-underflow bit");
}

#[test]
fn faulted_voice_is_contained_to_itself() {
    // Part 0 underflows its stack; part 1 is a plain DC source. The mix
    // must contain exactly part 1's contribution.
    let mixed = Assembler::new()
        .unit(Opcode::Pop, false, &[]) // pops all four guard zeros...
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[])
        .unit(Opcode::Pop, false, &[]) // ...and then underflows
        .advance()
        .unit(Opcode::Loadval, false, &[96])
        .unit(Opcode::Out, false, &[128])
        .advance()
        .program(2, polyphony_bitmask(&[1, 1]));

    let mut synth = Synth::new(mixed, 1);
    synth.set_samples_per_row(8);
    synth.note_on(0, 64);
    synth.note_on(1, 64);

    let mut out = [0.0f32; 16];
    let result = synth.render(&mut out);
    assert!(result.faults.contains(Fault::STACK_UNDERFLOW));
    // loadval 96/128 maps to 0.5; mono out writes left only.
    for frame in out.chunks(2) {
        assert!((frame[0] - 0.5).abs() < 1e-6);
        assert_eq!(frame[1], 0.0);
    }
}

#[test]
fn one_sample_calls_equal_one_batch_call() {
    let row = 24u32;

    let mut batch = Synth::new(noisy_program(), 99);
    batch.set_samples_per_row(row);
    batch.note_on(0, 70);
    let mut batch_out = vec![0.0f32; row as usize * 2];
    let result = batch.render(&mut batch_out);
    assert_eq!(result.frames, row as usize);
    assert_eq!(result.status, RenderStatus::RowBoundary);

    let mut single = Synth::new(noisy_program(), 99);
    single.set_samples_per_row(row);
    single.note_on(0, 70);
    let mut single_out = Vec::new();
    for call in 0..row {
        let mut frame = [0.0f32; 2];
        let result = single.render(&mut frame);
        assert_eq!(result.frames, 1);
        let expected = if call == row - 1 {
            RenderStatus::RowBoundary
        } else {
            RenderStatus::BufferFull
        };
        assert_eq!(result.status, expected);
        single_out.extend_from_slice(&frame);
    }

    assert_eq!(single.state().row_tick, 0);
    let bits = |buf: &[f32]| buf.iter().map(|s| s.to_bits()).collect::<Vec<u32>>();
    assert_eq!(bits(&batch_out), bits(&single_out));
}

#[test]
fn speed_unit_stretches_row_time() {
    // loadval 96 -> 0.5 on the stack; speed maps that to one extra tick per
    // sample, so a 10-tick row completes in 5 frames.
    let program = Assembler::new()
        .unit(Opcode::Loadval, false, &[96])
        .unit(Opcode::Speed, false, &[])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(10);
    synth.note_on(0, 64);

    let mut out = [0.0f32; 64];
    let result = synth.render(&mut out);
    assert_eq!(result.status, RenderStatus::RowBoundary);
    assert_eq!(result.frames, 5);
    // The fractional accumulator occasionally lands a 3-tick sample, so the
    // 10-tick row overshoots to 11.
    assert_eq!(result.ticks, 11);
    assert!(result.faults.is_clean());
}

#[test]
fn net_negative_speed_clamps_to_zero_ticks() {
    // Two speed units each fed -1 pull roughly -0.78 ticks per sample, so
    // most samples sum below zero. Those clamp to zero ticks; the row
    // counter crawls forward on the accumulator remainders but never runs
    // backwards.
    let program = Assembler::new()
        .unit(Opcode::Loadval, false, &[0])
        .unit(Opcode::Speed, false, &[])
        .unit(Opcode::Loadval, false, &[0])
        .unit(Opcode::Speed, false, &[])
        .advance()
        .program(1, 0);
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(100);
    synth.note_on(0, 64);

    let mut ticks = Vec::new();
    for _ in 0..4 {
        let mut frame = [0.0f32; 2];
        let result = synth.render(&mut frame);
        assert_eq!(result.frames, 1);
        assert!(result.faults.is_clean());
        ticks.push(result.ticks);
    }
    assert_eq!(ticks, [0, 0, 1, 0]);
    assert_eq!(synth.state().row_tick, 1);
    assert_eq!(synth.state().global_tick, 4);
}

#[test]
fn two_envelope_scenario_matches_kernel_reference() {
    // Two envelopes into the stereo out, one voice: sustained for the first
    // half row, released for the second. The engine's output must track the
    // raw kernels within 1e-3 per sample.
    let fast = [8u8, 64, 96, 72, 128];
    let slow = [32u8, 96, 64, 104, 128];
    let out_gain = 96u8;
    let program = Assembler::new()
        .unit(Opcode::Envelope, false, &fast)
        .unit(Opcode::Envelope, false, &slow)
        .unit(Opcode::Out, true, &[out_gain])
        .advance()
        .program(1, 0);

    let half = 256usize;
    let mut synth = Synth::new(program, 1);
    synth.set_samples_per_row(half as u32);
    synth.note_on(0, 64);

    let mut rendered = vec![0.0f32; half * 4];
    let first = synth.render(&mut rendered[..half * 2]);
    assert_eq!(first.status, RenderStatus::RowBoundary);
    synth.release(0);
    let second = synth.render(&mut rendered[half * 2..]);
    assert_eq!(second.frames, half);
    assert!(first.faults.is_clean() && second.faults.is_clean());

    // Reference: run the envelope kernels directly.
    let to_params = |raw: &[u8; 5]| EnvelopeParams {
        attack: raw[0] as f32 / 128.0,
        decay: raw[1] as f32 / 128.0,
        sustain: raw[2] as f32 / 128.0,
        release: raw[3] as f32 / 128.0,
        gain: raw[4] as f32 / 128.0,
    };
    let (fast_p, slow_p) = (to_params(&fast), to_params(&slow));
    let gain = out_gain as f32 / 128.0;
    let (mut stage_a, mut level_a) = (STAGE_ATTACK, 0.0f32);
    let (mut stage_b, mut level_b) = (STAGE_ATTACK, 0.0f32);
    for (i, frame) in rendered.chunks(2).enumerate() {
        let gate = i < half;
        let a = envelope_step(&mut stage_a, &mut level_a, gate, &fast_p);
        let b = envelope_step(&mut stage_b, &mut level_b, gate, &slow_p);
        // Stereo out pops the top (second envelope) into the left bus.
        let (left, right) = (gain * b, gain * a);
        assert!(
            (frame[0] - left).abs() <= 1e-3 && (frame[1] - right).abs() <= 1e-3,
            "sample {i} diverged: got ({}, {}), want ({left}, {right})",
            frame[0],
            frame[1]
        );
    }
    // The sustained half must actually have produced signal.
    assert!(rendered[half].abs() > 1e-4);
}

#[test]
fn polyphonic_part_renders_both_voices() {
    // One part, two voices of a trisaw oscillator. Triggering both voices
    // on different notes must produce a different mix than one voice alone.
    let program = || {
        Assembler::new()
            .unit(Opcode::Envelope, false, &[0, 64, 96, 80, 110])
            .unit(Opcode::Oscillator, false, &[64, 64, 0, 64, 64, 96, FLAG_TRISAW])
            .unit(Opcode::Mulp, false, &[])
            .unit(Opcode::Pan, false, &[64])
            .unit(Opcode::Out, true, &[110])
            .advance()
            .program(2, polyphony_bitmask(&[2]))
    };

    let render_notes = |notes: &[u8]| {
        let mut synth = Synth::new(program(), 1);
        synth.set_samples_per_row(256);
        for &note in notes {
            synth.note_on(0, note);
        }
        let (buffer, faults) = render_total(&mut synth, 256);
        assert!(faults.is_clean());
        buffer
    };

    let solo = render_notes(&[60]);
    let duo = render_notes(&[60, 67]);
    assert!(solo.iter().any(|s| s.abs() > 1e-4));
    assert_ne!(solo, duo, "second voice contributed nothing");
}

//! Benchmarks for the render driver.
//!
//! Run with: cargo bench
//!
//! The engine must render a block well inside its real-time deadline; at
//! 44.1 kHz a 512-frame block has about 11.6 ms of headroom.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rowsynth::bytecode::polyphony_bitmask;
use rowsynth::dsp::filter::FLAG_LOWPASS;
use rowsynth::dsp::oscillator::{FLAG_SINE, FLAG_TRISAW};
use rowsynth::opcode::{Opcode, ADVANCE};
use rowsynth::{Program, Synth};

const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn patch(voices_per_part: &[u32]) -> Program {
    let mut opcodes = Vec::new();
    let mut operands = Vec::new();
    let mut unit = |op: Opcode, stereo: bool, bytes: &[u8]| {
        opcodes.push(op.byte(stereo));
        operands.extend_from_slice(bytes);
    };

    for (part, _) in voices_per_part.iter().enumerate() {
        let wave = if part % 2 == 0 { FLAG_TRISAW } else { FLAG_SINE | 1 };
        unit(Opcode::Envelope, false, &[8, 72, 80, 88, 104]);
        unit(Opcode::Oscillator, false, &[64, 66, 0, 64, 48, 96, wave]);
        unit(Opcode::Mulp, false, &[]);
        unit(Opcode::Filter, false, &[48, 64, FLAG_LOWPASS]);
        unit(Opcode::Pan, false, &[64]);
        unit(Opcode::Out, true, &[104]);
        opcodes.push(ADVANCE);
    }

    let num_voices = voices_per_part.iter().sum();
    Program::new(&opcodes, &operands, num_voices, polyphony_bitmask(voices_per_part)).unwrap()
}

fn synth_with(voices_per_part: &[u32]) -> Synth {
    let mut synth = Synth::new(patch(voices_per_part), 1);
    synth.set_samples_per_row(1 << 30); // keep boundaries out of the loop
    for part in 0..voices_per_part.len() {
        for offset in 0..voices_per_part[part] {
            synth.note_on(part, 40 + (part as u8) * 12 + offset as u8 * 7);
        }
    }
    synth
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size * 2];

        let mut solo = synth_with(&[1]);
        group.bench_with_input(BenchmarkId::new("one_voice", size), &size, |b, _| {
            b.iter(|| black_box(solo.render(black_box(&mut buffer))))
        });

        let mut band = synth_with(&[2, 2, 4]);
        group.bench_with_input(BenchmarkId::new("eight_voices", size), &size, |b, _| {
            b.iter(|| black_box(band.render(black_box(&mut buffer))))
        });

        let mut full = synth_with(&[4; 8]);
        group.bench_with_input(BenchmarkId::new("thirty_two_voices", size), &size, |b, _| {
            b.iter(|| black_box(full.render(black_box(&mut buffer))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);

//! rowplay - demo player for the rowsynth engine
//!
//! Renders a hand-assembled two-part patch row by row into the default
//! output device. A lock-free ring carries control messages from the main
//! thread into the audio callback, which owns the synth for the duration of
//! the run.

mod demo;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use rtrb::{Consumer, RingBuffer};

use rowsynth::synth::message::SynthMessage;
use rowsynth::{RenderStatus, Synth};

const BLOCK_FRAMES: usize = 512;
const BPM: f64 = 112.0;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let mut synth = Synth::new(demo::program()?, 1);
    let samples_per_row = (sample_rate as f64 * 60.0 / (BPM * 4.0)) as u32;
    synth.set_samples_per_row(samples_per_row);

    let (mut tx, rx) = RingBuffer::<SynthMessage>::new(64);
    let player = Arc::new(Mutex::new(Player {
        synth,
        rx,
        row: 0,
        row_pending: true,
        last_lead: None,
        finished: false,
    }));

    println!("=== rowplay ===");
    println!("Sample rate: {sample_rate} Hz");
    println!("Channels: {channels}");
    println!("Row length: {samples_per_row} samples ({BPM} BPM)");
    println!();

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), channels, player, |s| s),
        SampleFormat::I16 => {
            build_stream::<i16>(&device, &config.into(), channels, player, rowsynth::io::f32_to_i16)
        }
        other => return Err(eyre!("unsupported sample format {other:?}")),
    }?;
    stream.play()?;

    println!("Playing... Ctrl+C to stop early");
    std::thread::sleep(Duration::from_secs(24));

    // Let the release tails ring out before the stream drops.
    tx.push(SynthMessage::AllNotesOff).ok();
    std::thread::sleep(Duration::from_secs(2));
    Ok(())
}

struct Player {
    synth: Synth,
    rx: Consumer<SynthMessage>,
    row: usize,
    row_pending: bool,
    last_lead: Option<u8>,
    finished: bool,
}

impl Player {
    /// Fill an interleaved stereo block, stepping the patterns at every row
    /// boundary the render driver reports.
    fn render_block(&mut self, out: &mut [f32]) {
        while let Ok(msg) = self.rx.pop() {
            match msg {
                SynthMessage::NoteOn { part, note } => {
                    self.synth.note_on(part as usize, note);
                }
                SynthMessage::NoteOff { part, note } => {
                    self.synth.note_off(part as usize, note);
                }
                SynthMessage::AllNotesOff => {
                    self.synth.all_notes_off();
                    self.finished = true;
                }
            }
        }

        let mut offset = 0;
        while offset < out.len() {
            if self.row_pending {
                self.step_row();
                self.row_pending = false;
            }
            let result = self.synth.render(&mut out[offset..]);
            offset += result.frames * 2;
            if result.status == RenderStatus::RowBoundary {
                self.row += 1;
                self.row_pending = true;
            }
            if result.frames == 0 && result.status == RenderStatus::BufferFull {
                out[offset..].fill(0.0);
                break;
            }
        }
    }

    fn step_row(&mut self) {
        if self.finished {
            return;
        }
        let row = self.row % demo::ROWS;

        match demo::BASS_PATTERN[row] {
            0 => self.release_part(0),
            note => {
                self.synth.note_on(0, note);
            }
        }

        let lead = demo::LEAD_PATTERN[row];
        if lead != 0 {
            if let Some(previous) = self.last_lead.take() {
                self.synth.note_off(1, previous);
            }
            self.synth.note_on(1, lead);
            self.last_lead = Some(lead);
        }
    }

    fn release_part(&mut self, part: usize) {
        if let Some(range) = self.synth.parts().voice_range(part) {
            for voice in range {
                self.synth.release(voice);
            }
        }
    }
}

fn build_stream<T: SizedSample + 'static>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    player: Arc<Mutex<Player>>,
    convert: fn(f32) -> T,
) -> EyreResult<cpal::Stream> {
    let mut scratch = vec![0.0f32; BLOCK_FRAMES * 2];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut player = player.lock().unwrap();
            let frames_total = data.len() / channels;
            let mut written = 0;
            while written < frames_total {
                let block = (frames_total - written).min(BLOCK_FRAMES);
                let rendered = &mut scratch[..block * 2];
                player.render_block(rendered);

                for i in 0..block {
                    let left = rendered[2 * i];
                    let right = rendered[2 * i + 1];
                    let frame = &mut data[(written + i) * channels..(written + i + 1) * channels];
                    match frame {
                        [mono] => *mono = convert(0.5 * (left + right)),
                        [l, r, rest @ ..] => {
                            *l = convert(left);
                            *r = convert(right);
                            for extra in rest {
                                *extra = convert(0.0);
                            }
                        }
                        [] => {}
                    }
                }
                written += block;
            }
        },
        |err| eprintln!("audio error: {err}"),
        None,
    )?;
    Ok(stream)
}

//! The render driver: the row/buffer state machine between the caller and
//! the per-sample interpreter.
//!
//! The call convention is "render up to N frames, stop early at a row
//! boundary": the driver fills interleaved stereo frames until either the
//! buffer is full or the row tick counter reaches the row length. A row
//! boundary hands control back to the caller even with buffer space left, so
//! the caller can retrigger and release voices for the next row. Callers
//! that never observe a row boundary (or call with a pathological `speed`
//! program that stalls the row counter) must bound their own retry loop; the
//! engine cannot prove forward progress for them.

use crate::fault::Fault;
use crate::synth::Synth;
use crate::vm::run_sample;

/// Why a render call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The row finished; the row tick counter was reset to zero. Retrigger
    /// or release voices, then call again.
    RowBoundary,
    /// The output buffer filled up mid-row (or the call had nothing to do).
    BufferFull,
}

/// What one render call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderResult {
    /// Stereo frames written to the buffer.
    pub frames: usize,
    /// Time ticks advanced. Equals `frames` unless a `speed` unit stretched
    /// or squeezed the row.
    pub ticks: u32,
    pub status: RenderStatus,
    /// Accumulated fault bits; empty means a clean render. Faults never
    /// abort the call, the remaining samples still render.
    pub faults: Fault,
}

impl Synth {
    /// Render interleaved stereo into `out` (frame capacity is
    /// `out.len() / 2`; a trailing odd sample slot is never written).
    ///
    /// A zero row length renders nothing and touches no counters: it is the
    /// degenerate infinite-row guard, an explicit no-op rather than a spin.
    pub fn render(&mut self, out: &mut [f32]) -> RenderResult {
        let capacity = out.len() / 2;
        let mut frames = 0usize;
        let mut ticks = 0u32;
        let mut faults = Fault::empty();

        if self.state.samples_per_row == 0 {
            return RenderResult {
                frames: 0,
                ticks: 0,
                status: RenderStatus::BufferFull,
                faults,
            };
        }

        while frames < capacity && self.state.row_tick < self.state.samples_per_row {
            let sample = run_sample(
                &self.program,
                &mut self.state,
                &mut self.delays,
                self.sample_data.as_deref(),
            );
            out[2 * frames] = sample.left;
            out[2 * frames + 1] = sample.right;
            frames += 1;
            faults |= sample.faults;
            ticks = ticks.saturating_add(sample.ticks);
            self.state.global_tick = self.state.global_tick.wrapping_add(1);
            self.state.row_tick = self.state.row_tick.saturating_add(sample.ticks);
        }

        let status = if self.state.row_tick >= self.state.samples_per_row {
            self.state.row_tick = 0;
            RenderStatus::RowBoundary
        } else {
            RenderStatus::BufferFull
        };

        RenderResult {
            frames,
            ticks,
            status,
            faults,
        }
    }
}

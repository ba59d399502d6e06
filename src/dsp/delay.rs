//! Delay workspaces: fixed circular buffers with a damped feedback path and
//! a DC-blocking filter on the way out.
//!
//! Workspaces are owned by the engine and addressed by delay units through a
//! cursor, never by pointer. The write position is the engine's global tick
//! truncated to 16 bits, so the buffer wraps implicitly and every workspace
//! stays in lockstep with engine time.

use crate::DELAY_BUFFER_LEN;

pub struct DelayWorkspace {
    buffer: Vec<f32>,
    damp_state: f32,
    dc_in: f32,
    dc_state: f32,
}

impl DelayWorkspace {
    pub fn new() -> DelayWorkspace {
        DelayWorkspace {
            buffer: vec![0.0; DELAY_BUFFER_LEN],
            damp_state: 0.0,
            dc_in: 0.0,
            dc_state: 0.0,
        }
    }

    /// Read the tap `delay` samples behind `tick`, update the damped
    /// feedback state and write the new buffer value. Returns the delayed
    /// signal that should be summed into the output.
    pub fn tap(&mut self, tick: u16, delay: f32, damp: f32, feedback: f32, pregain2: f32, signal: f32) -> f32 {
        let read = tick.wrapping_sub((delay + 0.5) as u16) as usize;
        let delayed = self.buffer[read];
        self.damp_state = damp * self.damp_state + (1.0 - damp) * delayed;
        self.buffer[tick as usize] = feedback * self.damp_state + pregain2 * signal;
        delayed
    }

    /// One-pole DC blocker applied to the summed dry + wet output.
    pub fn dc_block(&mut self, input: f32) -> f32 {
        self.dc_state = input + (0.99609375 * self.dc_state - self.dc_in);
        self.dc_in = input;
        self.dc_state
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.damp_state = 0.0;
        self.dc_in = 0.0;
        self.dc_state = 0.0;
    }
}

impl Default for DelayWorkspace {
    fn default() -> DelayWorkspace {
        DelayWorkspace::new()
    }
}

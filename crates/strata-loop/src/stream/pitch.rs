//! Pitch shifting seam.
//!
//! The DSP backend is supplied by the host; the engine only needs these four calls.

pub trait PitchShifter: Send {
    /// Ratio of output to input pitch, 1.0 for none.
    fn set_pitch(&mut self, ratio: f32);

    /// Shifts `frames` interleaved frames from `input` into `output`.
    fn process(&mut self, input: &[f32], output: &mut [f32], frames: usize);

    /// Frames of delay the shifter adds.
    fn latency(&self) -> usize;

    /// Drops internal state after a discontinuity.
    fn reset(&mut self);
}

/// Passes audio through untouched.
#[derive(Debug, Default, Clone)]
pub struct BypassShifter {
    ratio: f32,
}

impl PitchShifter for BypassShifter {
    fn set_pitch(&mut self, ratio: f32) {
        if (ratio - self.ratio).abs() > f32::EPSILON {
            tracing::debug!(ratio, "no pitch shifter installed, pitch change ignored");
            self.ratio = ratio;
        }
    }

    fn process(&mut self, input: &[f32], output: &mut [f32], _frames: usize) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
    }

    fn latency(&self) -> usize {
        0
    }

    fn reset(&mut self) {}
}

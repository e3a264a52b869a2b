//! Hardware input turned into loop-rate frames.

use strata_core::Smoother;

use super::{Resampler, Stream, MAX_RATE};

/// Scales each interrupt's input to the loop rate and hands it out in sub-blocks.
///
/// Under a rate shift the loop-rate position and the hardware frames consumed diverge;
/// both are tracked.
#[derive(Debug)]
pub struct InputStream {
    stream: Stream,
    level: Smoother,
    raw: Vec<f32>,
    scaled: Vec<f32>,
    scaled_frames: usize,
    position: usize,
    original_frames: usize,
    original_consumed: usize,
    resampler: Resampler,
}

impl InputStream {
    pub fn new(channels: usize, latency: usize, max_frames: usize, fade_frames: usize) -> Self {
        let scaled_capacity = (max_frames as f32 * MAX_RATE).ceil() as usize + 1;
        Self {
            stream: Stream::new(channels, latency),
            level: Smoother::new(1.0, fade_frames as u32),
            raw: Vec::with_capacity(max_frames * channels),
            scaled: vec![0.0; scaled_capacity * channels],
            scaled_frames: 0,
            position: 0,
            original_frames: 0,
            original_consumed: 0,
            resampler: Resampler::new(channels),
        }
    }

    #[inline]
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    #[inline]
    pub fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    #[inline]
    pub fn latency(&self) -> usize {
        self.stream.latency()
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.stream.is_reverse()
    }

    pub fn set_level(&mut self, level: f32) {
        self.level.set_target(level);
    }

    /// Loads one interrupt of hardware input and returns the loop frames it covers.
    pub fn begin(&mut self, input: &[f32], frames: usize) -> usize {
        let ch = self.stream.channels();
        let capacity = self.raw.capacity() / ch;
        let frames = if frames > capacity {
            tracing::warn!(frames, capacity, "input block larger than configured maximum");
            capacity
        } else {
            frames
        };

        self.raw.clear();
        let available = (input.len() / ch).min(frames);
        self.raw.extend_from_slice(&input[..available * ch]);
        self.raw.resize(frames * ch, 0.0);
        self.level.apply_gain(&mut self.raw, ch);

        self.stream.set_interrupt_frames(frames);
        self.resampler.set_speed(self.stream.speed());
        let max_scaled = self.scaled.len() / ch;
        let scaled = self.resampler.scaled_frames(frames).min(max_scaled);
        if scaled == frames {
            self.scaled[..frames * ch].copy_from_slice(&self.raw);
        } else {
            self.resampler
                .transpose(&self.raw, &mut self.scaled[..scaled * ch]);
        }

        self.scaled_frames = scaled;
        self.position = 0;
        self.original_frames = frames;
        self.original_consumed = 0;
        scaled
    }

    /// Loop frames not yet handed out this interrupt.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.scaled_frames - self.position
    }

    /// The next `frames` loop frames without consuming them.
    pub fn peek(&self, frames: usize) -> &[f32] {
        let ch = self.stream.channels();
        let frames = frames.min(self.remaining());
        &self.scaled[self.position * ch..(self.position + frames) * ch]
    }

    /// Copies the next `frames` loop frames into `dest` and consumes them.
    pub fn read(&mut self, frames: usize, dest: &mut Vec<f32>) {
        let ch = self.stream.channels();
        let frames = frames.min(self.remaining());
        dest.clear();
        dest.extend_from_slice(&self.scaled[self.position * ch..(self.position + frames) * ch]);
        self.position += frames;
        self.original_consumed = if self.scaled_frames == 0 {
            self.original_frames
        } else {
            (self.position * self.original_frames).div_ceil(self.scaled_frames)
        };
    }

    /// Hardware frames behind what has been handed out so far.
    #[inline]
    pub fn original_frames_consumed(&self) -> usize {
        self.original_consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_passthrough() {
        let mut input = InputStream::new(1, 0, 16, 4);
        let frames = input.begin(&[0.5; 8], 8);
        assert_eq!(frames, 8);
        let mut block = Vec::new();
        input.read(3, &mut block);
        assert_eq!(block, vec![0.5; 3]);
        assert_eq!(input.remaining(), 5);
        assert_eq!(input.original_frames_consumed(), 3);
    }

    #[test]
    fn test_double_speed_doubles_loop_frames() {
        let mut input = InputStream::new(2, 256, 64, 4);
        input.stream_mut().set_speed(1, 0, 0);
        let frames = input.begin(&[0.0; 128], 64);
        assert_eq!(frames, 128);
        assert_eq!(input.latency(), 128);

        let mut block = Vec::new();
        input.read(64, &mut block);
        assert_eq!(input.original_frames_consumed(), 32);
    }

    #[test]
    fn test_short_input_is_padded() {
        let mut input = InputStream::new(1, 0, 16, 4);
        let frames = input.begin(&[1.0; 2], 4);
        assert_eq!(frames, 4);
        assert_eq!(input.peek(4), &[1.0, 1.0, 0.0, 0.0]);
    }
}

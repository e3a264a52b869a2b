//! Interleaved frame storage.

use crate::{Error, Result};

/// Growable interleaved audio.
///
/// Frames are addressed with `i64` so callers can pass cursors that sit before the start
/// (latency pre-roll) or past the end; reads outside the stored range yield silence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audio {
    samples: Vec<f32>,
    channels: usize,
}

impl Audio {
    pub fn new(channels: usize) -> Self {
        Self {
            samples: Vec::new(),
            channels: channels.max(1),
        }
    }

    pub fn with_frames(channels: usize, frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            samples: vec![0.0; frames * channels],
            channels,
        }
    }

    pub fn from_samples(channels: usize, samples: Vec<f32>) -> Result<Self> {
        let channels = channels.max(1);
        if samples.len() % channels != 0 {
            return Err(Error::MisalignedSamples {
                samples: samples.len(),
                channels,
            });
        }
        Ok(Self { samples, channels })
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Interleaved samples of one frame.
    #[inline]
    pub fn frame(&self, frame: usize) -> &[f32] {
        let base = frame * self.channels;
        &self.samples[base..base + self.channels]
    }

    #[inline]
    pub fn frame_mut(&mut self, frame: usize) -> &mut [f32] {
        let base = frame * self.channels;
        &mut self.samples[base..base + self.channels]
    }

    pub fn reserve(&mut self, frames: usize) {
        let needed = frames * self.channels;
        if needed > self.samples.capacity() {
            self.samples.reserve(needed - self.samples.len());
        }
    }

    /// Copies frames starting at `frame` into `dest`, zero-filling outside the stored range.
    pub fn read(&self, frame: i64, dest: &mut [f32]) {
        let len = self.frames() as i64;
        for (i, out) in dest.chunks_mut(self.channels).enumerate() {
            let src = frame + i as i64;
            if (0..len).contains(&src) {
                out.copy_from_slice(self.frame(src as usize));
            } else {
                out.iter_mut().for_each(|s| *s = 0.0);
            }
        }
    }

    /// Copies frames walking backwards from `frame` into `dest`.
    pub fn read_reverse(&self, frame: i64, dest: &mut [f32]) {
        let len = self.frames() as i64;
        for (i, out) in dest.chunks_mut(self.channels).enumerate() {
            let src = frame - i as i64;
            if (0..len).contains(&src) {
                out.copy_from_slice(self.frame(src as usize));
            } else {
                out.iter_mut().for_each(|s| *s = 0.0);
            }
        }
    }

    /// Grows with silence or truncates to exactly `frames`.
    pub fn resize(&mut self, frames: usize) {
        self.samples.resize(frames * self.channels, 0.0);
    }

    pub fn truncate(&mut self, frames: usize) {
        self.samples.truncate(frames * self.channels);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn zero(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Replaces the content with a copy of `other`, reusing the allocation.
    pub fn copy_from(&mut self, other: &Audio) {
        self.channels = other.channels;
        self.samples.clear();
        self.samples.extend_from_slice(&other.samples);
    }

    /// Appends interleaved samples.
    pub fn append(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Appends `frames` frames of `source` starting at `from`, wrapping around its end.
    pub fn append_wrapped(&mut self, source: &Audio, from: usize, frames: usize) {
        let len = source.frames();
        if len == 0 {
            self.resize(self.frames() + frames);
            return;
        }
        for i in 0..frames {
            let src = (from + i) % len;
            self.samples.extend_from_slice(source.frame(src));
        }
    }

    /// Opens a silent gap of `frames` at `at`.
    pub fn insert_silence(&mut self, at: usize, frames: usize) {
        let at = at.min(self.frames()) * self.channels;
        self.samples
            .splice(at..at, core::iter::repeat(0.0).take(frames * self.channels));
    }

    /// Inserts a copy of `frames` frames starting at `from` at position `at`.
    pub fn insert_copy(&mut self, at: usize, from: usize, frames: usize) {
        let at = at.min(self.frames()) * self.channels;
        let from = from.min(self.frames());
        let frames = frames.min(self.frames() - from);
        let start = from * self.channels;
        let copied: Vec<f32> = self.samples[start..start + frames * self.channels].to_vec();
        self.samples.splice(at..at, copied);
    }

    /// Removes `frames` frames starting at `at`.
    pub fn remove(&mut self, at: usize, frames: usize) {
        let at = at.min(self.frames());
        let end = (at + frames).min(self.frames());
        self.samples.drain(at * self.channels..end * self.channels);
    }

    /// Keeps only `[start, start + frames)`.
    pub fn keep(&mut self, start: usize, frames: usize) {
        let start = start.min(self.frames());
        let end = (start + frames).min(self.frames());
        self.samples.truncate(end * self.channels);
        self.samples.drain(..start * self.channels);
    }

    /// Multiplies `[start, start + frames)` by `gain`.
    pub fn scale(&mut self, start: usize, frames: usize, gain: f32) {
        let start = start.min(self.frames());
        let end = (start + frames).min(self.frames());
        self.samples[start * self.channels..end * self.channels]
            .iter_mut()
            .for_each(|s| *s *= gain);
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Audio {
        Audio::from_samples(1, (0..frames).map(|i| i as f32).collect()).unwrap()
    }

    #[test]
    fn test_misaligned_samples_rejected() {
        assert!(matches!(
            Audio::from_samples(2, vec![0.0; 5]),
            Err(Error::MisalignedSamples { samples: 5, channels: 2 })
        ));
    }

    #[test]
    fn test_read_outside_is_silent() {
        let audio = ramp(4);
        let mut dest = [9.0f32; 6];
        audio.read(-2, &mut dest);
        assert_eq!(dest, [0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_read_reverse() {
        let audio = ramp(4);
        let mut dest = [9.0f32; 5];
        audio.read_reverse(3, &mut dest);
        assert_eq!(dest, [3.0, 2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut audio = ramp(4);
        audio.insert_silence(2, 2);
        assert_eq!(audio.samples(), &[0.0, 1.0, 0.0, 0.0, 2.0, 3.0]);
        audio.remove(2, 2);
        assert_eq!(audio.samples(), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_insert_copy_duplicates_range() {
        let mut audio = ramp(4);
        audio.insert_copy(2, 0, 2);
        assert_eq!(audio.samples(), &[0.0, 1.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_keep_range() {
        let mut audio = ramp(6);
        audio.keep(1, 3);
        assert_eq!(audio.samples(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_append_wrapped() {
        let source = ramp(3);
        let mut audio = Audio::new(1);
        audio.append_wrapped(&source, 2, 4);
        assert_eq!(audio.samples(), &[2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_peak() {
        let audio = Audio::from_samples(2, vec![0.1, -0.8, 0.3, 0.2]).unwrap();
        assert_eq!(audio.peak(), 0.8);
    }
}

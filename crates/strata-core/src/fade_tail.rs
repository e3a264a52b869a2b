//! Ring buffer of faded-out audio mixed into the output after a discontinuity.
//!
//! When playback jumps (layer change, seek, mute), the last frames that *would* have played
//! are faded out and parked here. The tail is then mixed on top of whatever plays next, so
//! the old material decays instead of cutting off.

use crate::Audio;

/// Accumulating fade-out ring.
///
/// `start` is the ring position matching the beginning of the current output block;
/// `record_offset` positions the next [`add`](FadeTail::add) relative to it.
#[derive(Debug, Clone)]
pub struct FadeTail {
    buffer: Vec<f32>,
    channels: usize,
    capacity: usize,
    start: usize,
    frames: usize,
    record_offset: usize,
}

impl FadeTail {
    /// `max_frames` must cover the largest block plus one fade range.
    pub fn new(channels: usize, max_frames: usize) -> Self {
        let channels = channels.max(1);
        let capacity = max_frames.max(1);
        Self {
            buffer: vec![0.0; capacity * channels],
            channels,
            capacity,
            start: 0,
            frames: 0,
            record_offset: 0,
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.frames > 0
    }

    /// Offset into the current block at which the next tail begins.
    #[inline]
    pub fn set_record_offset(&mut self, offset: usize) {
        self.record_offset = offset;
    }

    #[inline]
    pub fn record_offset(&self) -> usize {
        self.record_offset
    }

    /// Mixes `frames` of an already faded tail into the ring.
    ///
    /// Several sources may land in the same block; `frames` only grows when the new tail
    /// reaches past what is buffered.
    pub fn add(&mut self, tail: &[f32], frames: usize) {
        let mut frames = frames.min(tail.len() / self.channels);
        if self.record_offset + frames > self.capacity {
            tracing::error!(
                record_offset = self.record_offset,
                frames,
                capacity = self.capacity,
                "fade tail overflow, truncating"
            );
            frames = self.capacity.saturating_sub(self.record_offset);
        }
        if frames == 0 {
            return;
        }

        let mut dest = (self.start + self.record_offset) % self.capacity;
        for frame in tail.chunks(self.channels).take(frames) {
            let base = dest * self.channels;
            for (slot, sample) in self.buffer[base..base + self.channels].iter_mut().zip(frame) {
                *slot += *sample;
            }
            dest += 1;
            if dest == self.capacity {
                dest = 0;
            }
        }

        let extent = self.record_offset + frames;
        if extent > self.frames {
            self.frames = extent;
        }
    }

    /// Captures `range` frames of `audio` starting at `frame`, fades them out and adds them.
    ///
    /// `reverse` reads backwards from `frame`.
    pub fn capture(&mut self, audio: &Audio, frame: i64, range: usize, reverse: bool, scratch: &mut Vec<f32>) {
        scratch.clear();
        scratch.resize(range * self.channels, 0.0);
        if reverse {
            audio.read_reverse(frame, scratch);
        } else {
            audio.read(frame, scratch);
        }
        crate::fade::fade_out(scratch, self.channels, range);
        self.add(&scratch[..], range);
    }

    /// Mixes up to `frames` buffered frames into `out` and releases them.
    pub fn play(&mut self, out: &mut [f32], frames: usize) {
        let frames = frames.min(self.frames).min(out.len() / self.channels);
        let mut src = self.start;
        for frame in out.chunks_mut(self.channels).take(frames) {
            let base = src * self.channels;
            for (o, slot) in frame.iter_mut().zip(&mut self.buffer[base..base + self.channels]) {
                *o += *slot;
                *slot = 0.0;
            }
            src += 1;
            if src == self.capacity {
                src = 0;
            }
        }
        self.start = src;
        self.frames -= frames;
        self.record_offset = 0;
    }

    /// Realigns the ring with a new output block without consuming anything.
    ///
    /// Used when a block renders fewer frames than the tail holds.
    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.start = 0;
        self.frames = 0;
        self.record_offset = 0;
    }
}

//! Rendering loop layers into the hardware output.

use strata_core::fade::{fade_in, fade_out, Fade, FadeDirection};
use strata_core::{wrap_frame, FadeTail, Smoother};

use super::{BypassShifter, PitchShifter, Resampler, Stream, MAX_RATE};
use crate::layer::{LayerId, LayerPool};

/// Renders sub-blocks of loop frames and fixes up discontinuities between them.
///
/// A sub-block that does not continue where the previous one stopped (another layer, a
/// jump, a direction change) fades in, and the material that would have continued is
/// faded out into a [`FadeTail`] mixed on top.
pub struct OutputStream {
    stream: Stream,
    level: Smoother,
    pan: Smoother,
    loop_buffer: Vec<f32>,
    loop_position: usize,
    out: Vec<f32>,
    out_frames: usize,
    last_layer: Option<LayerId>,
    last_frame: i64,
    last_reverse: bool,
    layer_shift: bool,
    muted: bool,
    fade: Fade,
    fade_frames: usize,
    tail: FadeTail,
    outer_tail: FadeTail,
    scratch: Vec<f32>,
    shifted: Vec<f32>,
    resampler: Resampler,
    shifter: Box<dyn PitchShifter>,
    shifting: bool,
}

impl core::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutputStream")
            .field("last_layer", &self.last_layer)
            .field("last_frame", &self.last_frame)
            .field("muted", &self.muted)
            .field("tail_frames", &self.tail.frames())
            .finish_non_exhaustive()
    }
}

impl OutputStream {
    pub fn new(channels: usize, latency: usize, max_frames: usize, fade_frames: usize) -> Self {
        let loop_capacity = (max_frames as f32 * MAX_RATE).ceil() as usize + 1;
        let tail_capacity = loop_capacity + fade_frames;
        Self {
            stream: Stream::new(channels, latency),
            level: Smoother::new(1.0, fade_frames as u32),
            pan: Smoother::new(0.5, fade_frames as u32),
            loop_buffer: vec![0.0; loop_capacity * channels],
            loop_position: 0,
            out: vec![0.0; max_frames * channels],
            out_frames: 0,
            last_layer: None,
            last_frame: 0,
            last_reverse: false,
            layer_shift: false,
            muted: true,
            fade: Fade::new(fade_frames),
            fade_frames,
            tail: FadeTail::new(channels, tail_capacity),
            outer_tail: FadeTail::new(channels, max_frames + fade_frames),
            scratch: Vec::with_capacity(fade_frames * channels),
            shifted: vec![0.0; max_frames * channels],
            resampler: Resampler::new(channels),
            shifter: Box::new(BypassShifter::default()),
            shifting: false,
        }
    }

    pub fn set_pitch_shifter(&mut self, shifter: Box<dyn PitchShifter>) {
        self.shifter = shifter;
        self.shifting = false;
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

    /// 0.0 hard left, 0.5 center, 1.0 hard right.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan.set_target(pan);
    }

    /// Loop frames rendered so far in this interrupt.
    #[inline]
    pub fn position(&self) -> usize {
        self.loop_position
    }

    #[inline]
    pub fn last_layer(&self) -> Option<LayerId> {
        self.last_layer
    }

    #[inline]
    pub fn last_frame(&self) -> i64 {
        self.last_frame
    }

    /// Marks the next render as a seamless continuation, whatever it looks like.
    pub fn set_layer_shift(&mut self, shift: bool) {
        self.layer_shift = shift;
    }

    /// Pretends the previous render came from `layer`, ending just before `frame`.
    pub fn set_last_layer(&mut self, layer: Option<LayerId>, frame: i64) {
        self.last_layer = layer;
        self.last_frame = frame;
    }

    /// Forgets the last layer, e.g. after it was freed.
    pub fn forget_layer(&mut self, layer: LayerId) {
        if self.last_layer == Some(layer) {
            self.last_layer = None;
        }
    }

    pub fn begin(&mut self, frames: usize) {
        let max = self.out.len() / self.stream.channels();
        if frames > max {
            tracing::warn!(frames, max, "output block larger than configured maximum");
        }
        self.out_frames = frames.min(max);
        self.loop_position = 0;
        self.stream.set_interrupt_frames(self.out_frames);
    }

    fn loop_capacity(&self) -> usize {
        self.loop_buffer.len() / self.stream.channels()
    }

    /// Renders `frames` from `layer` at `frame`, or silence when `mute` is set.
    pub fn play(&mut self, pool: &LayerPool, layer: LayerId, frame: i64, frames: usize, mute: bool) {
        let ch = self.stream.channels();
        let frames = frames.min(self.loop_capacity() - self.loop_position);
        let reverse = self.stream.is_reverse();
        let contiguous = self.last_layer == Some(layer)
            && self.last_frame == frame
            && self.last_reverse == reverse;
        let discontinuity = !contiguous && !self.layer_shift;

        if (discontinuity || mute) && !self.muted {
            self.capture_tail(pool);
        }

        let start = self.loop_position * ch;
        let dest = &mut self.loop_buffer[start..start + frames * ch];
        if mute {
            dest.iter_mut().for_each(|s| *s = 0.0);
        } else {
            match pool.get(layer) {
                Some(l) => l.play(frame, dest, reverse),
                None => {
                    tracing::error!(?layer, "rendering a freed layer");
                    dest.iter_mut().for_each(|s| *s = 0.0);
                }
            }
            if discontinuity || self.muted {
                self.fade.start(FadeDirection::In);
            }
            self.fade.apply(dest, ch);
        }

        self.muted = mute;
        self.layer_shift = false;
        self.last_layer = Some(layer);
        self.last_frame = frame + frames as i64;
        self.last_reverse = reverse;
        self.loop_position += frames;
    }

    /// Renders silence, fading out whatever was playing.
    pub fn play_silence(&mut self, pool: &LayerPool, frames: usize) {
        let ch = self.stream.channels();
        let frames = frames.min(self.loop_capacity() - self.loop_position);
        if !self.muted {
            self.capture_tail(pool);
        }
        let start = self.loop_position * ch;
        self.loop_buffer[start..start + frames * ch]
            .iter_mut()
            .for_each(|s| *s = 0.0);
        self.muted = true;
        self.layer_shift = false;
        self.loop_position += frames;
    }

    /// Fades out what the last layer would have played next into the tail.
    pub fn capture_tail(&mut self, pool: &LayerPool) {
        let Some(layer) = self.last_layer.and_then(|id| pool.get(id)) else {
            return;
        };
        let frames = layer.frames();
        // a render that stopped on the loop end continues from the start
        let next = wrap_frame(self.last_frame, frames);
        let phys = if self.last_reverse {
            frames - 1 - next
        } else {
            next
        };
        self.tail.set_record_offset(self.loop_position);
        self.tail.capture(
            layer.audio(),
            phys,
            self.fade_frames,
            self.last_reverse,
            &mut self.scratch,
        );
        self.muted = true;
    }

    /// Finishes the interrupt: mixes tails, converts to hardware rate, shifts pitch and
    /// applies level and pan. Returns the hardware frames.
    pub fn finish(&mut self) -> &[f32] {
        let ch = self.stream.channels();
        let loop_frames = self.loop_position;
        let out_frames = self.out_frames;

        self.tail
            .play(&mut self.loop_buffer[..loop_frames * ch], loop_frames);

        self.resampler.set_speed(self.stream.speed());
        let out = &mut self.out[..out_frames * ch];
        if loop_frames == out_frames {
            out.copy_from_slice(&self.loop_buffer[..loop_frames * ch]);
        } else {
            self.resampler
                .transpose(&self.loop_buffer[..loop_frames * ch], out);
        }

        self.apply_pitch(out_frames);

        let out = &mut self.out[..out_frames * ch];
        self.outer_tail.play(out, out_frames);
        self.level.apply_gain(out, ch);
        self.pan.apply_pan(out, ch);
        &self.out[..out_frames * ch]
    }

    fn apply_pitch(&mut self, frames: usize) {
        let ch = self.stream.channels();
        let pitch = self.stream.pitch();
        let wanted = (pitch - 1.0).abs() > 1e-4;
        let out = &mut self.out[..frames * ch];
        let shifted = &mut self.shifted[..frames * ch];

        if wanted != self.shifting {
            // the old path fades out through the outer tail while the new one fades in
            if self.shifting {
                self.shifter.process(out, shifted, frames);
                self.shifter.reset();
            } else {
                shifted.copy_from_slice(out);
            }
            fade_out(shifted, ch, self.fade_frames);
            self.outer_tail.set_record_offset(0);
            self.outer_tail.add(shifted, frames.min(self.fade_frames));
            self.shifting = wanted;
            tracing::debug!(pitch, shifting = wanted, "pitch path changed");

            if self.shifting {
                self.shifter.set_pitch(pitch);
                self.shifter.process(out, shifted, frames);
                out.copy_from_slice(shifted);
            }
            fade_in(out, ch, self.fade_frames);
            return;
        }

        if self.shifting {
            self.shifter.set_pitch(pitch);
            self.shifter.process(out, shifted, frames);
            out.copy_from_slice(shifted);
        }
    }

    /// Drops all fade state, e.g. after a track reset.
    pub fn reset(&mut self) {
        self.tail.reset();
        self.outer_tail.reset();
        self.last_layer = None;
        self.last_frame = 0;
        self.layer_shift = false;
        self.muted = true;
        self.fade.cancel();
        self.resampler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Audio;

    fn pool_with(samples: Vec<f32>) -> (LayerPool, LayerId) {
        let mut pool = LayerPool::new(1, 4);
        let id = pool.alloc();
        pool[id].load_audio(&Audio::from_samples(1, samples).unwrap());
        (pool, id)
    }

    #[test]
    fn test_first_render_fades_in() {
        let (pool, id) = pool_with(vec![1.0; 32]);
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 0, 8, false);
        let rendered = out.finish().to_vec();
        assert_eq!(rendered[0], 0.0);
        assert_eq!(&rendered[4..], &[1.0; 4]);
    }

    #[test]
    fn test_contiguous_renders_do_not_fade() {
        let (pool, id) = pool_with(vec![1.0; 32]);
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 0, 8, false);
        out.finish();
        out.begin(8);
        out.play(&pool, id, 8, 4, false);
        out.play(&pool, id, 12, 4, false);
        assert_eq!(out.finish(), &[1.0; 8]);
    }

    #[test]
    fn test_jump_captures_tail() {
        let (mut pool, id) = pool_with(vec![1.0; 32]);
        let silent = pool.alloc();
        pool[silent].load_audio(&Audio::with_frames(1, 32));
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 0, 8, false);
        out.finish();

        out.begin(8);
        out.play(&pool, silent, 0, 8, false);
        let rendered = out.finish().to_vec();
        assert_eq!(&rendered[..4], &[0.75, 0.5, 0.25, 0.0]);
        assert_eq!(&rendered[4..], &[0.0; 4]);
    }

    #[test]
    fn test_tail_at_loop_end_fades_from_start() {
        let mut samples = vec![0.5; 32];
        samples[..8].fill(1.0);
        let (mut pool, id) = pool_with(samples);
        let silent = pool.alloc();
        pool[silent].load_audio(&Audio::with_frames(1, 32));
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 24, 8, false);
        out.finish();

        out.begin(8);
        out.play(&pool, silent, 0, 8, false);
        let rendered = out.finish().to_vec();
        assert_eq!(&rendered[..4], &[0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_layer_shift_suppresses_fade() {
        let (mut pool, id) = pool_with(vec![1.0; 32]);
        let next = pool.copy(id);
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 0, 8, false);
        out.finish();

        out.begin(8);
        out.set_layer_shift(true);
        out.play(&pool, next, 0, 8, false);
        assert_eq!(out.finish(), &[1.0; 8]);
    }

    #[test]
    fn test_mute_fades_out() {
        let (pool, id) = pool_with(vec![1.0; 32]);
        let mut out = OutputStream::new(1, 0, 16, 4);
        out.begin(8);
        out.play(&pool, id, 0, 8, false);
        out.finish();

        out.begin(8);
        out.play(&pool, id, 8, 8, true);
        let rendered = out.finish().to_vec();
        assert_eq!(&rendered[..4], &[0.75, 0.5, 0.25, 0.0]);
    }
}

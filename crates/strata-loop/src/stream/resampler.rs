//! Rate conversion between hardware frames and loop frames.

use strata_core::MAX_CHANNELS;

/// Linear-interpolating resampler that fits one block onto another.
///
/// The input stream turns `N` hardware frames into `N * speed` loop frames; the output
/// stream turns them back. The fractional remainder is carried between blocks so the
/// long-run frame count matches the rate exactly.
#[derive(Debug, Clone)]
pub struct Resampler {
    channels: usize,
    speed: f32,
    remainder: f64,
    last: [f32; MAX_CHANNELS],
}

impl Resampler {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.clamp(1, MAX_CHANNELS),
            speed: 1.0,
            remainder: 0.0,
            last: [0.0; MAX_CHANNELS],
        }
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        if (speed - self.speed).abs() > f32::EPSILON {
            self.speed = speed;
            self.remainder = 0.0;
        }
    }

    /// Loop frames covered by `frames` hardware frames, consuming the carried remainder.
    pub fn scaled_frames(&mut self, frames: usize) -> usize {
        if (self.speed - 1.0).abs() <= f32::EPSILON {
            return frames;
        }
        let exact = frames as f64 * self.speed as f64 + self.remainder;
        let whole = exact.floor();
        self.remainder = exact - whole;
        whole as usize
    }

    /// Stretches `input` to fill `output` exactly.
    ///
    /// Output frame `k` samples the input at `(k + 1) * in / out - 1`, interpolating
    /// against the last frame of the previous block at the left edge.
    pub fn transpose(&mut self, input: &[f32], output: &mut [f32]) {
        let ch = self.channels;
        let in_frames = input.len() / ch;
        let out_frames = output.len() / ch;
        if in_frames == 0 || out_frames == 0 {
            output.iter_mut().for_each(|s| *s = 0.0);
            return;
        }
        if in_frames == out_frames {
            output.copy_from_slice(&input[..out_frames * ch]);
        } else {
            let ratio = in_frames as f64 / out_frames as f64;
            for (k, out) in output.chunks_mut(ch).enumerate() {
                let x = (k + 1) as f64 * ratio - 1.0;
                let i = x.floor();
                let frac = (x - i) as f32;
                let i = i as i64;
                for (c, o) in out.iter_mut().enumerate() {
                    let a = if i < 0 { self.last[c] } else { input[i as usize * ch + c] };
                    let b = if i + 1 < in_frames as i64 {
                        input[(i + 1) as usize * ch + c]
                    } else {
                        a
                    };
                    *o = a + (b - a) * frac;
                }
            }
        }
        let tail = (in_frames - 1) * ch;
        self.last[..ch].copy_from_slice(&input[tail..tail + ch]);
    }

    pub fn reset(&mut self) {
        self.remainder = 0.0;
        self.last = [0.0; MAX_CHANNELS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_is_identity() {
        let mut r = Resampler::new(1);
        let input = [0.1, 0.2, 0.3, 0.4];
        let mut output = [0.0; 4];
        assert_eq!(r.scaled_frames(4), 4);
        r.transpose(&input, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn test_remainder_carries() {
        let mut r = Resampler::new(2);
        r.set_speed(1.5);
        let total: usize = (0..4).map(|_| r.scaled_frames(3)).sum();
        assert_eq!(total, 18);
    }

    #[test]
    fn test_upsample_ends_on_last_input() {
        let mut r = Resampler::new(1);
        let input = [0.0, 1.0, 2.0, 3.0];
        let mut output = [0.0; 8];
        r.transpose(&input, &mut output);
        assert_eq!(output[7], 3.0);
        assert_eq!(output[1], 0.0);
        assert!((output[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_downsample_picks_every_other() {
        let mut r = Resampler::new(1);
        let input = [0.0, 1.0, 2.0, 3.0];
        let mut output = [0.0; 2];
        r.transpose(&input, &mut output);
        assert_eq!(output, [1.0, 3.0]);
    }
}

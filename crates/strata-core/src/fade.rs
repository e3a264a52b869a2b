//! Short linear ramps used wherever audio starts or stops abruptly.
//!
//! Every fade in the engine has the same length (the configured fade range). A fade-in
//! gain at offset `i` is `i / range`, and a fade-out is its mirror, so a fade-out added to
//! the matching fade-in always sums back to unity.

/// Default fade range in frames.
pub const DEFAULT_FADE_FRAMES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// Fade-in gain `offset` frames into a ramp of `range` frames.
#[inline]
pub fn ramp_gain(offset: usize, range: usize) -> f32 {
    if range == 0 || offset >= range {
        1.0
    } else {
        offset as f32 / range as f32
    }
}

/// Gain for `direction` at `offset` into the ramp.
#[inline]
pub fn fade_gain(direction: FadeDirection, offset: usize, range: usize) -> f32 {
    match direction {
        FadeDirection::In => ramp_gain(offset, range),
        FadeDirection::Out => 1.0 - ramp_gain(offset + 1, range),
    }
}

/// Fades the first `range` frames of `samples` in.
pub fn fade_in(samples: &mut [f32], channels: usize, range: usize) {
    Fade::started(FadeDirection::In, range).apply(samples, channels);
}

/// Fades `samples` out over its first `range` frames and silences the rest.
pub fn fade_out(samples: &mut [f32], channels: usize, range: usize) {
    Fade::started(FadeDirection::Out, range).apply(samples, channels);
}

/// A fade that may span several blocks.
#[derive(Debug, Clone)]
pub struct Fade {
    direction: FadeDirection,
    offset: usize,
    range: usize,
    active: bool,
}

impl Fade {
    pub fn new(range: usize) -> Self {
        Self {
            direction: FadeDirection::In,
            offset: 0,
            range: range.max(1),
            active: false,
        }
    }

    pub fn started(direction: FadeDirection, range: usize) -> Self {
        let mut fade = Self::new(range);
        fade.start(direction);
        fade
    }

    pub fn start(&mut self, direction: FadeDirection) {
        self.direction = direction;
        self.offset = 0;
        self.active = true;
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn range(&self) -> usize {
        self.range
    }

    /// Gain for the next frame, advancing the ramp.
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        if !self.active {
            return match self.direction {
                FadeDirection::In => 1.0,
                FadeDirection::Out => 0.0,
            };
        }
        let gain = fade_gain(self.direction, self.offset, self.range);
        self.offset += 1;
        if self.offset >= self.range {
            self.active = false;
            if self.direction == FadeDirection::In {
                self.offset = self.range;
            }
        }
        gain
    }

    /// Applies the remaining ramp to interleaved `samples`.
    ///
    /// A finished fade-in leaves samples untouched; a finished fade-out silences them.
    pub fn apply(&mut self, samples: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if !self.active && self.direction == FadeDirection::In {
            return;
        }
        for frame in samples.chunks_mut(channels) {
            let gain = self.next_gain();
            frame.iter_mut().for_each(|s| *s *= gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_and_out_sum_to_unity() {
        let range = 64;
        for i in 0..range {
            let sum = ramp_gain(i, range) + fade_gain(FadeDirection::Out, i, range);
            // out(i) is 1 - in(i + 1): the pair overlaps by one frame
            assert!(sum <= 1.0 + 1e-6);
        }
        assert_eq!(fade_gain(FadeDirection::Out, range - 1, range), 0.0);
    }

    #[test]
    fn test_fade_in_starts_silent() {
        let mut block = [1.0f32; 8];
        fade_in(&mut block, 2, 4);
        assert_eq!(block[0], 0.0);
        assert_eq!(block[2], 0.25);
        assert_eq!(block[7], 0.75);
    }

    #[test]
    fn test_fade_out_silences_tail() {
        let mut block = [1.0f32; 16];
        fade_out(&mut block, 1, 4);
        assert_eq!(block[0], 0.75);
        assert_eq!(block[3], 0.0);
        assert!(block[4..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_fade_spans_blocks() {
        let mut fade = Fade::started(FadeDirection::In, 8);
        let mut a = [1.0f32; 4];
        let mut b = [1.0f32; 8];
        fade.apply(&mut a, 1);
        fade.apply(&mut b, 1);
        assert_eq!(a[3], 0.375);
        assert_eq!(b[0], 0.5);
        assert_eq!(b[4], 1.0);
        assert!(!fade.is_active());
    }
}

//! Zipper-free level changes for stream gain and pan.
//!
//! ```
//! use strata_core::Smoother;
//!
//! // 64-frame ramp
//! let mut level = Smoother::new(1.0, 64);
//! level.set_target(0.5);
//!
//! let mut block = [1.0f32; 256]; // 128 stereo frames
//! level.apply_gain(&mut block, 2);
//! assert_eq!(block[255], 0.5);
//! ```

/// Linear ramp from the current value to a target over a fixed number of frames.
///
/// Advances once per *frame*, so every channel of an interleaved frame gets the same gain.
#[derive(Debug, Clone)]
pub struct Smoother {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_frames: u32,
}

impl Smoother {
    pub fn new(initial: f32, ramp_frames: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_frames: ramp_frames.max(1),
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if (target - self.target).abs() < f32::EPSILON {
            return;
        }
        self.target = target;
        self.remaining = self.ramp_frames;
        self.step = (self.target - self.current) / self.remaining as f32;
    }

    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Value for the next frame.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Multiplies interleaved `samples` by the ramp, one step per frame.
    pub fn apply_gain(&mut self, samples: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if !self.is_active() {
            if (self.current - 1.0).abs() >= f32::EPSILON {
                let gain = self.current;
                samples.iter_mut().for_each(|s| *s *= gain);
            }
            return;
        }
        for frame in samples.chunks_mut(channels) {
            let gain = self.next();
            frame.iter_mut().for_each(|s| *s *= gain);
        }
    }

    /// Applies a stereo pan ramp where 0.0 is hard left, 0.5 center and 1.0 hard right.
    ///
    /// Frames with a channel count other than two are left untouched.
    pub fn apply_pan(&mut self, samples: &mut [f32], channels: usize) {
        if channels != 2 {
            return;
        }
        for frame in samples.chunks_mut(2) {
            let pan = self.next().clamp(0.0, 1.0);
            frame[0] *= ((1.0 - pan) * 2.0).min(1.0);
            frame[1] *= (pan * 2.0).min(1.0);
        }
    }
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(1.0, crate::DEFAULT_FADE_FRAMES as u32)
    }
}

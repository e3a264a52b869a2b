//! Per-track wrappers around the hardware buffers.
//!
//! Both streams share the [`Stream`] base: rate (speed and pitch), direction and latency.
//! The input side turns hardware frames into loop frames; the output side renders loop
//! frames from a layer and turns them back.

mod input;
mod output;
mod pitch;
mod resampler;

pub use input::InputStream;
pub use output::OutputStream;
pub use pitch::{BypassShifter, PitchShifter};
pub use resampler::Resampler;

/// Fastest supported loop rate.
pub const MAX_RATE: f32 = 4.0;
/// Slowest supported loop rate.
pub const MIN_RATE: f32 = 0.25;

/// Full range of a bend or time-stretch control.
pub const BEND_RANGE: i32 = 8192;

/// Rate controls as the performer set them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rates {
    pub speed_octave: i32,
    pub speed_step: i32,
    pub speed_bend: i32,
    pub time_stretch: i32,
    pub pitch_octave: i32,
    pub pitch_step: i32,
    pub pitch_bend: i32,
}

impl Rates {
    pub fn is_normal(&self) -> bool {
        *self == Rates::default()
    }

    /// Speed-affecting controls only.
    pub fn speed_only(&self) -> Rates {
        Rates {
            speed_octave: self.speed_octave,
            speed_step: self.speed_step,
            speed_bend: self.speed_bend,
            time_stretch: self.time_stretch,
            ..Rates::default()
        }
    }

    /// Pitch-affecting controls only.
    pub fn pitch_only(&self) -> Rates {
        Rates {
            pitch_octave: self.pitch_octave,
            pitch_step: self.pitch_step,
            pitch_bend: self.pitch_bend,
            ..Rates::default()
        }
    }
}

/// Snapshot of a loop's stream settings, taken when the loop is switched away from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamState {
    pub reverse: bool,
    pub rates: Rates,
    pub frame: i64,
    pub overdub: bool,
    pub mute: bool,
}

/// Semitones contributed by a bend-style control.
fn bend_semitones(value: i32, range: i32) -> f32 {
    value.clamp(-BEND_RANGE, BEND_RANGE - 1) as f32 * range as f32 / BEND_RANGE as f32
}

/// Shared stream state.
#[derive(Debug, Clone)]
pub struct Stream {
    channels: usize,
    normal_latency: usize,
    latency: usize,
    interrupt_frames: usize,
    reverse: bool,
    rates: Rates,
    speed: f32,
    pitch: f32,
    speed_bend_range: i32,
    pitch_bend_range: i32,
    time_stretch_range: i32,
}

impl Stream {
    pub fn new(channels: usize, latency: usize) -> Self {
        Self {
            channels: channels.max(1),
            normal_latency: latency,
            latency,
            interrupt_frames: 0,
            reverse: false,
            rates: Rates::default(),
            speed: 1.0,
            pitch: 1.0,
            speed_bend_range: 12,
            pitch_bend_range: 12,
            time_stretch_range: 12,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Latency adjusted for the current speed.
    #[inline]
    pub fn latency(&self) -> usize {
        self.latency
    }

    #[inline]
    pub fn normal_latency(&self) -> usize {
        self.normal_latency
    }

    pub fn set_normal_latency(&mut self, latency: usize) {
        self.normal_latency = latency;
        self.latency = self.adjusted_latency(latency);
    }

    /// Hardware frames in the interrupt being processed.
    #[inline]
    pub fn interrupt_frames(&self) -> usize {
        self.interrupt_frames
    }

    pub fn set_interrupt_frames(&mut self, frames: usize) {
        self.interrupt_frames = frames;
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn rates(&self) -> Rates {
        self.rates
    }

    pub fn set_ranges(&mut self, speed_bend: i32, pitch_bend: i32, time_stretch: i32) {
        self.speed_bend_range = speed_bend;
        self.pitch_bend_range = pitch_bend;
        self.time_stretch_range = time_stretch;
        self.recalculate();
    }

    pub fn set_rates(&mut self, rates: Rates) {
        self.rates = rates;
        self.recalculate();
    }

    pub fn set_speed(&mut self, octave: i32, step: i32, bend: i32) {
        self.rates.speed_octave = octave;
        self.rates.speed_step = step;
        self.rates.speed_bend = bend;
        self.recalculate();
    }

    pub fn set_pitch(&mut self, octave: i32, step: i32, bend: i32) {
        self.rates.pitch_octave = octave;
        self.rates.pitch_step = step;
        self.rates.pitch_bend = bend;
        self.recalculate();
    }

    /// Changes speed without changing pitch.
    pub fn set_time_stretch(&mut self, level: i32) {
        self.rates.time_stretch = level;
        self.recalculate();
    }

    fn recalculate(&mut self) {
        let r = self.rates;
        let stretch = bend_semitones(r.time_stretch, self.time_stretch_range);
        let speed_semis = (r.speed_octave * 12 + r.speed_step) as f32
            + bend_semitones(r.speed_bend, self.speed_bend_range)
            + stretch;
        let pitch_semis = (r.pitch_octave * 12 + r.pitch_step) as f32
            + bend_semitones(r.pitch_bend, self.pitch_bend_range)
            - stretch;

        let speed = 2f32.powf(speed_semis / 12.0);
        self.speed = speed.clamp(MIN_RATE, MAX_RATE);
        if self.speed != speed {
            tracing::warn!(speed, clamped = self.speed, "speed out of range");
        }
        self.pitch = 2f32.powf(pitch_semis / 12.0);
        self.latency = self.adjusted_latency(self.normal_latency);
    }

    /// A nominal latency as seen at the current speed: `ceil(latency / speed)`.
    pub fn adjusted_latency(&self, latency: usize) -> usize {
        if (self.speed - 1.0).abs() <= f32::EPSILON {
            latency
        } else {
            (latency as f64 / self.speed as f64).ceil() as usize
        }
    }

    /// Signed distance from `current` to `target` on a loop of `loop_frames`, taking the
    /// short way around the loop boundary.
    pub fn calc_drift(target: i64, current: i64, loop_frames: i64) -> i64 {
        let drift = target - current;
        if loop_frames <= 0 {
            return drift;
        }
        let half = loop_frames / 2;
        if drift > half {
            drift - loop_frames
        } else if drift < -half {
            drift + loop_frames
        } else {
            drift
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_octave_doubles_speed_and_shrinks_latency() {
        let mut stream = Stream::new(2, 255);
        stream.set_speed(1, 0, 0);
        assert_relative_eq!(stream.speed(), 2.0, epsilon = 1e-6);
        assert_eq!(stream.latency(), 128);
        assert_eq!(stream.normal_latency(), 255);
    }

    #[test]
    fn test_time_stretch_keeps_pitch() {
        let mut stream = Stream::new(2, 0);
        stream.set_time_stretch(BEND_RANGE / 2);
        assert!(stream.speed() > 1.0);
        assert_relative_eq!(stream.speed() * stream.pitch(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_speed_clamped() {
        let mut stream = Stream::new(1, 0);
        stream.set_speed(4, 0, 0);
        assert_eq!(stream.speed(), MAX_RATE);
    }

    #[test]
    fn test_drift_wraps_short_way() {
        assert_eq!(Stream::calc_drift(10, 990, 1000), 20);
        assert_eq!(Stream::calc_drift(990, 10, 1000), -20);
        assert_eq!(Stream::calc_drift(600, 500, 1000), 100);
    }
}

//! The most recently recorded input, kept so a fade-out can be applied after the fact.
//!
//! Recording stops on an event that arrives *after* the last input frame has already been
//! mixed into the layer, so the fade-out has to be carved back out of what was written.

use strata_core::fade::{fade_gain, FadeDirection};
use strata_core::Audio;

#[derive(Debug, Clone)]
pub struct FadeWindow {
    samples: Vec<f32>,
    positions: Vec<i64>,
    channels: usize,
    range: usize,
    head: usize,
    count: usize,
}

impl FadeWindow {
    pub fn new(channels: usize, range: usize) -> Self {
        let channels = channels.max(1);
        let range = range.max(1);
        Self {
            samples: vec![0.0; channels * range],
            positions: vec![0; range],
            channels,
            range,
            head: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Remembers that `input * gain` was added at layer frame `position`.
    #[inline]
    pub fn push(&mut self, position: i64, input: &[f32], gain: f32) {
        let base = self.head * self.channels;
        for (slot, s) in self.samples[base..base + self.channels].iter_mut().zip(input) {
            *slot = *s * gain;
        }
        self.positions[self.head] = position;
        self.head = (self.head + 1) % self.range;
        self.count = (self.count + 1).min(self.range);
    }

    /// Fades the remembered input out of `audio` and forgets it.
    pub fn fade_out(&mut self, audio: &mut Audio) {
        let len = audio.frames() as i64;
        let oldest = (self.head + self.range - self.count) % self.range;
        for i in 0..self.count {
            let idx = (oldest + i) % self.range;
            let pos = self.positions[idx];
            if !(0..len).contains(&pos) {
                continue;
            }
            let removed = 1.0 - fade_gain(FadeDirection::Out, i, self.count);
            let base = idx * self.channels;
            let contribution = &self.samples[base..base + self.channels];
            for (d, c) in audio.frame_mut(pos as usize).iter_mut().zip(contribution) {
                *d -= *c * removed;
            }
        }
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_out_reaches_silence() {
        let mut audio = Audio::with_frames(1, 8);
        let mut window = FadeWindow::new(1, 4);
        for pos in 0..8 {
            audio.frame_mut(pos)[0] += 1.0;
            window.push(pos as i64, &[1.0], 1.0);
        }
        window.fade_out(&mut audio);
        assert_eq!(&audio.samples()[..4], &[1.0; 4]);
        assert_eq!(audio.samples()[4], 0.75);
        assert_eq!(audio.samples()[7], 0.0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_short_window_fades_what_it_has() {
        let mut audio = Audio::from_samples(1, vec![1.0, 1.0]).unwrap();
        let mut window = FadeWindow::new(1, 16);
        window.push(0, &[1.0], 1.0);
        window.push(1, &[1.0], 1.0);
        window.fade_out(&mut audio);
        assert_eq!(audio.samples(), &[0.5, 0.0]);
    }
}

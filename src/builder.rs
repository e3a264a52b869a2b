//! Builder for configuring and constructing a `StrataEngine`.

use strata_core::{EngineConfig, Preset};

use crate::{Result, StrataEngine};

/// Every track starts from the shared preset unless given its own with
/// [`track_preset`](Self::track_preset). The configuration is validated and presets are
/// sanitized on [`build`](Self::build).
///
/// # Example
///
/// ```ignore
/// use strata::prelude::*;
///
/// let mut engine = StrataEngine::builder()
///     .sample_rate(48000)
///     .tracks(4)
///     .latency(256, 256)
///     .build()?;
///
/// let handle = engine.handle();
/// handle.invoke(Action::new(Function::Record))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct StrataEngineBuilder {
    config: EngineConfig,
    preset: Preset,
    track_presets: Vec<(usize, Preset)>,
}

impl StrataEngineBuilder {
    /// Default: 44100
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Default: 2
    pub fn channels(mut self, count: usize) -> Self {
        self.config.channels = count;
        self
    }

    /// Default: 1
    pub fn tracks(mut self, count: usize) -> Self {
        self.config.tracks = count;
        self
    }

    /// Default: 4
    pub fn loops_per_track(mut self, count: usize) -> Self {
        self.config.loops_per_track = count;
        self
    }

    /// Device input and output latency in frames.
    pub fn latency(mut self, input: usize, output: usize) -> Self {
        self.config.input_latency = input;
        self.config.output_latency = output;
        self
    }

    pub fn fade_frames(mut self, frames: usize) -> Self {
        self.config.fade_frames = frames;
        self
    }

    /// Replaces the whole configuration, including anything set before.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Preset for every track without one of its own.
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn track_preset(mut self, track: usize, preset: Preset) -> Self {
        self.track_presets.retain(|(n, _)| *n != track);
        self.track_presets.push((track, preset));
        self
    }

    pub fn build(self) -> Result<StrataEngine> {
        self.config.validate()?;

        let mut presets = vec![self.preset; self.config.tracks];
        for (track, preset) in self.track_presets {
            match presets.get_mut(track) {
                Some(slot) => *slot = preset,
                None => tracing::warn!(track, tracks = self.config.tracks, "preset for unknown track ignored"),
            }
        }
        for preset in &mut presets {
            preset.sanitize();
        }

        Ok(StrataEngine::from_parts(self.config, presets))
    }
}

#[cfg(test)]
mod tests {
    use strata_core::QuantizeMode;

    use super::*;
    use crate::Error;

    #[test]
    fn test_build_defaults() {
        let engine = StrataEngineBuilder::default().build().unwrap();
        assert_eq!(engine.track_count(), 1);
        assert_eq!(engine.config().loops_per_track, 4);
        assert_eq!(engine.track(0).unwrap().loop_count(), 4);
    }

    #[test]
    fn test_track_presets() {
        let quantized = Preset {
            quantize: QuantizeMode::Loop,
            ..Default::default()
        };
        let engine = StrataEngine::builder()
            .tracks(3)
            .track_preset(1, quantized)
            .track_preset(7, Preset::default())
            .build()
            .unwrap();
        assert_eq!(engine.track(0).unwrap().preset().quantize, QuantizeMode::Off);
        assert_eq!(engine.track(1).unwrap().preset().quantize, QuantizeMode::Loop);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = StrataEngine::builder().channels(0).build();
        assert!(matches!(result, Err(Error::Core(_))));
        let result = StrataEngine::builder().tracks(0).build();
        assert!(result.is_err());
    }
}

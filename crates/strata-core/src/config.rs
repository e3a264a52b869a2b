//! Engine-wide configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on interleaved channels per track.
pub const MAX_CHANNELS: usize = 8;

/// Upper bound on either stream latency.
pub const MAX_LATENCY_FRAMES: usize = 16384;

/// Configuration shared by every track in the engine.
///
/// Latencies are the device's reported input and output latency in frames. Loops use them
/// to keep what is recorded aligned with what the performer heard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: usize,
    pub tracks: usize,
    pub loops_per_track: usize,
    pub input_latency: usize,
    pub output_latency: usize,
    /// Largest block the host will ever hand to one interrupt.
    pub max_interrupt_frames: usize,
    /// Length of every fade ramp (record edges, mutes, discontinuities).
    pub fade_frames: usize,
    /// Peak level below which an overdub pass counts as silence and is discarded.
    pub noise_floor: f32,
    /// Maximum committed layers kept per loop, 0 for unlimited.
    pub max_undo: usize,
    /// Maximum layers kept on the redo chain, 0 for unlimited.
    pub max_redo: usize,
    /// Capacity of the control to audio action queue.
    pub action_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            tracks: 1,
            loops_per_track: 4,
            input_latency: 0,
            output_latency: 0,
            max_interrupt_frames: 4096,
            fade_frames: crate::DEFAULT_FADE_FRAMES,
            noise_floor: 13.0 / 32768.0,
            max_undo: 0,
            max_redo: 1,
            action_queue: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(Error::InvalidChannels(self.channels));
        }
        if self.tracks == 0 {
            return Err(Error::InvalidConfig("at least one track is required".into()));
        }
        if self.loops_per_track == 0 {
            return Err(Error::InvalidConfig(
                "at least one loop per track is required".into(),
            ));
        }
        if self.input_latency > MAX_LATENCY_FRAMES {
            return Err(Error::InvalidLatency(self.input_latency));
        }
        if self.output_latency > MAX_LATENCY_FRAMES {
            return Err(Error::InvalidLatency(self.output_latency));
        }
        if self.max_interrupt_frames == 0 {
            return Err(Error::InvalidConfig(
                "max_interrupt_frames must be positive".into(),
            ));
        }
        if self.fade_frames == 0 || self.fade_frames > self.max_interrupt_frames {
            return Err(Error::InvalidConfig(format!(
                "fade_frames {} must be between 1 and max_interrupt_frames ({})",
                self.fade_frames, self.max_interrupt_frames
            )));
        }
        if !(0.0..1.0).contains(&self.noise_floor) {
            return Err(Error::InvalidConfig(format!(
                "noise_floor {} out of range (0.0-1.0)",
                self.noise_floor
            )));
        }
        if self.action_queue == 0 {
            return Err(Error::InvalidConfig("action_queue must be positive".into()));
        }
        Ok(())
    }

    /// Combined input and output latency.
    #[inline]
    pub fn total_latency(&self) -> usize {
        self.input_latency + self.output_latency
    }

    #[cfg(feature = "serde-json")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde-json")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_channels() {
        let config = EngineConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidChannels(0))));
    }

    #[test]
    fn test_rejects_oversized_fade() {
        let config = EngineConfig {
            fade_frames: 8192,
            max_interrupt_frames: 256,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "input_latency": 256, "output_latency": 128 }"#).unwrap();
        assert_eq!(config.total_latency(), 384);
        assert_eq!(config.loops_per_track, 4);
        assert!(config.validate().is_ok());
    }
}

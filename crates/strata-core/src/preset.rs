//! Per-track behavior settings.
//!
//! A [`Preset`] is plain data: tracks read it on every scheduling decision, so changing a
//! field takes effect on the next invoked function. Values arriving from a UI or a saved
//! file may be out of range; [`Preset::sanitize`] clamps them instead of failing.

use serde::{Deserialize, Serialize};

/// How a rounded multiply end is allowed to extend the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiplyMode {
    /// End is clamped to the recorded length; the start moves back to keep whole cycles.
    #[default]
    Normal,
    /// End may extend past the recorded length.
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuantizeMode {
    #[default]
    Off,
    SubCycle,
    Cycle,
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MuteMode {
    /// Playback keeps running silently.
    #[default]
    Continuous,
    /// Unmuting restarts the loop from its start.
    Start,
    /// Muting freezes the loop in place.
    Pause,
}

/// Where playback lands in the loop being switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwitchLocation {
    /// Same relative position as the loop being left.
    Follow,
    /// Position the loop was at when it was last left.
    #[default]
    Restore,
    Start,
    /// A random cycle boundary.
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwitchDuration {
    #[default]
    Permanent,
    /// Play the new loop once, then mute.
    Once,
    /// Play the new loop once, then return.
    OnceReturn,
    /// Stay while the trigger is held.
    Sustain,
    /// Stay while held, then return at the loop end.
    SustainReturn,
}

/// What happens when switching into a loop with no content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyLoopAction {
    #[default]
    None,
    Record,
    CopyTiming,
    CopySound,
}

/// How a stream property carries over when switching loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    Off,
    #[default]
    Follow,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BounceMode {
    #[default]
    Mute,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncMode {
    #[default]
    Off,
    /// Record start and stop wait for host pulses.
    Host,
    /// Record start and stop wait for the sync master track.
    Track,
}

/// Behavior settings for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// 0-127, applied to existing content on every pass.
    pub feedback: u8,
    pub alt_feedback: u8,
    pub alt_feedback_enable: bool,
    /// Drop feedback slightly while overdubbing or multiplying to avoid runaway levels.
    pub auto_feedback_reduction: bool,
    /// 0 disables; 1-8 waits for input above `threshold * 1024` (16-bit units).
    pub record_threshold: u8,
    pub multiply_mode: MultiplyMode,
    pub quantize: QuantizeMode,
    pub subcycles: u32,
    /// Keep recording until a rounded mode end instead of stopping at the trigger.
    pub rounding_overdub: bool,
    pub mute_mode: MuteMode,
    pub switch_quantize: QuantizeMode,
    pub switch_location: SwitchLocation,
    pub return_location: SwitchLocation,
    pub switch_duration: SwitchDuration,
    pub empty_loop_action: EmptyLoopAction,
    pub overdub_transfer: TransferMode,
    pub mute_transfer: TransferMode,
    pub reverse_transfer: TransferMode,
    pub speed_transfer: TransferMode,
    pub pitch_transfer: TransferMode,
    /// Semitones covered by the full TimeStretch range.
    pub time_stretch_range: i32,
    pub speed_step_range: i32,
    pub speed_bend_range: i32,
    pub pitch_step_range: i32,
    pub pitch_bend_range: i32,
    pub undoable_rehearse: bool,
    /// Undo removes everything back to the previous checkpoint.
    pub undo_checkpoints: bool,
    pub bounce_mode: BounceMode,
    pub sync_mode: SyncMode,
    pub auto_record_tempo: f32,
    pub auto_record_bars: u32,
    pub beats_per_bar: u32,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            feedback: 127,
            alt_feedback: 127,
            alt_feedback_enable: false,
            auto_feedback_reduction: false,
            record_threshold: 0,
            multiply_mode: MultiplyMode::Normal,
            quantize: QuantizeMode::Off,
            subcycles: 4,
            rounding_overdub: true,
            mute_mode: MuteMode::Continuous,
            switch_quantize: QuantizeMode::Off,
            switch_location: SwitchLocation::Restore,
            return_location: SwitchLocation::Restore,
            switch_duration: SwitchDuration::Permanent,
            empty_loop_action: EmptyLoopAction::None,
            overdub_transfer: TransferMode::Follow,
            mute_transfer: TransferMode::Off,
            reverse_transfer: TransferMode::Follow,
            speed_transfer: TransferMode::Follow,
            pitch_transfer: TransferMode::Follow,
            time_stretch_range: 12,
            speed_step_range: 48,
            speed_bend_range: 12,
            pitch_step_range: 48,
            pitch_bend_range: 12,
            undoable_rehearse: false,
            undo_checkpoints: true,
            bounce_mode: BounceMode::Mute,
            sync_mode: SyncMode::Off,
            auto_record_tempo: 120.0,
            auto_record_bars: 1,
            beats_per_bar: 4,
        }
    }
}

impl Preset {
    /// Clamps every field into its legal range.
    pub fn sanitize(&mut self) {
        let clamped = self.clone();
        self.feedback = self.feedback.min(127);
        self.alt_feedback = self.alt_feedback.min(127);
        self.record_threshold = self.record_threshold.min(8);
        self.subcycles = self.subcycles.clamp(1, 128);
        self.time_stretch_range = self.time_stretch_range.clamp(1, 48);
        self.speed_step_range = self.speed_step_range.clamp(1, 48);
        self.speed_bend_range = self.speed_bend_range.clamp(1, 12);
        self.pitch_step_range = self.pitch_step_range.clamp(1, 48);
        self.pitch_bend_range = self.pitch_bend_range.clamp(1, 12);
        if !self.auto_record_tempo.is_finite() {
            self.auto_record_tempo = 120.0;
        }
        self.auto_record_tempo = self.auto_record_tempo.clamp(20.0, 300.0);
        self.auto_record_bars = self.auto_record_bars.clamp(1, 64);
        self.beats_per_bar = self.beats_per_bar.clamp(1, 16);
        if *self != clamped {
            tracing::warn!("preset values out of range were clamped");
        }
    }

    /// Feedback in effect when alternate feedback is requested by the current mode.
    #[inline]
    pub fn effective_feedback(&self, alternate: bool) -> u8 {
        if alternate && self.alt_feedback_enable {
            self.alt_feedback
        } else {
            self.feedback
        }
    }

    /// Input level a record threshold waits for, as a linear sample value.
    #[inline]
    pub fn threshold_level(&self) -> f32 {
        (self.record_threshold as f32 * 1024.0) / 32768.0
    }

    /// AutoRecord length for one press.
    pub fn auto_record_frames(&self, sample_rate: u32) -> usize {
        let beats = (self.auto_record_bars * self.beats_per_bar) as f64;
        let seconds = beats * 60.0 / self.auto_record_tempo.max(1.0) as f64;
        (seconds * sample_rate as f64).round().max(1.0) as usize
    }

    #[cfg(feature = "serde-json")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let mut preset: Self = serde_json::from_str(json)?;
        preset.sanitize();
        Ok(preset)
    }
}

//! Loop modes and their static attributes.

use serde::{Deserialize, Serialize};

/// The major mode of a loop. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    Reset,
    /// Armed, waiting for input above the record threshold.
    Threshold,
    /// Armed, waiting for a sync pulse.
    Synchronize,
    Record,
    Play,
    Overdub,
    Multiply,
    Insert,
    Stutter,
    Replace,
    Substitute,
    Mute,
    Rehearse,
    /// Playing a timing-only layer that has no audio yet.
    Run,
}

impl LoopMode {
    pub const ALL: [LoopMode; 14] = [
        LoopMode::Reset,
        LoopMode::Threshold,
        LoopMode::Synchronize,
        LoopMode::Record,
        LoopMode::Play,
        LoopMode::Overdub,
        LoopMode::Multiply,
        LoopMode::Insert,
        LoopMode::Stutter,
        LoopMode::Replace,
        LoopMode::Substitute,
        LoopMode::Mute,
        LoopMode::Rehearse,
        LoopMode::Run,
    ];

    /// Inverse of `mode as u8`; unknown values map to Reset.
    pub fn from_index(index: u8) -> LoopMode {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(LoopMode::Reset)
    }

    pub fn name(self) -> &'static str {
        match self {
            LoopMode::Reset => "Reset",
            LoopMode::Threshold => "Threshold",
            LoopMode::Synchronize => "Synchronize",
            LoopMode::Record => "Record",
            LoopMode::Play => "Play",
            LoopMode::Overdub => "Overdub",
            LoopMode::Multiply => "Multiply",
            LoopMode::Insert => "Insert",
            LoopMode::Stutter => "Stutter",
            LoopMode::Replace => "Replace",
            LoopMode::Substitute => "Substitute",
            LoopMode::Mute => "Mute",
            LoopMode::Rehearse => "Rehearse",
            LoopMode::Run => "Run",
        }
    }

    /// Must end on a cycle boundary.
    #[inline]
    pub fn is_rounding(self) -> bool {
        matches!(self, LoopMode::Multiply | LoopMode::Insert | LoopMode::Stutter)
    }

    /// Grows the record layer while active.
    #[inline]
    pub fn extends(self) -> bool {
        matches!(self, LoopMode::Multiply | LoopMode::Insert | LoopMode::Stutter)
    }

    /// Alternate feedback never applies in this mode.
    #[inline]
    pub fn alt_feedback_disabled(self) -> bool {
        matches!(self, LoopMode::Insert | LoopMode::Rehearse)
    }

    /// The record cursor holds still in this mode.
    #[inline]
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            LoopMode::Reset | LoopMode::Threshold | LoopMode::Synchronize
        )
    }

    /// Replaces rather than layers onto existing content.
    #[inline]
    pub fn is_replacing(self) -> bool {
        matches!(self, LoopMode::Replace | LoopMode::Substitute)
    }
}

impl core::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_modes_extend() {
        for mode in [LoopMode::Multiply, LoopMode::Insert, LoopMode::Stutter] {
            assert!(mode.is_rounding());
            assert!(mode.extends());
        }
        assert!(!LoopMode::Overdub.is_rounding());
        assert!(!LoopMode::Replace.extends());
    }

    #[test]
    fn test_index_round_trip() {
        for mode in LoopMode::ALL {
            assert_eq!(LoopMode::from_index(mode as u8), mode);
        }
        assert_eq!(LoopMode::from_index(200), LoopMode::Reset);
    }

    #[test]
    fn test_idle_modes() {
        assert!(LoopMode::Reset.is_idle());
        assert!(LoopMode::Threshold.is_idle());
        assert!(!LoopMode::Play.is_idle());
    }
}

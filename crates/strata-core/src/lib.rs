//! Core building blocks for the strata live looper.
//!
//! # Primary API
//!
//! - [`Audio`]: growable interleaved frame storage backing every layer
//! - [`Smoother`]: zipper-free level and pan changes
//! - [`Fade`], [`FadeTail`]: click suppression at playback discontinuities
//! - [`EngineConfig`] / [`Preset`]: global settings and per-track behavior
//! - [`AtomicFlag`], [`AtomicFloat`], [`AtomicFrame`]: audio thread to UI publishing
//!
//! Nothing in this crate allocates once constructed, apart from [`Audio`] growth while
//! a loop is being recorded.

pub mod error;
pub use error::{Error, Result};

mod audio;
pub use audio::Audio;

mod config;
pub use config::{EngineConfig, MAX_CHANNELS, MAX_LATENCY_FRAMES};

mod preset;
pub use preset::{
    BounceMode, EmptyLoopAction, MultiplyMode, MuteMode, Preset, QuantizeMode, SwitchDuration,
    SwitchLocation, SyncMode, TransferMode,
};

mod smooth;
pub use smooth::Smoother;

pub mod fade;
pub use fade::{Fade, FadeDirection, DEFAULT_FADE_FRAMES};

mod fade_tail;
pub use fade_tail::FadeTail;

mod lockfree;
pub use lockfree::{AtomicFlag, AtomicFloat, AtomicFrame};

/// Wraps a frame into `[0, frames)`.
///
/// Negative frames wrap from the end. A zero-length loop always yields 0.
#[inline]
pub fn wrap_frame(frame: i64, frames: i64) -> i64 {
    if frames <= 0 {
        0
    } else {
        frame.rem_euclid(frames)
    }
}

/// Reflects a frame for reverse playback: `frames - frame - 1`.
///
/// Frames outside `[0, frames)` are wrapped first, so a cursor sitting exactly on the
/// loop end reflects to the last frame.
#[inline]
pub fn reverse_frame(frame: i64, frames: i64) -> i64 {
    if frames <= 0 {
        return 0;
    }
    frames - wrap_frame(frame, frames) - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_frame_edges() {
        assert_eq!(wrap_frame(0, 1000), 0);
        assert_eq!(wrap_frame(1000, 1000), 0);
        assert_eq!(wrap_frame(-1, 1000), 999);
        assert_eq!(wrap_frame(2500, 1000), 500);
        assert_eq!(wrap_frame(42, 0), 0);
    }

    #[test]
    fn test_reverse_frame_edges() {
        assert_eq!(reverse_frame(0, 1000), 999);
        assert_eq!(reverse_frame(999, 1000), 0);
        assert_eq!(reverse_frame(1000, 1000), 999);
    }

    proptest! {
        #[test]
        fn wrap_frame_lands_in_range(frame in -1_000_000i64..1_000_000, frames in 1i64..100_000) {
            let wrapped = wrap_frame(frame, frames);
            prop_assert!((0..frames).contains(&wrapped));
            prop_assert_eq!((wrapped - frame).rem_euclid(frames), 0);
        }

        #[test]
        fn reverse_frame_is_an_involution(frames in 1i64..100_000, seed in 0i64..100_000) {
            let frame = seed % frames;
            prop_assert_eq!(reverse_frame(reverse_frame(frame, frames), frames), frame);
        }
    }
}

//! Test helpers for strata integration tests
//!
//! Engines here never touch an audio device: tests drive `process` directly with
//! generated input, one block at a time.

#![allow(dead_code)]

pub mod tolerances;

use strata::prelude::*;

/// Block size used by `run` and friends.
pub const TEST_BLOCK: usize = 256;

/// Installs a test-writer subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mono engine with short fades and the given latencies.
pub fn test_engine(tracks: usize, input_latency: usize, output_latency: usize) -> StrataEngine {
    init_tracing();
    StrataEngine::builder()
        .channels(1)
        .tracks(tracks)
        .latency(input_latency, output_latency)
        .fade_frames(16)
        .build()
        .expect("Failed to create test engine")
}

/// Same as [`test_engine`] with one preset for every track.
pub fn test_engine_with(tracks: usize, preset: Preset) -> StrataEngine {
    init_tracing();
    StrataEngine::builder()
        .channels(1)
        .tracks(tracks)
        .fade_frames(16)
        .preset(preset)
        .build()
        .expect("Failed to create test engine")
}

/// Deterministic waveform indexed by absolute input time.
pub fn waveform(t: usize) -> f32 {
    0.4 * (2.0 * std::f32::consts::PI * t as f32 / 97.0).sin()
}

/// Feeds `frames` frames produced by `signal` (given absolute time) and returns the output.
///
/// `clock` is advanced by the number of frames fed.
pub fn run_signal(
    engine: &mut StrataEngine,
    clock: &mut usize,
    frames: usize,
    signal: impl Fn(usize) -> f32,
) -> Vec<f32> {
    let mut rendered = Vec::with_capacity(frames);
    let mut left = frames;
    while left > 0 {
        let n = left.min(TEST_BLOCK);
        let input: Vec<f32> = (*clock..*clock + n).map(&signal).collect();
        let mut out = vec![0.0; n];
        engine.process(&input, &mut out);
        rendered.extend_from_slice(&out);
        *clock += n;
        left -= n;
    }
    rendered
}

/// Feeds `frames` frames of a constant.
pub fn run(engine: &mut StrataEngine, frames: usize, value: f32) -> Vec<f32> {
    let mut clock = 0;
    run_signal(engine, &mut clock, frames, |_| value)
}

/// Records a loop of `frames` frames of `value` on `track` with no latency configured.
pub fn record_loop(engine: &mut StrataEngine, track: usize, frames: usize, value: f32) {
    engine
        .invoke(Action::new(Function::Record).track(track))
        .expect("record start");
    run(engine, frames, value);
    engine
        .invoke(Action::new(Function::Record).track(track))
        .expect("record stop");
    run(engine, 1, 0.0);
}

/// Largest absolute sample.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

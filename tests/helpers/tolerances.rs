//! Tolerance constants for loop audio comparisons.

/// Samples copied between layers without any gain change.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Samples that went through feedback or level smoothing.
pub const MIX_EPSILON: f32 = 1e-4;

/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 1e-4;

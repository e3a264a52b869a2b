//! Notifications to an external synchronizer.

/// Receives loop timing changes. Every method is fire-and-forget.
pub trait SyncListener: Send {
    fn loop_resize(&mut self, _track: usize, _frames: i64, _cycles: u32) {}

    fn loop_switch(&mut self, _track: usize, _from: usize, _to: usize) {}

    fn loop_reset(&mut self, _track: usize) {}

    /// The loop crossed its start point.
    fn loop_local_start_point(&mut self, _track: usize) {}

    fn loop_record_start(&mut self, _track: usize) {}

    fn loop_record_stop(&mut self, _track: usize, _frames: i64) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSync;

impl SyncListener for NullSync {}

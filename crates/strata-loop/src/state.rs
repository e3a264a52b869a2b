//! Loop state published to the UI thread.

use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use strata_core::{AtomicFlag, AtomicFloat, AtomicFrame};

use crate::mode::LoopMode;

/// Snapshot of the current loop of a track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    pub number: usize,
    pub mode: LoopMode,
    pub frame: i64,
    pub play_frame: i64,
    pub frames: i64,
    /// 1-based cycle the record cursor is in.
    pub cycle: u32,
    pub cycles: u32,
    pub layer_count: usize,
    pub redo_count: usize,
    pub overdub: bool,
    pub mute: bool,
    pub pause: bool,
    pub reverse: bool,
    pub recording: bool,
    pub speed: f32,
    pub pitch: f32,
    pub beat_loop: bool,
    pub beat_cycle: bool,
    pub beat_sub_cycle: bool,
    pub next_loop: Option<usize>,
    pub return_loop: Option<usize>,
}

/// Display summary of one loop slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub number: usize,
    pub frames: i64,
    pub cycles: u32,
    pub mode: LoopMode,
    /// The track's current loop.
    pub active: bool,
    /// Target of a pending switch.
    pub pending: bool,
    pub mute: bool,
}

const NO_LOOP: usize = usize::MAX;

#[derive(Debug, Default)]
struct SummarySlot {
    frames: AtomicFrame,
    cycles: AtomicU32,
    mode: AtomicU8,
    active: AtomicFlag,
    pending: AtomicFlag,
    mute: AtomicFlag,
}

/// Lock-free mirror of a track's loop state.
///
/// The audio thread publishes once per interrupt; readers may see fields from two
/// consecutive interrupts. Beat flags are sticky until a reader takes them.
#[derive(Debug)]
pub struct TrackMonitor {
    number: AtomicUsize,
    mode: AtomicU8,
    frame: AtomicFrame,
    play_frame: AtomicFrame,
    frames: AtomicFrame,
    cycle: AtomicU32,
    cycles: AtomicU32,
    layer_count: AtomicUsize,
    redo_count: AtomicUsize,
    overdub: AtomicFlag,
    mute: AtomicFlag,
    pause: AtomicFlag,
    reverse: AtomicFlag,
    recording: AtomicFlag,
    speed: AtomicFloat,
    pitch: AtomicFloat,
    beat_loop: AtomicFlag,
    beat_cycle: AtomicFlag,
    beat_sub_cycle: AtomicFlag,
    next_loop: AtomicUsize,
    return_loop: AtomicUsize,
    summaries: Vec<SummarySlot>,
}

impl TrackMonitor {
    pub fn new(loops: usize) -> Self {
        Self {
            number: AtomicUsize::new(0),
            mode: AtomicU8::new(LoopMode::Reset as u8),
            frame: AtomicFrame::default(),
            play_frame: AtomicFrame::default(),
            frames: AtomicFrame::default(),
            cycle: AtomicU32::new(0),
            cycles: AtomicU32::new(0),
            layer_count: AtomicUsize::new(0),
            redo_count: AtomicUsize::new(0),
            overdub: AtomicFlag::default(),
            mute: AtomicFlag::default(),
            pause: AtomicFlag::default(),
            reverse: AtomicFlag::default(),
            recording: AtomicFlag::default(),
            speed: AtomicFloat::new(1.0),
            pitch: AtomicFloat::new(1.0),
            beat_loop: AtomicFlag::default(),
            beat_cycle: AtomicFlag::default(),
            beat_sub_cycle: AtomicFlag::default(),
            next_loop: AtomicUsize::new(NO_LOOP),
            return_loop: AtomicUsize::new(NO_LOOP),
            summaries: (0..loops).map(|_| SummarySlot::default()).collect(),
        }
    }

    pub fn publish(&self, state: &LoopState) {
        self.number.store(state.number, Ordering::Relaxed);
        self.mode.store(state.mode as u8, Ordering::Relaxed);
        self.frame.set(state.frame);
        self.play_frame.set(state.play_frame);
        self.frames.set(state.frames);
        self.cycle.store(state.cycle, Ordering::Relaxed);
        self.cycles.store(state.cycles, Ordering::Relaxed);
        self.layer_count.store(state.layer_count, Ordering::Relaxed);
        self.redo_count.store(state.redo_count, Ordering::Relaxed);
        self.overdub.set(state.overdub);
        self.mute.set(state.mute);
        self.pause.set(state.pause);
        self.reverse.set(state.reverse);
        self.recording.set(state.recording);
        self.speed.set(state.speed);
        self.pitch.set(state.pitch);
        self.beat_loop.raise(state.beat_loop);
        self.beat_cycle.raise(state.beat_cycle);
        self.beat_sub_cycle.raise(state.beat_sub_cycle);
        self.next_loop
            .store(state.next_loop.unwrap_or(NO_LOOP), Ordering::Relaxed);
        self.return_loop
            .store(state.return_loop.unwrap_or(NO_LOOP), Ordering::Relaxed);
    }

    pub fn publish_summary(&self, summary: &LoopSummary) {
        let Some(slot) = self.summaries.get(summary.number) else {
            return;
        };
        slot.frames.set(summary.frames);
        slot.cycles.store(summary.cycles, Ordering::Relaxed);
        slot.mode.store(summary.mode as u8, Ordering::Relaxed);
        slot.active.set(summary.active);
        slot.pending.set(summary.pending);
        slot.mute.set(summary.mute);
    }

    /// Reads the latest state, consuming the beat flags.
    pub fn snapshot(&self) -> LoopState {
        let optional = |v: usize| (v != NO_LOOP).then_some(v);
        LoopState {
            number: self.number.load(Ordering::Relaxed),
            mode: LoopMode::from_index(self.mode.load(Ordering::Relaxed)),
            frame: self.frame.get(),
            play_frame: self.play_frame.get(),
            frames: self.frames.get(),
            cycle: self.cycle.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            layer_count: self.layer_count.load(Ordering::Relaxed),
            redo_count: self.redo_count.load(Ordering::Relaxed),
            overdub: self.overdub.get(),
            mute: self.mute.get(),
            pause: self.pause.get(),
            reverse: self.reverse.get(),
            recording: self.recording.get(),
            speed: self.speed.get(),
            pitch: self.pitch.get(),
            beat_loop: self.beat_loop.take(),
            beat_cycle: self.beat_cycle.take(),
            beat_sub_cycle: self.beat_sub_cycle.take(),
            next_loop: optional(self.next_loop.load(Ordering::Relaxed)),
            return_loop: optional(self.return_loop.load(Ordering::Relaxed)),
        }
    }

    pub fn summaries(&self) -> Vec<LoopSummary> {
        self.summaries
            .iter()
            .enumerate()
            .map(|(number, slot)| LoopSummary {
                number,
                frames: slot.frames.get(),
                cycles: slot.cycles.load(Ordering::Relaxed),
                mode: LoopMode::from_index(slot.mode.load(Ordering::Relaxed)),
                active: slot.active.get(),
                pending: slot.pending.get(),
                mute: slot.mute.get(),
            })
            .collect()
    }
}

//! A track: a set of loops sharing one pair of streams, one layer pool and one event
//! queue, with exactly one loop current at a time.

mod invoke;
mod process;

use std::sync::Arc;

use strata_core::{Audio, EngineConfig, Preset};

use crate::error::{Error, Result};
use crate::event::EventManager;
use crate::layer::LayerPool;
use crate::loops::{Loop, LoopContext, ProjectLayer};
use crate::mode::LoopMode;
use crate::state::TrackMonitor;
use crate::stream::{InputStream, OutputStream, PitchShifter};
use crate::sync::{NullSync, SyncListener};

/// Another track's loop, captured for a track copy.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCopy {
    pub audio: Audio,
    pub cycles: u32,
    /// Source record frame when the copy was captured.
    pub frame: i64,
    pub timing_only: bool,
}

pub struct Track {
    number: usize,
    loops: Vec<Loop>,
    current: usize,
    pool: LayerPool,
    events: EventManager,
    input: InputStream,
    output: OutputStream,
    preset: Preset,
    config: EngineConfig,
    sync: Box<dyn SyncListener>,
    monitor: Arc<TrackMonitor>,
    block: Vec<f32>,
    pending_copy: Option<TrackCopy>,
}

impl core::fmt::Debug for Track {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Track")
            .field("number", &self.number)
            .field("current", &self.current)
            .field("loops", &self.loops.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Track {
    pub fn new(number: usize, config: &EngineConfig, preset: Preset) -> Self {
        let ch = config.channels;
        let max = config.max_interrupt_frames;
        let fade = config.fade_frames;
        let loops = config.loops_per_track.max(1);
        let mut track = Self {
            number,
            loops: (0..loops).map(Loop::new).collect(),
            current: 0,
            pool: LayerPool::new(ch, fade),
            events: EventManager::new(),
            input: InputStream::new(ch, config.input_latency, max, fade),
            output: OutputStream::new(ch, config.output_latency, max, fade),
            preset: Preset::default(),
            config: config.clone(),
            sync: Box::new(NullSync),
            monitor: Arc::new(TrackMonitor::new(loops)),
            block: Vec::with_capacity(max * ch * 2),
            pending_copy: None,
        };
        track.set_preset(preset);
        track
    }

    #[inline]
    pub fn number(&self) -> usize {
        self.number
    }

    #[inline]
    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Takes effect from the next invoked function.
    pub fn set_preset(&mut self, mut preset: Preset) {
        preset.sanitize();
        for stream in [self.input.stream_mut(), self.output.stream_mut()] {
            stream.set_ranges(
                preset.speed_bend_range,
                preset.pitch_bend_range,
                preset.time_stretch_range,
            );
        }
        self.preset = preset;
    }

    pub fn set_sync_listener(&mut self, sync: Box<dyn SyncListener>) {
        self.sync = sync;
    }

    pub fn set_pitch_shifter(&mut self, shifter: Box<dyn PitchShifter>) {
        self.output.set_pitch_shifter(shifter);
    }

    pub fn set_input_level(&mut self, level: f32) {
        self.input.set_level(level);
    }

    pub fn set_output_level(&mut self, level: f32) {
        self.output.set_level(level);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.output.set_pan(pan);
    }

    /// Shared view of the published state.
    pub fn monitor(&self) -> Arc<TrackMonitor> {
        Arc::clone(&self.monitor)
    }

    #[inline]
    pub fn current_loop(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    pub fn get_loop(&self, number: usize) -> Option<&Loop> {
        self.loops.get(number)
    }

    fn current(&self) -> &Loop {
        &self.loops[self.current]
    }

    pub fn mode(&self) -> LoopMode {
        self.current().mode()
    }

    pub fn frame(&self) -> i64 {
        self.current().frame()
    }

    pub fn frames(&self) -> i64 {
        self.current().frames(&self.pool)
    }

    pub fn cycles(&self) -> u32 {
        self.current().cycles(&self.pool)
    }

    pub fn is_mute(&self) -> bool {
        self.current().is_mute()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn layer_count(&self) -> usize {
        self.pool.undo_depth(self.current().play_layer())
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    /// Audio of the current loop's committed content.
    pub fn play_audio(&self) -> Option<&Audio> {
        self.current()
            .play_layer()
            .and_then(|id| self.pool.get(id))
            .map(|layer| layer.audio())
    }

    /// Captures the current loop for copying into another track.
    pub fn capture_copy(&self, timing_only: bool) -> Option<TrackCopy> {
        let lp = self.current();
        let layer = self.pool.get(lp.play_layer()?)?;
        Some(TrackCopy {
            audio: layer.audio().clone(),
            cycles: layer.cycles(),
            frame: lp.frame(),
            timing_only,
        })
    }

    /// The current loop and everything it operates on.
    fn split(&mut self) -> (&mut Loop, LoopContext<'_>) {
        let index = self.current;
        self.split_loop(index)
    }

    fn split_loop(&mut self, index: usize) -> (&mut Loop, LoopContext<'_>) {
        (
            &mut self.loops[index],
            LoopContext {
                track: self.number,
                pool: &mut self.pool,
                events: &mut self.events,
                input: &mut self.input,
                output: &mut self.output,
                preset: &self.preset,
                config: &self.config,
                sync: self.sync.as_mut(),
            },
        )
    }

    /// Rebuilds one loop from saved layers. Not for use while the loop is current
    /// and audible.
    pub fn load_project(&mut self, number: usize, layers: &[ProjectLayer], frame: i64) -> Result<()> {
        if number >= self.loops.len() {
            return Err(Error::InvalidLoop(number));
        }
        if number == self.current {
            self.events.clear();
        }
        let (lp, mut ctx) = self.split_loop(number);
        lp.load_project(&mut ctx, layers, frame)
    }

    /// The undo chain of one loop, oldest first.
    pub fn project_layers(&self, number: usize) -> Result<Vec<ProjectLayer>> {
        let lp = self.loops.get(number).ok_or(Error::InvalidLoop(number))?;
        Ok(lp.project_layers(&self.pool))
    }

    /// Resets every loop and returns to the first.
    pub fn reset_all(&mut self) {
        self.events.clear();
        for index in 0..self.loops.len() {
            let (lp, mut ctx) = self.split_loop(index);
            lp.reset(&mut ctx);
        }
        self.current = 0;
        self.pending_copy = None;
        self.output.reset();
        tracing::debug!(track = self.number, "track reset");
    }
}

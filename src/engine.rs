//! StrataEngine: the tracks, the control queue and the per-interrupt pass.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use strata_core::{Audio, BounceMode, EngineConfig, Preset};
use strata_loop::{
    Action, Function, LoopState, LoopSummary, ProjectLayer, Track, TrackMonitor,
};

use crate::{Error, Result};

/// Messages from control threads to the audio thread.
#[derive(Debug, Clone)]
pub enum Command {
    Action(Action),
    SelectTrack(usize),
    /// Replaces the preset of one track, or of every track when `None`.
    Preset(Option<usize>, Box<Preset>),
    /// Releases recordings waiting on the synchronizer.
    SyncPulse,
    InputLevel(usize, f32),
    OutputLevel(usize, f32),
    Pan(usize, f32),
}

/// Output of every track being captured for a bounce.
#[derive(Debug)]
struct Bounce {
    audio: Audio,
}

/// Live looping engine.
///
/// Owns the tracks and runs them from [`process`](StrataEngine::process) on the audio
/// thread. Control threads talk to it through an [`EngineHandle`].
///
/// # Example
///
/// ```ignore
/// use strata::prelude::*;
///
/// let mut engine = StrataEngine::builder().tracks(2).build()?;
/// let handle = engine.handle();
///
/// handle.invoke(Action::new(Function::Record))?;
/// engine.process(&input, &mut output);
/// ```
pub struct StrataEngine {
    config: EngineConfig,
    tracks: Vec<Track>,
    selected: usize,
    selected_shared: Arc<AtomicUsize>,
    commands: Receiver<Command>,
    sender: Sender<Command>,
    monitors: Arc<[Arc<TrackMonitor>]>,
    bounce: Option<Bounce>,
}

impl core::fmt::Debug for StrataEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StrataEngine")
            .field("tracks", &self.tracks.len())
            .field("selected", &self.selected)
            .field("bouncing", &self.bounce.is_some())
            .finish_non_exhaustive()
    }
}

impl StrataEngine {
    pub fn builder() -> crate::StrataEngineBuilder {
        crate::StrataEngineBuilder::default()
    }

    pub(crate) fn from_parts(config: EngineConfig, presets: Vec<Preset>) -> Self {
        let tracks: Vec<Track> = presets
            .into_iter()
            .enumerate()
            .map(|(n, preset)| Track::new(n, &config, preset))
            .collect();
        let monitors: Arc<[Arc<TrackMonitor>]> = tracks.iter().map(Track::monitor).collect();
        let (sender, commands) = crossbeam_channel::bounded(config.action_queue);
        tracing::info!(
            tracks = tracks.len(),
            loops = config.loops_per_track,
            channels = config.channels,
            sample_rate = config.sample_rate,
            "engine created"
        );
        Self {
            config,
            tracks,
            selected: 0,
            selected_shared: Arc::new(AtomicUsize::new(0)),
            commands,
            sender,
            monitors,
            bounce: None,
        }
    }

    /// A cloneable control handle for other threads.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            sender: self.sender.clone(),
            monitors: Arc::clone(&self.monitors),
            selected: Arc::clone(&self.selected_shared),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, number: usize) -> Option<&Track> {
        self.tracks.get(number)
    }

    pub fn track_mut(&mut self, number: usize) -> Option<&mut Track> {
        self.tracks.get_mut(number)
    }

    pub fn selected_track(&self) -> usize {
        self.selected
    }

    pub fn is_bouncing(&self) -> bool {
        self.bounce.is_some()
    }

    pub fn select_track(&mut self, number: usize) -> Result<()> {
        if number >= self.tracks.len() {
            return Err(Error::InvalidTrack(number));
        }
        self.selected = number;
        self.selected_shared.store(number, Ordering::Relaxed);
        tracing::debug!(track = number, "track selected");
        Ok(())
    }

    /// Runs an action on this thread, bypassing the queue.
    pub fn invoke(&mut self, action: Action) -> Result<()> {
        let number = action.track.unwrap_or(self.selected);
        if number >= self.tracks.len() {
            return Err(Error::InvalidTrack(number));
        }
        match action.function {
            Function::TrackCopySound | Function::TrackCopyTiming if action.down => {
                self.track_copy(number, action.function == Function::TrackCopyTiming);
            }
            Function::Bounce if action.down => self.bounce(),
            _ => self.tracks[number].invoke(&action),
        }
        Ok(())
    }

    /// Releases every recording waiting on the synchronizer.
    pub fn sync_pulse(&mut self) {
        for track in &mut self.tracks {
            track.sync_pulse();
        }
    }

    /// Rebuilds a loop from saved layers, oldest first.
    pub fn load_project(
        &mut self,
        track: usize,
        number: usize,
        layers: &[ProjectLayer],
        frame: i64,
    ) -> Result<()> {
        let t = self.tracks.get_mut(track).ok_or(Error::InvalidTrack(track))?;
        t.load_project(number, layers, frame)?;
        Ok(())
    }

    /// A loop's layers for saving, oldest first.
    pub fn project_layers(&self, track: usize, number: usize) -> Result<Vec<ProjectLayer>> {
        let t = self.tracks.get(track).ok_or(Error::InvalidTrack(track))?;
        Ok(t.project_layers(number)?)
    }

    /// One interrupt: drains queued commands, runs every track and mixes them into
    /// `output`. Both buffers are interleaved at the configured channel count.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        self.drain_commands();
        output.iter_mut().for_each(|s| *s = 0.0);
        for track in &mut self.tracks {
            track.process(input, output);
        }
        if let Some(bounce) = &mut self.bounce {
            bounce.audio.append(output);
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Action(action) => {
                    if let Err(e) = self.invoke(action) {
                        tracing::warn!(error = %e, "action dropped");
                    }
                }
                Command::SelectTrack(number) => {
                    if let Err(e) = self.select_track(number) {
                        tracing::warn!(error = %e, "selection ignored");
                    }
                }
                Command::Preset(None, preset) => {
                    for track in &mut self.tracks {
                        track.set_preset((*preset).clone());
                    }
                }
                Command::Preset(Some(number), preset) => match self.tracks.get_mut(number) {
                    Some(track) => track.set_preset(*preset),
                    None => tracing::warn!(track = number, "preset for unknown track"),
                },
                Command::SyncPulse => self.sync_pulse(),
                Command::InputLevel(number, level) => {
                    if let Some(track) = self.tracks.get_mut(number) {
                        track.set_input_level(level);
                    }
                }
                Command::OutputLevel(number, level) => {
                    if let Some(track) = self.tracks.get_mut(number) {
                        track.set_output_level(level);
                    }
                }
                Command::Pan(number, pan) => {
                    if let Some(track) = self.tracks.get_mut(number) {
                        track.set_pan(pan);
                    }
                }
            }
        }
    }

    /// Copies the previous track's current loop into `target`'s current loop.
    fn track_copy(&mut self, target: usize, timing_only: bool) {
        let count = self.tracks.len();
        if count < 2 {
            tracing::warn!("track copy needs a second track");
            return;
        }
        let source = (target + count - 1) % count;
        match self.tracks[source].capture_copy(timing_only) {
            Some(copy) => {
                tracing::debug!(source, target, timing_only, "track copy");
                self.tracks[target].copy_from(copy);
            }
            None => tracing::warn!(source, target, "track copy from an empty loop"),
        }
    }

    /// Starts capturing the mix, or ends the capture and places it in a loop.
    fn bounce(&mut self) {
        let Some(bounce) = self.bounce.take() else {
            let mut audio = Audio::new(self.config.channels);
            audio.reserve(self.config.sample_rate as usize * 8);
            self.bounce = Some(Bounce { audio });
            tracing::debug!("bounce recording");
            return;
        };

        if bounce.audio.is_empty() {
            tracing::warn!("bounce captured nothing");
            return;
        }
        let target = self
            .tracks
            .iter()
            .position(Track::is_empty)
            .unwrap_or(self.selected);
        let mode = self.tracks[self.selected].preset().bounce_mode;
        let cycles = self.bounce_cycles(bounce.audio.frames() as i64);

        for (n, track) in self.tracks.iter_mut().enumerate() {
            if n == target || track.is_empty() {
                continue;
            }
            match mode {
                BounceMode::Reset => track.invoke(&Action::new(Function::Reset)),
                BounceMode::Mute if !track.is_mute() => {
                    track.invoke(&Action::new(Function::Mute).no_latency())
                }
                BounceMode::Mute => {}
            }
        }

        let layer = ProjectLayer::new(bounce.audio, cycles);
        let number = self.tracks[target].current_loop();
        match self.tracks[target].load_project(number, &[layer], 0) {
            Ok(()) => tracing::debug!(target, cycles, "bounce placed"),
            Err(e) => tracing::error!(error = %e, target, "bounce could not be placed"),
        }
    }

    /// Cycle count of a bounce: whole cycles of the selected loop when they fit exactly.
    fn bounce_cycles(&self, frames: i64) -> u32 {
        let track = &self.tracks[self.selected];
        let cycles = track.cycles() as i64;
        let loop_frames = track.frames();
        if cycles <= 0 || loop_frames <= 0 {
            return 1;
        }
        let cycle = loop_frames / cycles;
        if cycle > 0 && frames % cycle == 0 {
            (frames / cycle).max(1) as u32
        } else {
            1
        }
    }
}

/// Control-thread side of a [`StrataEngine`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: Sender<Command>,
    monitors: Arc<[Arc<TrackMonitor>]>,
    selected: Arc<AtomicUsize>,
}

impl EngineHandle {
    pub fn track_count(&self) -> usize {
        self.monitors.len()
    }

    pub fn selected_track(&self) -> usize {
        self.selected.load(Ordering::Relaxed)
    }

    /// Queues an action for the next interrupt.
    pub fn invoke(&self, action: Action) -> Result<()> {
        if let Some(track) = action.track.filter(|t| *t >= self.monitors.len()) {
            return Err(Error::InvalidTrack(track));
        }
        self.send(Command::Action(action))
    }

    pub fn select_track(&self, number: usize) -> Result<()> {
        if number >= self.monitors.len() {
            return Err(Error::InvalidTrack(number));
        }
        self.send(Command::SelectTrack(number))
    }

    pub fn set_preset(&self, track: Option<usize>, preset: Preset) -> Result<()> {
        if let Some(t) = track.filter(|t| *t >= self.monitors.len()) {
            return Err(Error::InvalidTrack(t));
        }
        self.send(Command::Preset(track, Box::new(preset)))
    }

    pub fn sync_pulse(&self) -> Result<()> {
        self.send(Command::SyncPulse)
    }

    pub fn send(&self, command: Command) -> Result<()> {
        match self.sender.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                tracing::warn!(?command, "action queue full");
                Err(Error::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Disconnected),
        }
    }

    /// Latest state of a track's current loop. Consumes the beat flags.
    pub fn track_state(&self, track: usize) -> Result<LoopState> {
        self.monitor(track).map(|m| m.snapshot())
    }

    pub fn loop_summaries(&self, track: usize) -> Result<Vec<LoopSummary>> {
        self.monitor(track).map(|m| m.summaries())
    }

    pub fn monitor(&self, track: usize) -> Result<&Arc<TrackMonitor>> {
        self.monitors.get(track).ok_or(Error::InvalidTrack(track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(tracks: usize) -> StrataEngine {
        let config = EngineConfig {
            channels: 1,
            tracks,
            fade_frames: 4,
            max_interrupt_frames: 256,
            action_queue: 4,
            ..Default::default()
        };
        StrataEngine::from_parts(config, vec![Preset::default(); tracks])
    }

    fn run(engine: &mut StrataEngine, frames: usize, value: f32) -> Vec<f32> {
        let mut rendered = Vec::new();
        let mut left = frames;
        while left > 0 {
            let n = left.min(64);
            let input = vec![value; n];
            let mut out = vec![0.0; n];
            engine.process(&input, &mut out);
            rendered.extend_from_slice(&out);
            left -= n;
        }
        rendered
    }

    fn record(engine: &mut StrataEngine, track: usize, frames: usize, value: f32) {
        engine.invoke(Action::new(Function::Record).track(track)).unwrap();
        run(engine, frames, value);
        engine.invoke(Action::new(Function::Record).track(track)).unwrap();
        run(engine, 1, 0.0);
    }

    #[test]
    fn test_handle_routes_actions() {
        let mut engine = engine(2);
        let handle = engine.handle();
        handle.select_track(1).unwrap();
        handle.invoke(Action::new(Function::Record)).unwrap();
        run(&mut engine, 32, 0.5);
        assert_eq!(engine.selected_track(), 1);
        assert_eq!(handle.selected_track(), 1);
        assert_eq!(handle.track_state(1).unwrap().mode, strata_loop::LoopMode::Record);
        assert_eq!(handle.track_state(0).unwrap().mode, strata_loop::LoopMode::Reset);
    }

    #[test]
    fn test_handle_rejects_unknown_track() {
        let engine = engine(2);
        let handle = engine.handle();
        assert!(matches!(
            handle.invoke(Action::new(Function::Record).track(5)),
            Err(Error::InvalidTrack(5))
        ));
        assert!(matches!(handle.track_state(9), Err(Error::InvalidTrack(9))));
    }

    #[test]
    fn test_full_queue_is_reported() {
        let engine = engine(1);
        let handle = engine.handle();
        for _ in 0..4 {
            handle.invoke(Action::new(Function::Overdub)).unwrap();
        }
        assert!(matches!(
            handle.invoke(Action::new(Function::Mute)),
            Err(Error::QueueFull)
        ));
    }

    #[test]
    fn test_track_copy_from_previous_track() {
        let mut engine = engine(2);
        record(&mut engine, 0, 100, 0.5);
        engine.select_track(1).unwrap();
        engine.invoke(Action::new(Function::TrackCopySound)).unwrap();
        run(&mut engine, 1, 0.0);
        let track = engine.track(1).unwrap();
        assert_eq!(track.frames(), 100);
        assert_eq!(track.mode(), strata_loop::LoopMode::Play);
        assert_eq!(track.frame(), engine.track(0).unwrap().frame());
    }

    #[test]
    fn test_bounce_into_empty_track() {
        let mut engine = engine(2);
        record(&mut engine, 0, 64, 0.5);
        run(&mut engine, 63, 0.0);
        engine.invoke(Action::new(Function::Bounce)).unwrap();
        assert!(engine.is_bouncing());
        run(&mut engine, 64, 0.0);
        engine.invoke(Action::new(Function::Bounce)).unwrap();
        assert!(!engine.is_bouncing());

        let target = engine.track(1).unwrap();
        assert_eq!(target.frames(), 64);
        assert_eq!(target.cycles(), 1);
        assert!(target.play_audio().unwrap().peak() > 0.4);
    }

    #[test]
    fn test_bounce_resets_sources() {
        let mut engine = engine(2);
        engine.track_mut(0).unwrap().set_preset(Preset {
            bounce_mode: BounceMode::Reset,
            ..Default::default()
        });
        record(&mut engine, 0, 64, 0.5);
        engine.invoke(Action::new(Function::Bounce)).unwrap();
        run(&mut engine, 32, 0.0);
        engine.invoke(Action::new(Function::Bounce)).unwrap();
        assert!(engine.track(0).unwrap().is_empty());
        assert_eq!(engine.track(1).unwrap().frames(), 32);
    }
}

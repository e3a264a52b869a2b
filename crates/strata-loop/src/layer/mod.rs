//! One generation of loop content.
//!
//! Layers are flattened: each owns its complete audio, so undo is a pointer move and
//! playback never walks a chain. A loop records into one layer while playing the one
//! before it; [`Loop::shift`](crate::Loop) commits the record layer onto the undo chain.

mod pool;
mod segment;
mod window;

pub use pool::{LayerId, LayerPool};
pub use segment::{Segment, SegmentList};
pub use window::FadeWindow;

use strata_core::fade::{Fade, FadeDirection};
use strata_core::Audio;

/// Feedback as a gain multiplier.
#[inline]
pub fn feedback_gain(feedback: u8) -> f32 {
    feedback.min(127) as f32 / 127.0
}

#[derive(Debug, Clone)]
pub struct Layer {
    number: u32,
    audio: Audio,
    cycles: u32,
    prev: Option<LayerId>,
    redo: Option<LayerId>,
    structure_changed: bool,
    audio_changed: bool,
    feedback_applied: bool,
    max_sample: f32,
    checkpoint: bool,
    deferred_fade_in: bool,
    deferred_fade_out: bool,
    segments: SegmentList,
    window: FadeWindow,
    record_fade: Fade,
    recording: bool,
}

impl Layer {
    pub fn new(channels: usize, fade_frames: usize) -> Self {
        Self {
            number: 0,
            audio: Audio::new(channels),
            cycles: 1,
            prev: None,
            redo: None,
            structure_changed: false,
            audio_changed: false,
            feedback_applied: false,
            max_sample: 0.0,
            checkpoint: false,
            deferred_fade_in: false,
            deferred_fade_out: false,
            segments: SegmentList::default(),
            window: FadeWindow::new(channels, fade_frames),
            record_fade: Fade::new(fade_frames),
            recording: false,
        }
    }

    /// Display number, unique per pool allocation.
    #[inline]
    pub fn number(&self) -> u32 {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: u32) {
        self.number = number;
    }

    #[inline]
    pub fn frames(&self) -> i64 {
        self.audio.frames() as i64
    }

    #[inline]
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.audio.channels()
    }

    #[inline]
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn set_cycles(&mut self, cycles: u32) {
        self.cycles = cycles.max(1);
    }

    /// Length of one cycle, never zero for a non-empty layer.
    #[inline]
    pub fn cycle_frames(&self) -> i64 {
        (self.frames() / self.cycles.max(1) as i64).max(1)
    }

    #[inline]
    pub fn prev(&self) -> Option<LayerId> {
        self.prev
    }

    pub fn set_prev(&mut self, prev: Option<LayerId>) {
        self.prev = prev;
    }

    #[inline]
    pub fn redo(&self) -> Option<LayerId> {
        self.redo
    }

    pub fn set_redo(&mut self, redo: Option<LayerId>) {
        self.redo = redo;
    }

    #[inline]
    pub fn is_structure_changed(&self) -> bool {
        self.structure_changed
    }

    #[inline]
    pub fn is_audio_changed(&self) -> bool {
        self.audio_changed
    }

    #[inline]
    pub fn max_sample(&self) -> f32 {
        self.max_sample
    }

    #[inline]
    pub fn is_checkpoint(&self) -> bool {
        self.checkpoint
    }

    pub fn set_checkpoint(&mut self, checkpoint: bool) {
        self.checkpoint = checkpoint;
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn segments(&self) -> &SegmentList {
        &self.segments
    }

    /// Mute fades that were requested while this layer was the record layer.
    pub fn deferred_fades(&self) -> (bool, bool) {
        (self.deferred_fade_in, self.deferred_fade_out)
    }

    pub fn set_deferred_fades(&mut self, fade_in: bool, fade_out: bool) {
        self.deferred_fade_in = fade_in;
        self.deferred_fade_out = fade_out;
    }

    /// Whether committing this layer would add anything worth undoing.
    ///
    /// With `check_auto_undo`, audio changes whose newly recorded peak stays under
    /// `noise_floor` do not count.
    pub fn is_changed(&self, noise_floor: f32, check_auto_undo: bool) -> bool {
        if self.structure_changed {
            return true;
        }
        if !self.audio_changed {
            return false;
        }
        !check_auto_undo || self.feedback_applied || self.max_sample > noise_floor
    }

    pub fn reset_changes(&mut self) {
        self.structure_changed = false;
        self.audio_changed = false;
        self.feedback_applied = false;
        self.max_sample = 0.0;
    }

    pub(crate) fn mark_structure_changed(&mut self) {
        self.structure_changed = true;
    }

    /// Opens a recording region. A fade-in is applied to the first fade range of input.
    pub fn begin_recording(&mut self, fade_in: bool) {
        self.recording = true;
        self.window.clear();
        if fade_in {
            self.record_fade.start(FadeDirection::In);
        } else {
            self.record_fade.cancel();
        }
    }

    /// Closes the recording region, fading out the input recorded last.
    pub fn stop_recording(&mut self) {
        if self.recording {
            self.window.fade_out(&mut self.audio);
            self.recording = false;
        }
    }

    /// Closes the recording region without a fade. Used when recording carries on
    /// seamlessly into the next layer.
    pub fn suspend_recording(&mut self) {
        self.window.clear();
        self.recording = false;
    }

    /// Recording paused mid-layer: fade the edge and fade in again on resume.
    pub fn pause_gap(&mut self) {
        if self.recording {
            self.window.fade_out(&mut self.audio);
            self.recording = false;
            self.record_fade.start(FadeDirection::In);
        }
    }

    /// Mixes `input` into the layer starting at logical `frame`.
    ///
    /// Existing content is scaled by `feedback`. Forward recording grows the layer as
    /// needed; reverse recording stays inside it. Frames before 0 are dropped.
    pub fn record(&mut self, input: &[f32], frame: i64, feedback: u8, reverse: bool) {
        let channels = self.audio.channels();
        let frames = (input.len() / channels) as i64;
        if !self.recording {
            self.begin_recording(true);
        }
        if !reverse && frame + frames > self.frames() {
            self.audio.resize((frame + frames).max(0) as usize);
        }
        let gain = feedback_gain(feedback);
        let len = self.frames();
        let mut peak = self.max_sample;

        for (i, src) in input.chunks(channels).enumerate() {
            let fade = self.record_fade.next_gain();
            let logical = frame + i as i64;
            if logical < 0 {
                continue;
            }
            let phys = if reverse { len - 1 - logical } else { logical };
            if !(0..len).contains(&phys) {
                continue;
            }
            for (d, s) in self.audio.frame_mut(phys as usize).iter_mut().zip(src) {
                let added = *s * fade;
                peak = peak.max(added.abs());
                *d = *d * gain + added;
            }
            self.window.push(phys, src, fade);
        }

        self.max_sample = peak;
        self.audio_changed = true;
        if feedback < 127 {
            self.feedback_applied = true;
        }
    }

    /// Writes into an inserted region, which holds no prior content worth keeping.
    pub fn insert(&mut self, input: &[f32], frame: i64, reverse: bool) {
        self.record(input, frame, 0, reverse);
    }

    /// A pass over `frames` without new input: only feedback decay applies.
    pub fn advance(&mut self, frame: i64, frames: i64, feedback: u8, reverse: bool) {
        if feedback >= 127 || frames <= 0 {
            return;
        }
        let len = self.frames();
        let (start, end) = if reverse {
            (len - frame - frames, len - frame)
        } else {
            (frame, frame + frames)
        };
        let start = start.clamp(0, len);
        let end = end.clamp(0, len);
        if end > start {
            self.audio
                .scale(start as usize, (end - start) as usize, feedback_gain(feedback));
            self.audio_changed = true;
            self.feedback_applied = true;
        }
    }

    /// Renders from logical `frame` into `dest`, overwriting it.
    pub fn play(&self, frame: i64, dest: &mut [f32], reverse: bool) {
        if reverse {
            self.audio.read_reverse(self.frames() - 1 - frame, dest);
        } else {
            self.audio.read(frame, dest);
        }
    }

    /// Opens a silent gap.
    pub fn insert_gap(&mut self, at: i64, frames: i64) {
        let at = at.clamp(0, self.frames()) as usize;
        let frames = frames.max(0) as usize;
        self.audio.insert_silence(at, frames);
        self.segments.insert(at, frames, None);
        self.structure_changed = true;
    }

    /// Inserts a copy of `[from, from + frames)` at `at`.
    pub fn insert_copy(&mut self, at: i64, from: i64, frames: i64, own_id: LayerId) {
        let at = at.clamp(0, self.frames()) as usize;
        let from = from.clamp(0, self.frames()) as usize;
        let frames = frames.max(0) as usize;
        self.audio.insert_copy(at, from, frames);
        self.segments.insert(at, frames, Some((own_id, from)));
        self.structure_changed = true;
    }

    /// Extends by one cycle of `source`, starting at `from` in the source.
    pub fn append_cycle(&mut self, source: &Audio, source_id: LayerId, from: i64, frames: i64) {
        let offset = self.audio.frames();
        let from = from.max(0) as usize;
        let frames = frames.max(0) as usize;
        self.audio.append_wrapped(source, from, frames);
        self.segments.append(offset, frames, source_id, from);
        self.cycles += 1;
        self.structure_changed = true;
    }

    /// Keeps only `[start, start + frames)`.
    pub fn splice(&mut self, start: i64, frames: i64) {
        let start = start.clamp(0, self.frames()) as usize;
        let frames = frames.max(0) as usize;
        self.audio.keep(start, frames);
        self.segments.keep(start, frames);
        self.structure_changed = true;
    }

    pub fn remove(&mut self, at: i64, frames: i64) {
        let at = at.clamp(0, self.frames()) as usize;
        let frames = frames.max(0) as usize;
        self.audio.remove(at, frames);
        self.segments.remove(at, frames);
        self.structure_changed = true;
    }

    pub fn truncate(&mut self, frames: i64) {
        self.splice(0, frames);
    }

    /// Silences all content, keeping the length.
    pub fn zero(&mut self) {
        self.audio.zero();
        self.segments.clear();
        self.window.clear();
        self.audio_changed = true;
    }

    /// Resizes to a silent layer of `frames`.
    pub fn set_frames(&mut self, frames: i64) {
        self.audio.clear();
        self.audio.resize(frames.max(0) as usize);
        self.segments.clear();
        self.structure_changed = true;
    }

    /// Replaces the content with `audio`.
    pub fn load_audio(&mut self, audio: &Audio) {
        self.audio.copy_from(audio);
        self.segments.clear();
        self.window.clear();
        self.recording = false;
    }

    /// Becomes a fresh copy of `source`, whose id is `source_id`.
    pub fn copy_from(&mut self, source: &Layer, source_id: LayerId) {
        self.audio.copy_from(&source.audio);
        self.cycles = source.cycles;
        self.segments.reset(Some(source_id), source.audio.frames());
        self.window.clear();
        self.record_fade.cancel();
        self.recording = false;
        self.checkpoint = false;
        self.deferred_fade_in = false;
        self.deferred_fade_out = false;
        self.reset_changes();
    }

    /// Drops content and links so the layer can be reused.
    pub(crate) fn recycle(&mut self) {
        self.audio.clear();
        self.cycles = 1;
        self.prev = None;
        self.redo = None;
        self.checkpoint = false;
        self.deferred_fade_in = false;
        self.deferred_fade_out = false;
        self.segments.clear();
        self.window.clear();
        self.record_fade.cancel();
        self.recording = false;
        self.reset_changes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_with(samples: Vec<f32>) -> Layer {
        let mut layer = Layer::new(1, 4);
        layer.load_audio(&Audio::from_samples(1, samples).unwrap());
        layer
    }

    #[test]
    fn test_record_grows_forward() {
        let mut layer = Layer::new(1, 4);
        layer.begin_recording(false);
        layer.record(&[0.5; 10], 0, 127, false);
        assert_eq!(layer.frames(), 10);
        assert!(layer.is_audio_changed());
        assert_eq!(layer.max_sample(), 0.5);
    }

    #[test]
    fn test_preroll_is_dropped() {
        let mut layer = Layer::new(1, 4);
        layer.begin_recording(false);
        layer.record(&[1.0; 6], -2, 127, false);
        assert_eq!(layer.audio().samples(), &[1.0; 4]);
    }

    #[test]
    fn test_feedback_mix() {
        let mut layer = layer_with(vec![1.0; 4]);
        layer.begin_recording(false);
        layer.record(&[0.25; 4], 0, 0, false);
        assert_eq!(layer.audio().samples(), &[0.25; 4]);
        assert!(layer.is_changed(0.001, true));
    }

    #[test]
    fn test_reverse_record_writes_backwards() {
        let mut layer = layer_with(vec![0.0; 4]);
        layer.begin_recording(false);
        layer.record(&[1.0, 2.0], 0, 127, true);
        assert_eq!(layer.audio().samples(), &[0.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_quiet_overdub_is_not_a_change() {
        let mut layer = layer_with(vec![0.5; 8]);
        layer.begin_recording(false);
        layer.record(&[0.0001; 8], 0, 127, false);
        assert!(!layer.is_changed(0.001, true));
        assert!(layer.is_changed(0.001, false));
    }

    #[test]
    fn test_stop_recording_fades_edge() {
        let mut layer = layer_with(vec![0.0; 8]);
        layer.begin_recording(false);
        layer.record(&[1.0; 8], 0, 127, false);
        layer.stop_recording();
        assert_eq!(layer.audio().samples()[3], 1.0);
        assert_eq!(layer.audio().samples()[7], 0.0);
        assert!(!layer.is_recording());
    }

    #[test]
    fn test_advance_applies_feedback() {
        let mut layer = layer_with(vec![1.0; 4]);
        layer.advance(0, 2, 0, false);
        assert_eq!(layer.audio().samples(), &[0.0, 0.0, 1.0, 1.0]);
        layer.reset_changes();
        layer.advance(0, 4, 127, false);
        assert!(!layer.is_audio_changed());
    }

    #[test]
    fn test_reverse_play() {
        let layer = layer_with(vec![0.0, 1.0, 2.0, 3.0]);
        let mut out = [0.0f32; 2];
        layer.play(0, &mut out, true);
        assert_eq!(out, [3.0, 2.0]);
    }

    #[test]
    fn test_gap_and_splice_are_structural() {
        let mut layer = layer_with(vec![1.0; 4]);
        layer.insert_gap(2, 2);
        assert_eq!(layer.frames(), 6);
        assert!(layer.is_structure_changed());
        layer.splice(1, 3);
        assert_eq!(layer.audio().samples(), &[1.0, 0.0, 0.0]);
    }
}

//! Building loop content from outside the record path: saved projects, track copies
//! and bounces.

use strata_core::{wrap_frame, Audio};

use super::{Loop, LoopContext};
use crate::error::{Error, Result};
use crate::mode::LoopMode;

/// One layer of a loop as stored in a project, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayer {
    pub audio: Audio,
    pub cycles: u32,
    pub checkpoint: bool,
}

impl ProjectLayer {
    pub fn new(audio: Audio, cycles: u32) -> Self {
        Self {
            audio,
            cycles,
            checkpoint: false,
        }
    }
}

/// Frame a track copy starts at, `elapsed` frames after the source position was taken.
pub fn track_copy_frame(source_frame: i64, source_frames: i64, elapsed: i64) -> i64 {
    wrap_frame(source_frame + elapsed, source_frames)
}

impl Loop {
    /// Replaces the loop's content with `layers`, oldest first, and plays the newest
    /// from `frame`.
    pub fn load_project(
        &mut self,
        ctx: &mut LoopContext<'_>,
        layers: &[ProjectLayer],
        frame: i64,
    ) -> Result<()> {
        if layers.is_empty() {
            return Err(Error::InvalidProject("no layers".into()));
        }
        let channels = ctx.pool.channels();
        for (i, layer) in layers.iter().enumerate() {
            if layer.audio.channels() != channels {
                return Err(Error::ChannelMismatch {
                    expected: channels,
                    actual: layer.audio.channels(),
                });
            }
            if layer.audio.is_empty() {
                return Err(Error::InvalidProject(format!("layer {i} has no audio")));
            }
        }

        self.reset(ctx);
        let mut prev = None;
        for layer in layers {
            let id = ctx.pool.alloc();
            let l = &mut ctx.pool[id];
            l.load_audio(&layer.audio);
            l.set_cycles(layer.cycles.max(1));
            l.set_checkpoint(layer.checkpoint);
            l.set_prev(prev);
            l.reset_changes();
            prev = Some(id);
        }
        self.play = prev;
        self.record = prev.map(|id| ctx.pool.copy(id));
        self.mode = LoopMode::Play;
        self.place(ctx, frame);
        tracing::debug!(
            loop_number = self.number,
            layers = layers.len(),
            frames = self.frames(ctx.pool),
            "project loaded"
        );
        Ok(())
    }

    /// The undo chain as project layers, oldest first.
    pub fn project_layers(&self, pool: &crate::layer::LayerPool) -> Vec<ProjectLayer> {
        let mut layers = Vec::new();
        let mut next = self.play;
        while let Some(id) = next {
            let layer = &pool[id];
            layers.push(ProjectLayer {
                audio: layer.audio().clone(),
                cycles: layer.cycles(),
                checkpoint: layer.is_checkpoint(),
            });
            next = layer.prev();
        }
        layers.reverse();
        layers
    }

    /// Replaces the loop with a copy of another track's loop. A timing copy keeps only
    /// the length and plays silence in Run.
    pub fn track_copy(
        &mut self,
        ctx: &mut LoopContext<'_>,
        audio: &Audio,
        cycles: u32,
        frame: i64,
        timing_only: bool,
    ) {
        if audio.is_empty() {
            tracing::warn!(loop_number = self.number, "track copy from an empty loop");
            return;
        }
        self.reset(ctx);
        let id = ctx.pool.alloc();
        let layer = &mut ctx.pool[id];
        if timing_only {
            layer.set_frames(audio.frames() as i64);
        } else {
            layer.load_audio(audio);
        }
        layer.set_cycles(cycles.max(1));
        self.commit(ctx, id);
        self.record = Some(ctx.pool.copy(id));
        self.timing_only = timing_only;
        self.mode = if timing_only { LoopMode::Run } else { LoopMode::Play };
        self.place(ctx, frame);
        tracing::debug!(loop_number = self.number, frame = self.frame, timing_only, "track copy");
    }

    /// Puts the record cursor at `frame` and the play cursor the latency ahead.
    fn place(&mut self, ctx: &mut LoopContext<'_>, frame: i64) {
        let frames = self.frames(ctx.pool);
        self.frame = wrap_frame(frame, frames);
        self.play_frame = wrap_frame(self.frame + ctx.total_latency(), frames);
        ctx.sync.loop_resize(ctx.track, frames, self.cycles(ctx.pool));
    }
}

//! Which source layer each span of a layer was copied from.

use smallvec::SmallVec;

use super::LayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub source: LayerId,
    pub source_offset: usize,
    /// Start within the owning layer.
    pub offset: usize,
    pub frames: usize,
}

impl Segment {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.frames
    }
}

/// Spans ordered by offset. Regions not covered by any segment are new material or silence.
#[derive(Debug, Clone, Default)]
pub struct SegmentList {
    segments: SmallVec<[Segment; 4]>,
}

impl SegmentList {
    pub fn reset(&mut self, source: Option<LayerId>, frames: usize) {
        self.segments.clear();
        if let Some(source) = source {
            if frames > 0 {
                self.segments.push(Segment {
                    source,
                    source_offset: 0,
                    offset: 0,
                    frames,
                });
            }
        }
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn split_at(&mut self, at: usize) {
        if let Some(i) = self
            .segments
            .iter()
            .position(|s| s.offset < at && at < s.end())
        {
            let seg = self.segments[i];
            let head = at - seg.offset;
            self.segments[i].frames = head;
            self.segments.insert(
                i + 1,
                Segment {
                    source: seg.source,
                    source_offset: seg.source_offset + head,
                    offset: at,
                    frames: seg.frames - head,
                },
            );
        }
    }

    /// Opens `frames` at `at`, optionally recording where the new span came from.
    pub fn insert(&mut self, at: usize, frames: usize, source: Option<(LayerId, usize)>) {
        self.split_at(at);
        for seg in self.segments.iter_mut().filter(|s| s.offset >= at) {
            seg.offset += frames;
        }
        if let Some((source, source_offset)) = source {
            let pos = self
                .segments
                .iter()
                .position(|s| s.offset > at)
                .unwrap_or(self.segments.len());
            self.segments.insert(
                pos,
                Segment {
                    source,
                    source_offset,
                    offset: at,
                    frames,
                },
            );
        }
    }

    pub fn append(&mut self, offset: usize, frames: usize, source: LayerId, source_offset: usize) {
        self.segments.push(Segment {
            source,
            source_offset,
            offset,
            frames,
        });
    }

    pub fn remove(&mut self, at: usize, frames: usize) {
        let end = at.saturating_add(frames);
        self.split_at(at);
        self.split_at(end);
        self.segments.retain(|s| s.end() <= at || s.offset >= end);
        for seg in self.segments.iter_mut().filter(|s| s.offset >= end) {
            seg.offset -= frames;
        }
    }

    /// Keeps only `[start, start + frames)`.
    pub fn keep(&mut self, start: usize, frames: usize) {
        self.remove(start + frames, usize::MAX - (start + frames));
        self.remove(0, start);
    }
}

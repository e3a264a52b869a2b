//! Arena owning every layer of a track.

use core::ops::{Index, IndexMut};

use super::Layer;

/// Handle to a layer in a [`LayerPool`].
///
/// The generation catches handles that outlive the layer they named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId {
    index: u32,
    generation: u32,
}

impl LayerId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    layer: Option<Layer>,
}

/// Allocates, frees and recycles layers.
///
/// Freed layers keep their audio allocation and are handed out again by
/// [`alloc`](LayerPool::alloc), so steady-state looping does not hit the allocator.
#[derive(Debug)]
pub struct LayerPool {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    recycled: Vec<Layer>,
    channels: usize,
    fade_frames: usize,
    counter: u32,
}

impl LayerPool {
    pub fn new(channels: usize, fade_frames: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            recycled: Vec::new(),
            channels,
            fade_frames,
            counter: 0,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Layers currently allocated.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.layer.is_some()).count()
    }

    /// Returns an empty layer.
    pub fn alloc(&mut self) -> LayerId {
        let mut layer = self
            .recycled
            .pop()
            .unwrap_or_else(|| Layer::new(self.channels, self.fade_frames));
        self.counter += 1;
        layer.set_number(self.counter);

        match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.layer = Some(layer);
                LayerId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    layer: Some(layer),
                });
                LayerId::new(index, 0)
            }
        }
    }

    /// Allocates a copy of `source`.
    pub fn copy(&mut self, source: LayerId) -> LayerId {
        let id = self.alloc();
        let (src, dst) = self.pair_mut(source, id);
        dst.copy_from(src, source);
        id
    }

    /// Makes `dest` a copy of `source` in place.
    pub fn copy_into(&mut self, source: LayerId, dest: LayerId) {
        if source == dest {
            return;
        }
        let (src, dst) = self.pair_mut(source, dest);
        dst.copy_from(src, source);
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.layer.as_ref())
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.layer.as_mut())
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    /// Two distinct layers at once.
    ///
    /// # Panics
    ///
    /// If `a == b` or either handle is stale.
    pub fn pair_mut(&mut self, a: LayerId, b: LayerId) -> (&mut Layer, &mut Layer) {
        assert_ne!(a.index, b.index, "pair_mut needs two distinct layers");
        let (ai, bi) = (a.index as usize, b.index as usize);
        let (first, second) = if ai < bi {
            let (lo, hi) = self.slots.split_at_mut(bi);
            (&mut lo[ai], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ai);
            (&mut hi[0], &mut lo[bi])
        };
        (slot_layer(first, a), slot_layer(second, b))
    }

    /// Returns a layer to the pool. Stale handles are ignored.
    pub fn free(&mut self, id: LayerId) {
        let Some(slot) = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
        else {
            tracing::warn!(?id, "freeing stale layer");
            return;
        };
        if let Some(mut layer) = slot.layer.take() {
            layer.recycle();
            self.recycled.push(layer);
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(id.index);
        }
    }

    /// Frees `start` and every layer reachable through `prev` links.
    pub fn free_undo_chain(&mut self, start: Option<LayerId>) {
        let mut next = start;
        while let Some(id) = next {
            next = self.get(id).and_then(|l| l.prev());
            self.free(id);
        }
    }

    /// Frees `start` and every layer reachable through `redo` links.
    pub fn free_redo_chain(&mut self, start: Option<LayerId>) {
        let mut next = start;
        while let Some(id) = next {
            next = self.get(id).and_then(|l| l.redo());
            self.free(id);
        }
    }

    /// Length of the undo chain starting at `start`.
    pub fn undo_depth(&self, start: Option<LayerId>) -> usize {
        let mut depth = 0;
        let mut next = start;
        while let Some(id) = next {
            depth += 1;
            next = self.get(id).and_then(|l| l.prev());
        }
        depth
    }

    /// Length of the redo chain starting at `start`.
    pub fn redo_depth(&self, start: Option<LayerId>) -> usize {
        let mut depth = 0;
        let mut next = start;
        while let Some(id) = next {
            depth += 1;
            next = self.get(id).and_then(|l| l.redo());
        }
        depth
    }
}

fn slot_layer(slot: &mut Slot, id: LayerId) -> &mut Layer {
    match slot.layer.as_mut() {
        Some(layer) if slot.generation == id.generation => layer,
        _ => panic!("stale layer id {id:?}"),
    }
}

impl Index<LayerId> for LayerPool {
    type Output = Layer;

    fn index(&self, id: LayerId) -> &Layer {
        match self.get(id) {
            Some(layer) => layer,
            None => panic!("stale layer id {id:?}"),
        }
    }
}

impl IndexMut<LayerId> for LayerPool {
    fn index_mut(&mut self, id: LayerId) -> &mut Layer {
        match self.get_mut(id) {
            Some(layer) => layer,
            None => panic!("stale layer id {id:?}"),
        }
    }
}

//! Per-track event queue.

use super::{Event, EventId, EventType};

/// Orders events by frame, first scheduled first among equals.
///
/// Pending events sit in the queue without a usable frame until activated.
#[derive(Debug, Default)]
pub struct EventManager {
    events: Vec<Event>,
    next_id: u64,
    validation_suppressed: bool,
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32),
            next_id: 1,
            validation_suppressed: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Schedules `event` and returns its id.
    pub fn add(&mut self, mut event: Event) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        event.id = id;
        tracing::trace!(kind = ?event.kind, frame = event.frame, pending = event.pending, "event scheduled");
        self.events.push(event);
        id
    }

    /// Schedules `event` as a child of `parent`.
    pub fn add_child(&mut self, parent: EventId, mut event: Event) -> EventId {
        event.parent = Some(parent);
        let id = self.add(event);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id == id)
    }

    /// First scheduled event of `kind`.
    pub fn find_event(&self, kind: EventType) -> Option<&Event> {
        self.events.iter().find(|e| e.kind == kind)
    }

    pub fn find_event_mut(&mut self, kind: EventType) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.kind == kind)
    }

    /// The child of `parent` with the given kind.
    pub fn find_child(&self, parent: EventId, kind: EventType) -> Option<&Event> {
        self.events
            .iter()
            .find(|e| e.parent == Some(parent) && e.kind == kind)
    }

    /// Earliest ready event due before `from + frames`. Late events are due immediately.
    pub fn next_event(&self, from: i64, frames: i64) -> Option<EventId> {
        self.events
            .iter()
            .filter(|e| !e.pending && e.frame < from + frames)
            .min_by_key(|e| (e.frame.max(from), e.id))
            .map(|e| e.id)
    }

    /// Removes an event to process it. Its children stay scheduled.
    pub fn take(&mut self, id: EventId) -> Option<Event> {
        let index = self.events.iter().position(|e| e.id == id)?;
        let event = self.events.remove(index);
        if let Some(parent) = event.parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        Some(event)
    }

    /// Removes an event and all of its descendants.
    pub fn remove_event(&mut self, id: EventId) -> Option<Event> {
        let event = self.take(id)?;
        for child in event.children.iter().copied() {
            self.remove_event(child);
        }
        Some(event)
    }

    /// Removes every event of `kind`.
    pub fn remove_kind(&mut self, kind: EventType) {
        while let Some(id) = self.find_event(kind).map(|e| e.id) {
            self.remove_event(id);
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Removes the most recently scheduled undoable top-level event.
    pub fn undo_last_event(&mut self) -> Option<Event> {
        let id = self
            .events
            .iter()
            .filter(|e| e.undoable && e.parent.is_none())
            .max_by_key(|e| e.id)
            .map(|e| e.id)?;
        let event = self.remove_event(id);
        if let Some(e) = &event {
            tracing::debug!(kind = ?e.kind, frame = e.frame, "event undone");
        }
        event
    }

    /// Gives the first pending event of `kind` a frame. Returns whether one was found.
    pub fn activate_pending(&mut self, kind: EventType, frame: i64) -> bool {
        match self.events.iter_mut().find(|e| e.pending && e.kind == kind) {
            Some(event) => {
                event.pending = false;
                event.frame = frame;
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.events.iter().any(|e| e.pending)
    }

    /// Moves events at or past `threshold` back by `delta`, after the record cursor
    /// wrapped or the loop was trimmed.
    pub fn rebase(&mut self, threshold: i64, delta: i64) {
        for event in self.events.iter_mut().filter(|e| !e.pending && e.frame >= threshold) {
            event.frame -= delta;
        }
    }

    /// Moves every ready event by `delta`.
    pub fn offset(&mut self, delta: i64) {
        for event in self.events.iter_mut().filter(|e| !e.pending) {
            event.frame += delta;
        }
    }

    #[inline]
    pub fn is_validation_suppressed(&self) -> bool {
        self.validation_suppressed
    }

    pub fn set_validation_suppressed(&mut self, suppressed: bool) {
        self.validation_suppressed = suppressed;
    }
}

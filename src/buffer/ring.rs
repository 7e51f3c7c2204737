//! Fixed-capacity frame ring
//!
//! Slot `i` holds the newest frame whose sequence number is congruent to `i`
//! modulo the capacity. Writing a slot releases whatever handle it held, so
//! each residue keeps at most one live frame and look-back is bounded by the
//! capacity.
//!
//! The ring itself is not synchronized; it lives inside the sync monitor and
//! is only touched while the monitor lock is held.

use crate::frame::FrameHandle;

/// Ring of decoded frame slots
#[derive(Debug)]
pub struct FrameRing {
    /// Slots, empty until first written
    slots: Vec<Option<FrameHandle>>,
}

impl FrameRing {
    /// Create a ring with `capacity` empty slots
    ///
    /// Capacity is validated by the decoder config; a zero capacity here
    /// produces a ring that never holds anything.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot index for a sequence number, `None` for a ring without slots
    fn slot_of(&self, sequence: u64) -> Option<usize> {
        sequence
            .checked_rem(self.slots.len() as u64)
            .map(|index| index as usize)
    }

    /// Store the frame with the given sequence number
    ///
    /// The previous occupant of the slot is released before the new frame
    /// takes its place.
    pub fn write(&mut self, sequence: u64, frame: FrameHandle) {
        let Some(index) = self.slot_of(sequence) else {
            return;
        };
        if let Some(old) = self.slots[index].take() {
            tracing::trace!(slot = index, pts = old.pts, "Releasing overwritten frame");
            old.release();
        }
        self.slots[index] = Some(frame);
    }

    /// Take a new reference to the frame in `slot`, if any
    pub fn read(&self, slot: usize) -> Option<FrameHandle> {
        self.slots
            .get(slot)
            .and_then(|s| s.as_ref())
            .map(FrameHandle::acquire_ref)
    }

    /// Resolve a look-back request against `produced` frames
    ///
    /// `offset` counts frames behind the newest one: `0` is the newest,
    /// `-k` is `k` frames older. Positive offsets are treated as `0`.
    /// Returns `None` when the requested frame was never written or has
    /// already been overwritten.
    pub fn look_back(&self, produced: u64, offset: i64) -> Option<usize> {
        let back = if offset >= 0 { 0 } else { offset.unsigned_abs() };

        if back >= self.slots.len() as u64 || back >= produced {
            return None;
        }

        let slot = self.slot_of(produced - 1 - back)?;
        self.slots[slot].as_ref().map(|_| slot)
    }

    /// Take a new reference to the frame `offset` behind the newest one
    pub fn read_back(&self, produced: u64, offset: i64) -> Option<FrameHandle> {
        self.look_back(produced, offset).and_then(|slot| self.read(slot))
    }

    /// Number of slots holding a frame
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Release every held frame, leaving all slots empty
    pub fn release_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(frame) = slot.take() {
                frame.release();
            }
        }
    }

    /// Release every frame and drop all slots
    pub fn clear(&mut self) {
        self.release_all();
        self.slots.clear();
    }
}

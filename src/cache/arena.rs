//! Fixed-Slot Arena
//!
//! One contiguous byte arena split into equally sized slots, with a
//! [`Bitmap`] tracking which slots are in use. Holds no policy about what
//! a slot contains; [`Bucket`](super::bucket::Bucket) layers the prefixed
//! payload format on top.

use super::bitmap::Bitmap;

/// Arena of `slot_count` slots of `slot_bytes` each
#[derive(Debug)]
pub struct SlotArena {
    slot_bytes: usize,
    data: Vec<u8>,
    bitmap: Bitmap,
}

impl SlotArena {
    /// Allocate the full arena up front
    pub fn new(slot_bytes: usize, slot_count: usize) -> Self {
        Self {
            slot_bytes,
            data: vec![0; slot_bytes * slot_count],
            bitmap: Bitmap::new(slot_count),
        }
    }

    /// Size of each slot in bytes
    #[inline]
    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    /// Total number of slots
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.bitmap.len()
    }

    /// Claim a free slot, or `None` when the arena is full
    pub fn allocate(&mut self) -> Option<usize> {
        let slot = self.bitmap.find_free()?;
        self.bitmap.set(slot);
        Some(slot)
    }

    /// Release a slot. Its bytes stay in place until the slot is reused.
    pub fn free(&mut self, slot: usize) {
        self.bitmap.clear(slot);
    }

    /// Release every slot at once
    pub fn reset(&mut self) {
        self.bitmap.clear_all();
    }

    /// Whether a slot is currently claimed
    pub fn is_allocated(&self, slot: usize) -> bool {
        self.bitmap.is_set(slot)
    }

    /// Number of claimed slots
    pub fn allocated(&self) -> usize {
        self.bitmap.count_set()
    }

    /// Bytes of a slot
    #[inline]
    pub fn slot(&self, slot: usize) -> &[u8] {
        let start = slot * self.slot_bytes;
        &self.data[start..start + self.slot_bytes]
    }

    /// Mutable bytes of a slot
    #[inline]
    pub fn slot_mut(&mut self, slot: usize) -> &mut [u8] {
        let start = slot * self.slot_bytes;
        &mut self.data[start..start + self.slot_bytes]
    }

    /// Claimed slots in ascending index order
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        self.bitmap.iter_set().map(move |slot| (slot, self.slot(slot)))
    }
}

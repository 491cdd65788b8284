//! Per-frame uniform data ring.
//!
//! Uniform blocks are bump-allocated from one fixed-size buffer per in-flight
//! frame. The CPU writes into a host copy of the buffer that belongs to the
//! current rotation slot; at commit the written prefix is flushed to the
//! driver's buffer for that slot. Because the pacer keeps the CPU at most
//! `frames_in_flight` frames ahead, the slot being written is never the one the
//! GPU is reading.
//!
//! ```text
//! slot 0: [ub0|pad][ub1|pad][ub2|pad].........   <- written in frame 1, 3, 5...
//! slot 1: [ub0|pad].........................     <- written in frame 2, 4, 6...
//!                           ^ cursor
//! ```
//!
//! Unlike a general-purpose streaming ring, running out of space is a hard
//! error: the ring is sized once from configuration and a frame that does not
//! fit cannot be split.

/// A sub-allocation from the uniform ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingAllocation {
    /// Byte offset into the slot's buffer.
    pub offset: u32,
    /// Size of the uploaded block in bytes.
    pub size: u32,
}

impl RingAllocation {
    /// End offset of the block (offset + size).
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Bump allocator over one host buffer per rotation slot.
///
/// `UniformRing` is NOT thread-safe; it is owned by the submitting thread.
pub struct UniformRing {
    slots: Vec<Box<[u8]>>,
    capacity: usize,
    alignment: usize,
    cursor: usize,
    active: usize,
}

impl UniformRing {
    /// Create a ring with `frames_in_flight` slots of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two or `capacity` is not a
    /// non-zero multiple of it.
    pub fn new(frames_in_flight: usize, capacity: usize, alignment: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        assert!(
            alignment.is_power_of_two(),
            "alignment must be a power of 2, got {alignment}"
        );
        assert!(
            capacity > 0 && capacity % alignment == 0,
            "uniform ring capacity {capacity} must be a non-zero multiple of {alignment}"
        );
        assert!(
            capacity <= u32::MAX as usize,
            "uniform ring capacity {capacity} exceeds 32-bit offsets"
        );

        Self {
            slots: (0..frames_in_flight)
                .map(|_| vec![0u8; capacity].into_boxed_slice())
                .collect(),
            capacity,
            alignment,
            cursor: 0,
            active: 0,
        }
    }

    /// Start writing into `slot`, discarding anything written to it before.
    pub fn begin_frame(&mut self, slot: usize) {
        assert!(slot < self.slots.len(), "rotation slot {slot} out of range");
        self.active = slot;
        self.cursor = 0;
    }

    /// Copy a uniform block into the active slot.
    ///
    /// The block lands at the current cursor, which then advances to the next
    /// aligned offset past the block.
    ///
    /// # Panics
    ///
    /// Panics if the block does not fit in the remaining space.
    pub fn push(&mut self, data: &[u8]) -> RingAllocation {
        assert!(
            self.cursor & (self.alignment - 1) == 0,
            "uniform ring cursor {} is not {}-byte aligned",
            self.cursor,
            self.alignment
        );
        assert!(
            self.cursor + data.len() <= self.capacity,
            "uniform ring overflow: {} bytes at offset {} exceed {} bytes, raise the uniform buffer size",
            data.len(),
            self.cursor,
            self.capacity
        );

        let offset = self.cursor;
        self.slots[self.active][offset..offset + data.len()].copy_from_slice(data);
        self.cursor = align_up(offset + data.len(), self.alignment);

        RingAllocation {
            offset: offset as u32,
            size: data.len() as u32,
        }
    }

    /// Bytes written to the active slot this frame, including padding.
    pub fn written(&self) -> &[u8] {
        &self.slots[self.active][..self.cursor]
    }

    /// Check if a block of `size` bytes fits at the current cursor.
    pub fn can_allocate(&self, size: usize) -> bool {
        self.cursor + size <= self.capacity
    }

    /// Current write offset in the active slot.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for UniformRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniformRing")
            .field("slots", &self.slots.len())
            .field("capacity", &self.capacity)
            .field("alignment", &self.alignment)
            .field("cursor", &self.cursor)
            .field("active", &self.active)
            .finish()
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_ring_offsets_are_aligned() {
        let mut ring = UniformRing::new(2, 4096, 256);
        ring.begin_frame(0);

        let a = ring.push(&[1u8; 64]);
        let b = ring.push(&[2u8; 64]);
        assert_eq!(a, RingAllocation { offset: 0, size: 64 });
        assert_eq!(b.offset, 256);
        assert_eq!(ring.cursor(), 512);
    }

    #[test]
    fn test_uniform_ring_written_range() {
        let mut ring = UniformRing::new(2, 1024, 256);
        ring.begin_frame(1);
        ring.push(&[7u8; 16]);
        let written = ring.written();
        assert_eq!(written.len(), 256);
        assert_eq!(&written[..16], &[7u8; 16]);
        assert_eq!(ring.active_slot(), 1);
    }

    #[test]
    fn test_uniform_ring_slots_are_independent() {
        let mut ring = UniformRing::new(2, 512, 256);
        ring.begin_frame(0);
        ring.push(&[0xAA; 4]);
        ring.begin_frame(1);
        ring.push(&[0xBB; 4]);
        assert_eq!(&ring.written()[..4], &[0xBB; 4]);
        ring.begin_frame(0);
        assert!(ring.written().is_empty());
        assert_eq!(ring.remaining(), 512);
    }

    #[test]
    fn test_uniform_ring_exact_fit() {
        let mut ring = UniformRing::new(1, 512, 256);
        ring.begin_frame(0);
        ring.push(&[0; 256]);
        assert!(ring.can_allocate(256));
        let last = ring.push(&[0; 256]);
        assert_eq!(last.end(), 512);
        assert_eq!(ring.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "uniform ring overflow")]
    fn test_uniform_ring_overflow_panics() {
        let mut ring = UniformRing::new(1, 256, 256);
        ring.begin_frame(0);
        ring.push(&[0; 200]);
        ring.push(&[0; 1]);
    }

    #[test]
    #[should_panic(expected = "must be a power of 2")]
    fn test_uniform_ring_bad_alignment_panics() {
        let _ = UniformRing::new(1, 300, 100);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(100, 16), 112);
    }
}

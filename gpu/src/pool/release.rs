//! Deferred release of native objects.
//!
//! Destroying a resource while the GPU may still read it from an in-flight
//! frame is undefined behaviour on every native API. Instead of freeing
//! immediately, the pool slot is tagged with the frame it was destroyed in and
//! parked in a [`ReleaseQueue`]. Once that frame can no longer be in flight the
//! slot returns to the free list and the native object is dropped.
//!
//! ```text
//! frame:      5        6        7        8
//! CPU:     destroy  ........ ........ sweep -> slot freed
//! GPU:     <- frame 5 may still execute ->|
//! ```

use std::collections::VecDeque;

use super::handle::{HandlePool, SlotIndex};

/// A slot waiting to be released, tagged with the frame it was retired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseItem {
    /// Frame counter value at the time the owner was destroyed.
    pub retire_after_frame: u64,
    /// Slot to release.
    pub slot: SlotIndex,
}

impl ReleaseItem {
    /// Check whether the item can be released at `current_frame`.
    ///
    /// The frame that retired the item, and the `frames_in_flight` frames that
    /// may have been queued before it, must all have left the GPU.
    pub fn is_safe(&self, current_frame: u64, frames_in_flight: usize) -> bool {
        self.retire_after_frame + frames_in_flight as u64 + 1 <= current_frame
    }
}

/// A bounded FIFO of [`ReleaseItem`]s.
///
/// The capacity is fixed at construction and equals the capacity of the
/// handle pool it serves, so a queue overflow means the same slot was released
/// more than once.
#[derive(Debug)]
pub struct ReleaseQueue {
    items: VecDeque<ReleaseItem>,
    capacity: usize,
}

impl ReleaseQueue {
    /// Create an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "release queue capacity must be at least 1");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue a slot for release once `frame` has retired.
    ///
    /// An absent slot is ignored.
    ///
    /// # Panics
    ///
    /// Panics if the queue is full.
    pub fn enqueue(&mut self, frame: u64, slot: Option<SlotIndex>) {
        let Some(slot) = slot else {
            return;
        };
        assert!(
            self.items.len() < self.capacity,
            "release queue full ({} items)",
            self.capacity
        );
        self.items.push_back(ReleaseItem {
            retire_after_frame: frame,
            slot,
        });
    }

    /// Release every item that is safe at `current_frame`.
    ///
    /// Items are visited in the order they were queued and the sweep stops at
    /// the first item that is not yet safe. Returns the released objects in
    /// that order, leaving it to the caller to drop them.
    pub fn sweep<T>(
        &mut self,
        current_frame: u64,
        frames_in_flight: usize,
        pool: &mut HandlePool<T>,
    ) -> Vec<T> {
        let mut released = Vec::new();
        while let Some(item) = self.items.front()
            && item.is_safe(current_frame, frames_in_flight)
        {
            let slot = item.slot;
            self.items.pop_front();
            released.push(pool.release(slot));
        }
        released
    }

    /// Remove every item regardless of frame, for teardown.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Oldest queued item.
    pub fn front(&self) -> Option<&ReleaseItem> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

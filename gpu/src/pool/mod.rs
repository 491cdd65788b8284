//! Native object storage with frame-deferred release.
//!
//! Every native driver object created on behalf of a logical resource lives in
//! a single [`HandlePool`]. Logical resources refer to their native objects by
//! [`SlotIndex`], so the native API's own reference counting never has to be
//! touched from the hot path.
//!
//! ```text
//!   add(object) ──► HandlePool ──► SlotIndex stored in Buffer/Shader/Pipeline
//!                        ▲
//!   destroy ──► ReleaseQueue (frame tag) ──► sweep at commit ──► slot freed
//! ```

mod handle;
mod release;

pub use handle::{HandlePool, SlotIndex};
pub use release::{ReleaseItem, ReleaseQueue};

/// A [`HandlePool`] paired with the [`ReleaseQueue`] that feeds it back.
#[derive(Debug)]
pub struct NativePool<T> {
    pool: HandlePool<T>,
    releases: ReleaseQueue,
    frames_in_flight: usize,
}

impl<T> NativePool<T> {
    /// Create a pool of `capacity` slots whose releases wait for
    /// `frames_in_flight` frames.
    pub fn new(capacity: usize, frames_in_flight: usize) -> Self {
        Self {
            pool: HandlePool::new(capacity),
            releases: ReleaseQueue::new(capacity),
            frames_in_flight,
        }
    }

    /// Store an object. An absent object yields `None` and takes no slot.
    pub fn add(&mut self, object: Option<T>) -> Option<SlotIndex> {
        self.pool.add(object)
    }

    /// Store an object that is always present.
    pub fn insert(&mut self, object: T) -> SlotIndex {
        match self.pool.add(Some(object)) {
            Some(index) => index,
            None => unreachable!("a present object always takes a slot"),
        }
    }

    pub fn get(&self, index: SlotIndex) -> &T {
        self.pool.get(index)
    }

    /// Resolve an optional slot.
    pub fn get_opt(&self, index: Option<SlotIndex>) -> Option<&T> {
        index.map(|index| self.pool.get(index))
    }

    /// Schedule a slot for release after `frame` has left the GPU.
    pub fn defer_release(&mut self, frame: u64, index: Option<SlotIndex>) {
        if let Some(slot) = index {
            self.pool.retire(slot);
        }
        self.releases.enqueue(frame, index);
    }

    /// Release every slot that is safe at `current_frame`.
    ///
    /// Returns the number of released slots.
    pub fn collect_garbage(&mut self, current_frame: u64) -> usize {
        let released = self
            .releases
            .sweep(current_frame, self.frames_in_flight, &mut self.pool);
        let count = released.len();
        if count > 0 {
            log::debug!("Released {count} native objects at frame {current_frame}");
        }
        count
    }

    /// Drop every remaining object, pending or live.
    ///
    /// Only valid once the GPU is idle.
    pub(crate) fn release_all(&mut self) -> usize {
        self.releases.clear();
        self.pool.drain().len()
    }

    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    pub fn pool(&self) -> &HandlePool<T> {
        &self.pool
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}

//! Fixed-capacity slot table for native driver objects.

use std::fmt;

/// Index of an occupied slot in a [`HandlePool`].
///
/// An absent object is represented by `Option<SlotIndex>::None`, never by a
/// reserved index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Raw slot number.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static_assertions::assert_eq_size!(SlotIndex, u32);

/// State of a single pool slot.
#[derive(Debug)]
enum Slot<T> {
    Free,
    Live(T),
    /// Destroyed by the owner, waiting in the release queue.
    Retiring(T),
}

/// A fixed-capacity table of native objects addressed by [`SlotIndex`].
///
/// Free slots are kept on a stack seeded so that index 0 is handed out first.
/// Exhausting the pool is a configuration error and panics.
pub struct HandlePool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> HandlePool<T> {
    /// Create a pool with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "handle pool capacity must be at least 1");
        assert!(
            capacity <= u32::MAX as usize,
            "handle pool capacity {capacity} does not fit a slot index"
        );

        let slots = (0..capacity).map(|_| Slot::Free).collect();
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    /// Store an object and return its slot.
    ///
    /// An absent object takes no slot and yields `None`.
    ///
    /// # Panics
    ///
    /// Panics if no free slot remains.
    pub fn add(&mut self, object: Option<T>) -> Option<SlotIndex> {
        let object = object?;
        let Some(index) = self.free.pop() else {
            panic!(
                "handle pool exhausted ({} slots), raise the resource pool sizes",
                self.slots.len()
            );
        };
        let slot = &mut self.slots[index as usize];
        debug_assert!(matches!(slot, Slot::Free));
        *slot = Slot::Live(object);
        Some(SlotIndex(index))
    }

    /// Look up the object stored in a slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is free.
    pub fn get(&self, index: SlotIndex) -> &T {
        match &self.slots[index.index()] {
            Slot::Live(object) | Slot::Retiring(object) => object,
            Slot::Free => panic!("lookup of free handle pool slot {index}"),
        }
    }

    /// Mark a live slot as waiting for release.
    ///
    /// # Panics
    ///
    /// Panics if the slot is free or already retiring.
    pub fn retire(&mut self, index: SlotIndex) {
        let slot = &mut self.slots[index.index()];
        *slot = match std::mem::replace(slot, Slot::Free) {
            Slot::Live(object) => Slot::Retiring(object),
            Slot::Retiring(_) => panic!("handle pool slot {index} released twice"),
            Slot::Free => panic!("release of free handle pool slot {index}"),
        };
    }

    /// Return a slot to the free list and hand back its object.
    ///
    /// # Panics
    ///
    /// Panics if the slot is free.
    pub fn release(&mut self, index: SlotIndex) -> T {
        let slot = std::mem::replace(&mut self.slots[index.index()], Slot::Free);
        match slot {
            Slot::Live(object) | Slot::Retiring(object) => {
                self.free.push(index.0);
                object
            }
            Slot::Free => panic!("release of free handle pool slot {index}"),
        }
    }

    /// Release every occupied slot, returning the objects in slot order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let occupied: Vec<SlotIndex> = (0..self.slots.len() as u32)
            .map(SlotIndex)
            .filter(|&index| !self.is_free(index))
            .collect();
        occupied.into_iter().map(|index| self.release(index)).collect()
    }

    /// Check whether a slot is free.
    pub fn is_free(&self, index: SlotIndex) -> bool {
        matches!(self.slots[index.index()], Slot::Free)
    }

    /// Check whether a slot is waiting for release.
    pub fn is_retiring(&self, index: SlotIndex) -> bool {
        matches!(self.slots[index.index()], Slot::Retiring(_))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of occupied slots, live or retiring.
    pub fn occupied_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T> fmt::Debug for HandlePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool")
            .field("capacity", &self.capacity())
            .field("free", &self.free_count())
            .finish()
    }
}

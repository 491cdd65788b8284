//! Logical GPU resources.
//!
//! Logical resources (buffers, shaders, pipelines) are what callers hold on
//! to. Each one lives in a fixed-size [`ResourceSlots`] arena and is addressed
//! by a generation handle [`Id`], so a handle to a destroyed resource is
//! detected instead of silently aliasing whatever reuses its slot.
//!
//! The native objects a logical resource owns are stored separately in the
//! backend's [`NativePool`](crate::pool::NativePool) and referenced by
//! [`SlotIndex`](crate::pool::SlotIndex).

mod buffer;
mod pipeline;
mod shader;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub use buffer::{Buffer, BufferDescriptor, BufferType, Usage};
pub use pipeline::{DrawState, Pipeline, PipelineDescriptor};
pub use shader::{Shader, ShaderDescriptor, ShaderStageDescriptor, ShaderStageObjects};

use crate::error::{GraphicsError, GraphicsResult};

/// Kind of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
    Shader,
    Pipeline,
    Pass,
}

/// Lifecycle state of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Slot is unused.
    #[default]
    Initial,
    /// Slot is reserved, native objects are being created.
    Alloc,
    /// Native objects exist and the resource can be used.
    Valid,
    /// Creation failed; the resource holds no native objects.
    Failed,
}

/// Generation handle to a logical resource of type `T`.
pub struct Id<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot number inside the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the handle was issued with.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}v{})", self.index, self.generation)
    }
}

pub type BufferId = Id<Buffer>;
pub type ShaderId = Id<Shader>;
pub type PipelineId = Id<Pipeline>;

static_assertions::assert_impl_all!(BufferId: Send, Sync, Copy);

#[derive(Debug)]
struct Entry<T> {
    generation: u32,
    state: ResourceState,
    resource: Option<T>,
}

impl<T> Entry<T> {
    fn matches<U>(&self, id: Id<U>) -> bool {
        self.generation == id.generation && self.state != ResourceState::Initial
    }
}

/// Fixed-capacity arena of logical resources.
#[derive(Debug)]
pub struct ResourceSlots<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    kind: ResourceKind,
}

impl<T> ResourceSlots<T> {
    /// Create an arena with `capacity` slots.
    pub fn new(kind: ResourceKind, capacity: u32) -> Self {
        let entries = (0..capacity)
            .map(|_| Entry {
                generation: 0,
                state: ResourceState::Initial,
                resource: None,
            })
            .collect();
        Self {
            entries,
            free: (0..capacity).rev().collect(),
            kind,
        }
    }

    /// Reserve a slot in the [`ResourceState::Alloc`] state.
    pub fn alloc(&mut self) -> GraphicsResult<Id<T>> {
        let index = self
            .free
            .pop()
            .ok_or(GraphicsError::PoolExhausted(self.kind))?;
        let entry = &mut self.entries[index as usize];
        entry.generation = entry.generation.wrapping_add(1);
        entry.state = ResourceState::Alloc;
        Ok(Id::new(index, entry.generation))
    }

    /// Finish creation: `Some` makes the resource valid, `None` marks it failed.
    pub fn init(&mut self, id: Id<T>, resource: Option<T>) -> ResourceState {
        let kind = self.kind;
        let Some(entry) = self.entry_mut(id) else {
            panic!("init of stale {kind:?} handle {id:?}");
        };
        assert_eq!(entry.state, ResourceState::Alloc, "resource initialized twice");
        entry.state = if resource.is_some() {
            ResourceState::Valid
        } else {
            ResourceState::Failed
        };
        entry.resource = resource;
        entry.state
    }

    /// Lifecycle state, or `None` if the handle is stale.
    pub fn state(&self, id: Id<T>) -> Option<ResourceState> {
        self.entry(id).map(|entry| entry.state)
    }

    /// Look up a valid resource.
    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.entry(id).and_then(|entry| entry.resource.as_ref())
    }

    /// Look up a valid resource mutably.
    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        self.entry_mut(id).and_then(|entry| entry.resource.as_mut())
    }

    /// Free the slot, invalidating every outstanding handle to it.
    ///
    /// Returns the resource if it was valid.
    pub fn remove(&mut self, id: Id<T>) -> Option<T> {
        let entry = self.entry_mut(id)?;
        entry.state = ResourceState::Initial;
        entry.generation = entry.generation.wrapping_add(1);
        let resource = entry.resource.take();
        self.free.push(id.index);
        resource
    }

    /// Iterate over every valid resource.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|entry| entry.resource.as_ref())
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of slots in use, whatever their state.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: Id<T>) -> Option<&Entry<T>> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.matches(id))
    }

    fn entry_mut(&mut self, id: Id<T>) -> Option<&mut Entry<T>> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.matches(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_slots_lifecycle() {
        let mut slots: ResourceSlots<&str> = ResourceSlots::new(ResourceKind::Buffer, 2);
        let id = slots.alloc().unwrap();
        assert_eq!(slots.state(id), Some(ResourceState::Alloc));
        assert_eq!(slots.get(id), None);

        assert_eq!(slots.init(id, Some("vb")), ResourceState::Valid);
        assert_eq!(slots.get(id), Some(&"vb"));

        assert_eq!(slots.remove(id), Some("vb"));
        assert_eq!(slots.state(id), None);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_resource_slots_failed_resource() {
        let mut slots: ResourceSlots<u32> = ResourceSlots::new(ResourceKind::Shader, 1);
        let id = slots.alloc().unwrap();
        assert_eq!(slots.init(id, None), ResourceState::Failed);
        assert_eq!(slots.state(id), Some(ResourceState::Failed));
        assert_eq!(slots.get(id), None);
        assert_eq!(slots.remove(id), None);
    }

    #[test]
    fn test_resource_slots_stale_handle_after_reuse() {
        let mut slots: ResourceSlots<u32> = ResourceSlots::new(ResourceKind::Pipeline, 1);
        let old = slots.alloc().unwrap();
        slots.init(old, Some(1));
        slots.remove(old);

        let new = slots.alloc().unwrap();
        slots.init(new, Some(2));
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(slots.get(old), None);
        assert_eq!(slots.get(new), Some(&2));
    }

    #[test]
    fn test_resource_slots_exhaustion() {
        let mut slots: ResourceSlots<u32> = ResourceSlots::new(ResourceKind::Shader, 1);
        slots.alloc().unwrap();
        assert_eq!(
            slots.alloc(),
            Err(GraphicsError::PoolExhausted(ResourceKind::Shader))
        );
    }
}

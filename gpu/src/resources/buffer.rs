//! Vertex and index buffers.

use crate::pool::SlotIndex;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferType {
    #[default]
    VertexBuffer,
    IndexBuffer,
}

/// Update frequency of a buffer's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    /// Contents are provided at creation and never change.
    #[default]
    Immutable,
    /// Updated occasionally, at most once per frame.
    Dynamic,
    /// Updated every frame; one native buffer per frame in flight.
    Stream,
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferDescriptor<'a> {
    /// Debug label for the buffer.
    pub label: Option<&'a str>,
    /// Size in bytes.
    pub size: usize,
    pub buffer_type: BufferType,
    pub usage: Usage,
    /// Initial contents; required for immutable buffers.
    pub content: Option<&'a [u8]>,
}

impl<'a> BufferDescriptor<'a> {
    /// Create an immutable buffer initialized with `content`.
    pub fn immutable(buffer_type: BufferType, content: &'a [u8]) -> Self {
        Self {
            label: None,
            size: content.len(),
            buffer_type,
            usage: Usage::Immutable,
            content: Some(content),
        }
    }

    /// Create an uninitialized buffer updated with [`update_buffer`].
    ///
    /// [`update_buffer`]: crate::GraphicsBackend::update_buffer
    pub fn updatable(buffer_type: BufferType, usage: Usage, size: usize) -> Self {
        Self {
            label: None,
            size,
            buffer_type,
            usage,
            content: None,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    /// Check the descriptor for inconsistencies.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("buffer size cannot be zero".into());
        }
        match (self.usage, self.content) {
            (Usage::Immutable, None) => Err("immutable buffer requires content".into()),
            (_, Some(content)) if content.len() > self.size => Err(format!(
                "content of {} bytes exceeds buffer size {}",
                content.len(),
                self.size
            )),
            _ => Ok(()),
        }
    }
}

/// A logical buffer and the native buffers backing it.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) size: usize,
    pub(crate) buffer_type: BufferType,
    pub(crate) usage: Usage,
    /// One slot, or one per frame in flight for stream buffers.
    pub(crate) slots: Vec<SlotIndex>,
    pub(crate) active_slot: usize,
    /// Frame of the last update, 0 if never updated.
    pub(crate) update_frame: u64,
}

impl Buffer {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Native buffer used by draws recorded now.
    pub fn active(&self) -> SlotIndex {
        self.slots[self.active_slot]
    }

    /// Number of native buffers owned by this buffer.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor_validation() {
        let data = [0u8; 16];
        assert!(BufferDescriptor::immutable(BufferType::VertexBuffer, &data)
            .validate()
            .is_ok());
        assert!(BufferDescriptor::updatable(BufferType::IndexBuffer, Usage::Stream, 64)
            .validate()
            .is_ok());

        let missing_content = BufferDescriptor::updatable(BufferType::VertexBuffer, Usage::Immutable, 16);
        assert!(missing_content.validate().is_err());

        let empty = BufferDescriptor::updatable(BufferType::VertexBuffer, Usage::Dynamic, 0);
        assert!(empty.validate().is_err());

        let mut oversized = BufferDescriptor::immutable(BufferType::VertexBuffer, &data);
        oversized.size = 8;
        assert!(oversized.validate().is_err());
    }
}

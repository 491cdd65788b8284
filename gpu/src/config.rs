//! Backend configuration.
//!
//! [`BackendDescriptor`] carries the sizing hints consumed once at
//! initialization. Every hint left at zero falls back to its default, so
//! `BackendDescriptor::default()` is always a valid configuration.

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Alignment of every uniform block inside the uniform ring.
pub const UNIFORM_ALIGNMENT: usize = 256;

/// Default size of each per-frame uniform buffer (4 MiB).
pub const DEFAULT_UNIFORM_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Default number of logical buffers.
pub const DEFAULT_BUFFER_POOL_SIZE: u32 = 128;
/// Default number of logical images.
pub const DEFAULT_IMAGE_POOL_SIZE: u32 = 128;
/// Default number of logical shaders.
pub const DEFAULT_SHADER_POOL_SIZE: u32 = 32;
/// Default number of logical pipelines.
pub const DEFAULT_PIPELINE_POOL_SIZE: u32 = 64;
/// Default number of logical passes.
pub const DEFAULT_PASS_POOL_SIZE: u32 = 16;

/// Native objects owned by one logical resource of each kind, at most.
///
/// A stream buffer keeps one native buffer per in-flight frame, an image keeps
/// a texture, a depth texture and a sampler, a shader keeps a common library
/// plus a library and an entry function per stage, a pipeline keeps its render
/// state and depth-stencil state, and a pass keeps its attachment descriptor.
const BUFFER_OBJECT_WEIGHT: u32 = 2;
const IMAGE_OBJECT_WEIGHT: u32 = 3;
const SHADER_OBJECT_WEIGHT: u32 = 4;
const PIPELINE_OBJECT_WEIGHT: u32 = 2;
const PASS_OBJECT_WEIGHT: u32 = 1;

/// Configuration for a [`GraphicsBackend`](crate::GraphicsBackend).
///
/// # Example
///
/// ```
/// use redlilium_gpu::BackendDescriptor;
///
/// let desc = BackendDescriptor::new()
///     .with_buffer_pool_size(256)
///     .with_uniform_buffer_size(1024 * 1024);
///
/// assert_eq!(desc.buffer_pool_size(), 256);
/// assert_eq!(desc.shader_pool_size(), 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendDescriptor {
    /// Logical buffer slots; 0 selects the default.
    pub buffer_pool_size: u32,
    /// Logical image slots; 0 selects the default.
    pub image_pool_size: u32,
    /// Logical shader slots; 0 selects the default.
    pub shader_pool_size: u32,
    /// Logical pipeline slots; 0 selects the default.
    pub pipeline_pool_size: u32,
    /// Logical pass slots; 0 selects the default.
    pub pass_pool_size: u32,
    /// Bytes per per-frame uniform buffer; 0 selects the default.
    pub uniform_buffer_size: usize,
}

fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

impl BackendDescriptor {
    /// Create a descriptor with every hint at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the logical buffer pool size.
    pub fn with_buffer_pool_size(mut self, size: u32) -> Self {
        self.buffer_pool_size = size;
        self
    }

    /// Set the logical image pool size.
    pub fn with_image_pool_size(mut self, size: u32) -> Self {
        self.image_pool_size = size;
        self
    }

    /// Set the logical shader pool size.
    pub fn with_shader_pool_size(mut self, size: u32) -> Self {
        self.shader_pool_size = size;
        self
    }

    /// Set the logical pipeline pool size.
    pub fn with_pipeline_pool_size(mut self, size: u32) -> Self {
        self.pipeline_pool_size = size;
        self
    }

    /// Set the logical pass pool size.
    pub fn with_pass_pool_size(mut self, size: u32) -> Self {
        self.pass_pool_size = size;
        self
    }

    /// Set the size of each per-frame uniform buffer.
    pub fn with_uniform_buffer_size(mut self, size: usize) -> Self {
        self.uniform_buffer_size = size;
        self
    }

    pub fn buffer_pool_size(&self) -> u32 {
        or_default(self.buffer_pool_size, DEFAULT_BUFFER_POOL_SIZE)
    }

    pub fn image_pool_size(&self) -> u32 {
        or_default(self.image_pool_size, DEFAULT_IMAGE_POOL_SIZE)
    }

    pub fn shader_pool_size(&self) -> u32 {
        or_default(self.shader_pool_size, DEFAULT_SHADER_POOL_SIZE)
    }

    pub fn pipeline_pool_size(&self) -> u32 {
        or_default(self.pipeline_pool_size, DEFAULT_PIPELINE_POOL_SIZE)
    }

    pub fn pass_pool_size(&self) -> u32 {
        or_default(self.pass_pool_size, DEFAULT_PASS_POOL_SIZE)
    }

    /// Effective uniform buffer size, rounded up to [`UNIFORM_ALIGNMENT`].
    pub fn uniform_buffer_size(&self) -> usize {
        let size = or_default(self.uniform_buffer_size, DEFAULT_UNIFORM_BUFFER_SIZE);
        crate::uniforms::align_up(size, UNIFORM_ALIGNMENT)
    }

    /// Capacity of the native object pool.
    ///
    /// Weighted sum of the logical pool sizes by the number of native objects
    /// each kind of resource can own.
    pub fn native_pool_capacity(&self) -> usize {
        let capacity = BUFFER_OBJECT_WEIGHT * self.buffer_pool_size()
            + IMAGE_OBJECT_WEIGHT * self.image_pool_size()
            + SHADER_OBJECT_WEIGHT * self.shader_pool_size()
            + PIPELINE_OBJECT_WEIGHT * self.pipeline_pool_size()
            + PASS_OBJECT_WEIGHT * self.pass_pool_size();
        capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_capacity() {
        let desc = BackendDescriptor::default();
        // 2*128 + 3*128 + 4*32 + 2*64 + 1*16
        assert_eq!(desc.native_pool_capacity(), 912);
        assert_eq!(desc.uniform_buffer_size(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_zero_hints_fall_back_to_defaults() {
        let desc = BackendDescriptor::new()
            .with_buffer_pool_size(0)
            .with_pipeline_pool_size(0);
        assert_eq!(desc.buffer_pool_size(), DEFAULT_BUFFER_POOL_SIZE);
        assert_eq!(desc.pipeline_pool_size(), DEFAULT_PIPELINE_POOL_SIZE);
    }

    #[test]
    fn test_custom_pool_capacity() {
        let desc = BackendDescriptor::new()
            .with_buffer_pool_size(4)
            .with_image_pool_size(1)
            .with_shader_pool_size(2)
            .with_pipeline_pool_size(3)
            .with_pass_pool_size(5);
        assert_eq!(desc.native_pool_capacity(), 8 + 3 + 8 + 6 + 5);
    }

    #[test]
    fn test_uniform_buffer_size_is_aligned() {
        let desc = BackendDescriptor::new().with_uniform_buffer_size(1000);
        assert_eq!(desc.uniform_buffer_size(), 1024);
    }
}

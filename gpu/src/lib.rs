//! # RedLilium GPU
//!
//! Frame-paced GPU backend core for RedLilium.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsBackend`] - Resource creation, pass recording and frame submission
//! - [`Driver`] - Trait for native driver implementations
//! - [`NativePool`] - Slot-indexed native objects with frame-deferred release
//! - [`FramePacer`] - Bounds the number of frames in flight on the GPU
//! - [`UniformRing`] - Per-frame uniform staging with aligned offsets
//! - Drivers: wgpu (`wgpu-backend` feature) and Dummy (for testing)
//!
//! ## Example
//!
//! ```
//! use redlilium_gpu::{
//!     BackendDescriptor, BufferDescriptor, BufferType, DummyDrawable, DummyDriver, DummyTarget,
//!     GraphicsBackend, PassAction, SurfaceCallbacks,
//! };
//!
//! let surface = SurfaceCallbacks::new(|| Some(DummyTarget), || Some(DummyDrawable));
//! let mut backend =
//!     GraphicsBackend::new(DummyDriver::new(), BackendDescriptor::default(), surface).unwrap();
//!
//! let vertices = [0u8; 36];
//! let buffer = backend
//!     .create_buffer(&BufferDescriptor::immutable(BufferType::VertexBuffer, &vertices))
//!     .unwrap();
//!
//! backend.begin_default_pass(&PassAction::clear(redlilium_gpu::Color::BLACK), 800, 600);
//! backend.end_pass();
//! backend.commit();
//!
//! backend.destroy_buffer(buffer);
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod pool;
pub mod profiling;
pub mod resources;
pub mod surface;
pub mod sync;
pub mod types;
pub mod uniforms;

// Re-export main types for convenience
pub use backend::Driver;
pub use backend::dummy::{
    CompletionMode, DummyCommand, DummyDrawable, DummyDriver, DummyGpu, DummyTarget,
};
#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_impl::{WgpuDriver, WgpuTarget};
pub use config::{BackendDescriptor, MAX_FRAMES_IN_FLIGHT, UNIFORM_ALIGNMENT};
pub use context::GraphicsBackend;
pub use error::{GraphicsError, GraphicsResult};
pub use frame::FramePhase;
pub use pool::{HandlePool, NativePool, ReleaseQueue, SlotIndex};
pub use resources::{
    Buffer, BufferDescriptor, BufferId, BufferType, DrawState, Id, Pipeline, PipelineDescriptor,
    PipelineId, ResourceKind, ResourceState, Shader, ShaderDescriptor, ShaderId, Usage,
};
pub use surface::{SurfaceCallbacks, SurfaceProvider};
pub use sync::{FramePacer, FrameSignal};
pub use types::*;
pub use uniforms::{RingAllocation, UniformRing};

/// GPU library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the GPU subsystem.
///
/// Starts the profiler when the `profiling` feature is enabled.
pub fn init() {
    profiling::start();
    log::info!("RedLilium GPU v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_driver() {
        let driver = DummyDriver::new();
        assert_eq!(driver.name(), "Dummy Driver");
    }

    #[test]
    fn test_default_native_pool_capacity() {
        assert_eq!(BackendDescriptor::default().native_pool_capacity(), 912);
    }
}

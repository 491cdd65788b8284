//! Graphics error types.
//!
//! Only recoverable failures are reported through [`GraphicsError`]. Misuse of
//! the frame protocol (pass nesting, uniform overflow, stale handles, pool
//! exhaustion) panics instead, since continuing would corrupt GPU state.

use thiserror::Error;

use crate::resources::ResourceKind;

/// Errors that can occur in the graphics backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the backend.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// The driver refused to create a native buffer.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),
    /// Shader source failed to compile or an entry point was not found.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
    /// The driver refused to build a pipeline state object.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),
    /// A resource was created from another resource that is not usable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The logical resource pool of the given kind has no free slot.
    #[error("{0:?} pool exhausted")]
    PoolExhausted(ResourceKind),
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
}

/// Result alias used by driver factories.
pub type GraphicsResult<T> = Result<T, GraphicsError>;

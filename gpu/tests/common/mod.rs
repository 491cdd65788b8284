//! Common utilities for backend integration tests.
//!
//! Every test drives a [`GraphicsBackend`] over the dummy driver and inspects
//! what reached the "GPU" through the driver's command log.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use redlilium_gpu::{
    BackendDescriptor, BufferDescriptor, BufferId, BufferType, CompletionMode, DummyCommand,
    DummyDrawable, DummyDriver, DummyGpu, DummyTarget, GraphicsBackend, IndexType, PassAction,
    PipelineDescriptor, PipelineId, ShaderDescriptor, ShaderId, ShaderStage, SurfaceProvider,
    Usage, VertexBufferLayout, VertexFormat, VertexLayout,
};

/// Framebuffer size of the default pass.
pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;

/// Declares both default entry points.
pub const SHADER_SOURCE: &str = "fn vs_main() {} fn fs_main() {}";

/// Uniform block sizes of [`TestContext::create_shader`].
pub const VS_BLOCK_SIZE: u32 = 64;
pub const FS_BLOCK_SIZE: u32 = 16;

/// Enable log output for the test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Window surface that can be minimized from the test.
#[derive(Debug, Clone, Default)]
pub struct TestSurface {
    minimized: Arc<AtomicBool>,
}

impl TestSurface {
    pub fn set_minimized(&self, minimized: bool) {
        self.minimized.store(minimized, Ordering::SeqCst);
    }

    fn is_minimized(&self) -> bool {
        self.minimized.load(Ordering::SeqCst)
    }
}

impl SurfaceProvider<DummyDriver> for TestSurface {
    fn render_target(&mut self) -> Option<DummyTarget> {
        (!self.is_minimized()).then_some(DummyTarget)
    }

    fn drawable(&mut self) -> Option<DummyDrawable> {
        (!self.is_minimized()).then_some(DummyDrawable)
    }
}

/// A backend over the dummy driver plus handles to inspect it.
pub struct TestContext {
    pub backend: GraphicsBackend<DummyDriver>,
    pub gpu: DummyGpu,
    pub surface: TestSurface,
}

impl TestContext {
    /// Backend with default sizes whose frames complete on submit.
    pub fn new() -> Self {
        Self::with(CompletionMode::Immediate, BackendDescriptor::default())
    }

    pub fn with(completion: CompletionMode, desc: BackendDescriptor) -> Self {
        init_logger();
        let driver = DummyDriver::with_completion(completion);
        let gpu = driver.gpu();
        let surface = TestSurface::default();
        let backend = GraphicsBackend::new(driver, desc, surface.clone())
            .expect("dummy backend creation cannot fail");
        Self {
            backend,
            gpu,
            surface,
        }
    }

    /// Record and commit a frame with one empty default pass.
    pub fn frame(&mut self) {
        self.backend
            .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
        self.backend.end_pass();
        self.backend.commit();
    }

    /// Shader with one vertex and one fragment uniform block.
    pub fn create_shader(&mut self) -> ShaderId {
        let desc = ShaderDescriptor::from_source(SHADER_SOURCE)
            .with_label("test shader")
            .with_uniform_block(ShaderStage::Vertex, VS_BLOCK_SIZE)
            .with_uniform_block(ShaderStage::Fragment, FS_BLOCK_SIZE);
        self.backend
            .create_shader(&desc)
            .expect("shader pool exhausted")
    }

    /// Pipeline with a single position stream.
    pub fn create_pipeline(&mut self, shader: ShaderId, index_type: IndexType) -> PipelineId {
        let layout = VertexLayout::new()
            .with_buffer(VertexBufferLayout::new(12))
            .with_attribute(0, 0, VertexFormat::Float3);
        let desc = PipelineDescriptor::new(shader, layout)
            .with_label("test pipeline")
            .with_index_type(index_type);
        self.backend
            .create_pipeline(&desc)
            .expect("pipeline pool exhausted")
    }

    /// Immutable vertex buffer holding one triangle.
    pub fn create_vertex_buffer(&mut self) -> BufferId {
        let vertices: [f32; 9] = [0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];
        let desc = BufferDescriptor::immutable(BufferType::VertexBuffer, bytemuck::cast_slice(&vertices))
            .with_label("triangle");
        self.backend
            .create_buffer(&desc)
            .expect("buffer pool exhausted")
    }

    pub fn create_index_buffer(&mut self) -> BufferId {
        let indices: [u16; 6] = [0, 1, 2, 2, 1, 0];
        let desc = BufferDescriptor::immutable(BufferType::IndexBuffer, bytemuck::cast_slice(&indices));
        self.backend
            .create_buffer(&desc)
            .expect("buffer pool exhausted")
    }

    pub fn create_stream_buffer(&mut self, size: usize) -> BufferId {
        let desc = BufferDescriptor::updatable(BufferType::VertexBuffer, Usage::Stream, size);
        self.backend
            .create_buffer(&desc)
            .expect("buffer pool exhausted")
    }

    /// Commands submitted since the last call.
    pub fn take_commands(&self) -> Vec<DummyCommand> {
        self.gpu.take_commands()
    }
}

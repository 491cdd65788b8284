//! Native driver abstraction layer.
//!
//! A [`Driver`] turns descriptors into native objects and records encoder
//! commands. It owns no lifetime policy: every native object it creates is
//! handed to the backend, which parks it in the handle pool and decides when it
//! may be dropped.
//!
//! # Available Drivers
//!
//! - `dummy` (always built): records commands in memory, for tests
//! - `wgpu-backend`: cross-platform driver on top of wgpu
//!
//! # Object Model
//!
//! Each driver exposes its native objects as one closed enum
//! ([`Driver::Object`]). A logical resource may own several of them:
//!
//! | Resource | Native objects                                           |
//! |----------|----------------------------------------------------------|
//! | Buffer   | 1, or one per frame in flight for stream buffers         |
//! | Shader   | common library, per-stage library, per-stage function    |
//! | Pipeline | render state, optional depth-stencil state               |

pub mod dummy;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

use crate::error::GraphicsResult;
use crate::resources::{BufferDescriptor, PipelineDescriptor, ShaderDescriptor};
use crate::sync::FrameSignal;
use crate::types::{
    Color, CullMode, FaceWinding, Feature, IndexType, PassAction, PrimitiveType, Rect, ShaderStage,
};
use crate::uniforms::RingAllocation;

/// Native objects of one shader stage, as created by the driver.
#[derive(Debug)]
pub struct StageObjects<O> {
    pub library: Option<O>,
    pub function: Option<O>,
}

impl<O> Default for StageObjects<O> {
    fn default() -> Self {
        Self {
            library: None,
            function: None,
        }
    }
}

/// Native objects of a shader, as created by the driver.
#[derive(Debug)]
pub struct ShaderObjects<O> {
    /// Library compiled from the common source.
    pub library: Option<O>,
    pub vertex: StageObjects<O>,
    pub fragment: StageObjects<O>,
}

impl<O> Default for ShaderObjects<O> {
    fn default() -> Self {
        Self {
            library: None,
            vertex: StageObjects::default(),
            fragment: StageObjects::default(),
        }
    }
}

/// Native objects of a pipeline, as created by the driver.
#[derive(Debug)]
pub struct PipelineObjects<O> {
    pub render_state: O,
    pub depth_stencil_state: Option<O>,
}

/// Resolved native objects of one shader stage.
#[derive(Debug)]
pub struct StageRef<'a, O> {
    /// Library containing the stage's code.
    pub library: &'a O,
    pub function: Option<&'a O>,
    pub entry: &'a str,
    /// Declared uniform block sizes, by block index.
    pub uniform_blocks: &'a [u32],
}

/// Resolved native objects of a shader, passed to pipeline creation.
#[derive(Debug)]
pub struct ShaderRef<'a, O> {
    pub vertex: StageRef<'a, O>,
    pub fragment: StageRef<'a, O>,
}

impl<'a, O> ShaderRef<'a, O> {
    pub fn stage(&self, stage: ShaderStage) -> &StageRef<'a, O> {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

/// Resolved pipeline state applied to an encoder.
#[derive(Debug)]
pub struct PipelineRef<'a, O> {
    pub render_state: &'a O,
    pub depth_stencil_state: Option<&'a O>,
    pub cull_mode: CullMode,
    pub face_winding: FaceWinding,
    pub blend_color: Color,
    pub stencil_ref: u8,
}

/// Uniform buffer of the frame's rotation slot, bound when a pass begins.
#[derive(Debug)]
pub struct UniformBinding<'a, O> {
    pub buffer: &'a O,
    pub slot: usize,
}

/// A draw call with the index buffer already resolved.
#[derive(Debug)]
pub enum DrawCall<'a, O> {
    Vertices {
        primitive_type: PrimitiveType,
        first_vertex: u32,
        vertex_count: u32,
        instance_count: u32,
    },
    Indexed {
        primitive_type: PrimitiveType,
        index_buffer: &'a O,
        index_type: IndexType,
        /// Byte offset of the first index: base element times index size.
        index_buffer_offset: u64,
        index_count: u32,
        instance_count: u32,
    },
}

/// A native graphics driver.
///
/// Methods that encode commands receive the encoder opened by
/// [`begin_render_pass`](Driver::begin_render_pass); the backend never calls
/// them for a pass whose target or encoder was unavailable.
pub trait Driver {
    /// Closed set of native object kinds stored in the handle pool.
    type Object;
    /// Per-frame command buffer.
    type CommandBuffer;
    /// Render pass encoder.
    type Encoder;
    /// Render pass target (attachments).
    type Target;
    /// Presentable surface of a frame.
    type Drawable;

    /// Driver name for logging.
    fn name(&self) -> &'static str;

    /// Check whether an optional feature is available.
    fn supports(&self, feature: Feature) -> bool;

    /// Create the host-visible uniform buffer of rotation slot `slot`.
    fn create_uniform_buffer(&mut self, size: usize, slot: usize) -> GraphicsResult<Self::Object>;

    /// Create one native buffer. Called once per slot of a stream buffer.
    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> GraphicsResult<Self::Object>;

    /// Overwrite the start of a buffer.
    fn update_buffer(&mut self, buffer: &Self::Object, data: &[u8]);

    /// Compile a shader into its native sub-objects.
    fn create_shader(&mut self, desc: &ShaderDescriptor) -> GraphicsResult<ShaderObjects<Self::Object>>;

    /// Build pipeline state objects.
    ///
    /// `uniform_buffers` are the per-frame uniform buffers, by rotation slot.
    fn create_pipeline(
        &mut self,
        desc: &PipelineDescriptor,
        shader: ShaderRef<'_, Self::Object>,
        uniform_buffers: &[Self::Object],
    ) -> GraphicsResult<PipelineObjects<Self::Object>>;

    /// Start recording a frame.
    fn begin_command_buffer(&mut self, frame_index: u64) -> Self::CommandBuffer;

    /// Open a render pass. `None` means no encoder could be created.
    fn begin_render_pass(
        &mut self,
        cmd: &mut Self::CommandBuffer,
        target: Self::Target,
        action: &PassAction,
        uniforms: UniformBinding<'_, Self::Object>,
    ) -> Option<Self::Encoder>;

    fn set_viewport(&mut self, encoder: &mut Self::Encoder, rect: Rect);

    fn set_scissor_rect(&mut self, encoder: &mut Self::Encoder, rect: Rect);

    fn apply_pipeline(&mut self, encoder: &mut Self::Encoder, pipeline: PipelineRef<'_, Self::Object>);

    /// Bind a vertex buffer, or clear the slot with `None`.
    fn set_vertex_buffer(&mut self, encoder: &mut Self::Encoder, slot: usize, buffer: Option<&Self::Object>);

    /// Point a uniform block binding at an allocation in the frame's uniform buffer.
    fn set_uniform_block(
        &mut self,
        encoder: &mut Self::Encoder,
        stage: ShaderStage,
        index: usize,
        allocation: RingAllocation,
    );

    fn draw(&mut self, encoder: &mut Self::Encoder, call: DrawCall<'_, Self::Object>);

    fn end_render_pass(&mut self, cmd: &mut Self::CommandBuffer, encoder: Self::Encoder);

    /// Make the bytes written to a uniform buffer visible to the GPU.
    fn flush_uniforms(&mut self, buffer: &Self::Object, data: &[u8]);

    /// Submit a frame, present its drawable and arrange for `on_complete` to
    /// be signaled once the GPU has finished it.
    fn submit(
        &mut self,
        cmd: Self::CommandBuffer,
        drawable: Option<Self::Drawable>,
        on_complete: FrameSignal,
    );

    /// Give the driver a chance to run completion callbacks while the
    /// submitting thread waits for a frame slot.
    fn pump_completions(&mut self) {}
}

//! Dummy driver for testing and development.
//!
//! This driver doesn't talk to a GPU. Native objects are plain records, and
//! everything a frame encodes is appended to an in-memory command log that
//! tests inspect through a [`DummyGpu`] handle.
//!
//! GPU completion is simulated: in [`CompletionMode::Immediate`] a frame
//! completes as soon as it is submitted; in [`CompletionMode::Manual`] it stays
//! in flight until [`DummyGpu::complete_frame`] is called, typically from
//! another thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{
    DrawCall, Driver, PipelineObjects, PipelineRef, ShaderObjects, ShaderRef, StageObjects,
    UniformBinding,
};
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{BufferDescriptor, BufferType, PipelineDescriptor, ShaderDescriptor};
use crate::sync::FrameSignal;
use crate::types::{Feature, IndexType, PassAction, PixelFormat, Rect, ShaderStage};
use crate::uniforms::RingAllocation;

/// When submitted frames complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Frames complete during submission.
    #[default]
    Immediate,
    /// Frames complete when [`DummyGpu::complete_frame`] is called.
    Manual,
}

/// Kind-specific payload of a [`DummyObject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyKind {
    UniformBuffer { slot: usize, size: usize },
    Buffer { buffer_type: BufferType, size: usize },
    Library { label: Option<String> },
    Function { entry: String },
    RenderState { label: Option<String> },
    DepthStencilState,
}

/// A simulated native object.
pub struct DummyObject {
    pub id: u64,
    pub kind: DummyKind,
    shared: Arc<DummyShared>,
}

impl std::fmt::Debug for DummyObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Drop for DummyObject {
    fn drop(&mut self) {
        self.shared.live_objects.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A command recorded by the dummy driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    BeginPass { frame: u64, uniform_slot: usize, action: PassAction },
    SetViewport(Rect),
    SetScissorRect(Rect),
    ApplyPipeline { render_state: u64, depth_stencil_state: Option<u64>, stencil_ref: u8 },
    SetVertexBuffer { slot: usize, buffer: Option<u64> },
    SetUniformBlock { stage: ShaderStage, index: usize, offset: u32, size: u32 },
    Draw { first_vertex: u32, vertex_count: u32, instance_count: u32 },
    DrawIndexed {
        index_buffer: u64,
        index_type: IndexType,
        offset: u64,
        index_count: u32,
        instance_count: u32,
    },
    EndPass,
    UpdateBuffer { buffer: u64, len: usize },
    FlushUniforms { slot: usize, len: usize },
    Submit { frame: u64, presented: bool },
}

#[derive(Debug, Default)]
struct DummyShared {
    log: Mutex<Vec<DummyCommand>>,
    pending: Mutex<VecDeque<FrameSignal>>,
    live_objects: AtomicUsize,
    next_id: AtomicU64,
}

/// Test-side view of the dummy GPU.
#[derive(Debug, Clone)]
pub struct DummyGpu {
    shared: Arc<DummyShared>,
}

impl DummyGpu {
    /// Every command submitted so far, in order.
    pub fn commands(&self) -> Vec<DummyCommand> {
        self.shared.log.lock().clone()
    }

    /// Drain the command log.
    pub fn take_commands(&self) -> Vec<DummyCommand> {
        std::mem::take(&mut *self.shared.log.lock())
    }

    /// Frames submitted but not completed.
    pub fn pending_frames(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Complete the oldest in-flight frame. Returns `false` if none is pending.
    pub fn complete_frame(&self) -> bool {
        let signal = self.shared.pending.lock().pop_front();
        match signal {
            Some(signal) => {
                signal.signal();
                true
            }
            None => false,
        }
    }

    /// Complete every in-flight frame and return how many there were.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_frame() {
            completed += 1;
        }
        completed
    }

    /// Native objects created and not yet dropped.
    pub fn live_objects(&self) -> usize {
        self.shared.live_objects.load(Ordering::Acquire)
    }
}

/// Command buffer of the dummy driver.
#[derive(Debug)]
pub struct DummyCommandBuffer {
    frame: u64,
    commands: Vec<DummyCommand>,
}

/// Render pass encoder of the dummy driver.
#[derive(Debug)]
pub struct DummyEncoder {
    commands: Vec<DummyCommand>,
}

/// Render target of the dummy driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyTarget;

/// Presentable surface of the dummy driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyDrawable;

/// Dummy driver.
#[derive(Debug)]
pub struct DummyDriver {
    shared: Arc<DummyShared>,
    completion: CompletionMode,
}

impl Default for DummyDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDriver {
    /// Create a driver whose frames complete immediately.
    pub fn new() -> Self {
        Self::with_completion(CompletionMode::Immediate)
    }

    pub fn with_completion(completion: CompletionMode) -> Self {
        Self {
            shared: Arc::new(DummyShared::default()),
            completion,
        }
    }

    /// Handle for inspecting the command log and completing frames.
    pub fn gpu(&self) -> DummyGpu {
        DummyGpu {
            shared: Arc::clone(&self.shared),
        }
    }

    fn object(&self, kind: DummyKind) -> DummyObject {
        self.shared.live_objects.fetch_add(1, Ordering::AcqRel);
        DummyObject {
            id: self.shared.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            shared: Arc::clone(&self.shared),
        }
    }

    fn log(&self, command: DummyCommand) {
        self.shared.log.lock().push(command);
    }

    fn compile_stage(
        &self,
        desc: &ShaderDescriptor,
        stage: ShaderStage,
        common: Option<&DummyObject>,
    ) -> GraphicsResult<StageObjects<DummyObject>> {
        let stage_desc = desc.stage(stage);
        let library = match stage_desc.source.as_deref() {
            Some(source) => Some(self.compile_library(source, desc.label.as_deref())?),
            None => None,
        };
        if library.is_none() && common.is_none() {
            return Err(GraphicsError::ShaderCompilationFailed(format!(
                "{stage:?} stage has no source"
            )));
        }

        let source = desc.stage_source(stage).unwrap_or_default();
        if !source.contains(stage_desc.entry.as_str()) {
            return Err(GraphicsError::ShaderCompilationFailed(format!(
                "entry point '{}' not found",
                stage_desc.entry
            )));
        }
        let function = self.object(DummyKind::Function {
            entry: stage_desc.entry.clone(),
        });

        Ok(StageObjects {
            library,
            function: Some(function),
        })
    }

    fn compile_library(&self, source: &str, label: Option<&str>) -> GraphicsResult<DummyObject> {
        if source.trim().is_empty() {
            return Err(GraphicsError::ShaderCompilationFailed(
                "empty shader source".into(),
            ));
        }
        Ok(self.object(DummyKind::Library {
            label: label.map(str::to_owned),
        }))
    }
}

impl Driver for DummyDriver {
    type Object = DummyObject;
    type CommandBuffer = DummyCommandBuffer;
    type Encoder = DummyEncoder;
    type Target = DummyTarget;
    type Drawable = DummyDrawable;

    fn name(&self) -> &'static str {
        "Dummy Driver"
    }

    fn supports(&self, feature: Feature) -> bool {
        !matches!(
            feature,
            Feature::OriginBottomLeft
                | Feature::TextureCompressionPvrtc
                | Feature::TextureCompressionAtc
                | Feature::TextureCompressionEtc2
        )
    }

    fn create_uniform_buffer(&mut self, size: usize, slot: usize) -> GraphicsResult<DummyObject> {
        log::trace!("DummyDriver: creating uniform buffer {slot} (size: {size})");
        Ok(self.object(DummyKind::UniformBuffer { slot, size }))
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> GraphicsResult<DummyObject> {
        log::trace!(
            "DummyDriver: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        Ok(self.object(DummyKind::Buffer {
            buffer_type: desc.buffer_type,
            size: desc.size,
        }))
    }

    fn update_buffer(&mut self, buffer: &DummyObject, data: &[u8]) {
        self.log(DummyCommand::UpdateBuffer {
            buffer: buffer.id,
            len: data.len(),
        });
    }

    fn create_shader(&mut self, desc: &ShaderDescriptor) -> GraphicsResult<ShaderObjects<DummyObject>> {
        log::trace!("DummyDriver: creating shader {:?}", desc.label);
        let library = match desc.source.as_deref() {
            Some(source) => Some(self.compile_library(source, desc.label.as_deref())?),
            None => None,
        };
        let vertex = self.compile_stage(desc, ShaderStage::Vertex, library.as_ref())?;
        let fragment = self.compile_stage(desc, ShaderStage::Fragment, library.as_ref())?;
        Ok(ShaderObjects {
            library,
            vertex,
            fragment,
        })
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDescriptor,
        shader: ShaderRef<'_, DummyObject>,
        _uniform_buffers: &[DummyObject],
    ) -> GraphicsResult<PipelineObjects<DummyObject>> {
        log::trace!(
            "DummyDriver: creating pipeline {:?} (vs: {}, fs: {})",
            desc.label,
            shader.vertex.entry,
            shader.fragment.entry
        );
        if desc.blend.color_format == PixelFormat::None {
            return Err(GraphicsError::PipelineCreationFailed(
                "color attachment has no pixel format".into(),
            ));
        }
        Ok(PipelineObjects {
            render_state: self.object(DummyKind::RenderState {
                label: desc.label.clone(),
            }),
            depth_stencil_state: Some(self.object(DummyKind::DepthStencilState)),
        })
    }

    fn begin_command_buffer(&mut self, frame_index: u64) -> DummyCommandBuffer {
        DummyCommandBuffer {
            frame: frame_index,
            commands: Vec::new(),
        }
    }

    fn begin_render_pass(
        &mut self,
        cmd: &mut DummyCommandBuffer,
        _target: DummyTarget,
        action: &PassAction,
        uniforms: UniformBinding<'_, DummyObject>,
    ) -> Option<DummyEncoder> {
        Some(DummyEncoder {
            commands: vec![DummyCommand::BeginPass {
                frame: cmd.frame,
                uniform_slot: uniforms.slot,
                action: *action,
            }],
        })
    }

    fn set_viewport(&mut self, encoder: &mut DummyEncoder, rect: Rect) {
        encoder.commands.push(DummyCommand::SetViewport(rect));
    }

    fn set_scissor_rect(&mut self, encoder: &mut DummyEncoder, rect: Rect) {
        encoder.commands.push(DummyCommand::SetScissorRect(rect));
    }

    fn apply_pipeline(&mut self, encoder: &mut DummyEncoder, pipeline: PipelineRef<'_, DummyObject>) {
        encoder.commands.push(DummyCommand::ApplyPipeline {
            render_state: pipeline.render_state.id,
            depth_stencil_state: pipeline.depth_stencil_state.map(|state| state.id),
            stencil_ref: pipeline.stencil_ref,
        });
    }

    fn set_vertex_buffer(&mut self, encoder: &mut DummyEncoder, slot: usize, buffer: Option<&DummyObject>) {
        encoder.commands.push(DummyCommand::SetVertexBuffer {
            slot,
            buffer: buffer.map(|buffer| buffer.id),
        });
    }

    fn set_uniform_block(
        &mut self,
        encoder: &mut DummyEncoder,
        stage: ShaderStage,
        index: usize,
        allocation: RingAllocation,
    ) {
        encoder.commands.push(DummyCommand::SetUniformBlock {
            stage,
            index,
            offset: allocation.offset,
            size: allocation.size,
        });
    }

    fn draw(&mut self, encoder: &mut DummyEncoder, call: DrawCall<'_, DummyObject>) {
        let command = match call {
            DrawCall::Vertices {
                first_vertex,
                vertex_count,
                instance_count,
                ..
            } => DummyCommand::Draw {
                first_vertex,
                vertex_count,
                instance_count,
            },
            DrawCall::Indexed {
                index_buffer,
                index_type,
                index_buffer_offset,
                index_count,
                instance_count,
                ..
            } => DummyCommand::DrawIndexed {
                index_buffer: index_buffer.id,
                index_type,
                offset: index_buffer_offset,
                index_count,
                instance_count,
            },
        };
        encoder.commands.push(command);
    }

    fn end_render_pass(&mut self, cmd: &mut DummyCommandBuffer, mut encoder: DummyEncoder) {
        encoder.commands.push(DummyCommand::EndPass);
        cmd.commands.append(&mut encoder.commands);
    }

    fn flush_uniforms(&mut self, buffer: &DummyObject, data: &[u8]) {
        let slot = match buffer.kind {
            DummyKind::UniformBuffer { slot, .. } => slot,
            _ => unreachable!("uniforms flushed to a non-uniform buffer"),
        };
        self.log(DummyCommand::FlushUniforms {
            slot,
            len: data.len(),
        });
    }

    fn submit(&mut self, cmd: DummyCommandBuffer, drawable: Option<DummyDrawable>, on_complete: FrameSignal) {
        log::trace!("DummyDriver: submitting frame {}", cmd.frame);
        {
            let mut log = self.shared.log.lock();
            log.extend(cmd.commands);
            log.push(DummyCommand::Submit {
                frame: cmd.frame,
                presented: drawable.is_some(),
            });
        }
        match self.completion {
            CompletionMode::Immediate => on_complete.signal(),
            CompletionMode::Manual => self.shared.pending.lock().push_back(on_complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::FramePacer;

    #[test]
    fn test_dummy_driver_tracks_live_objects() {
        let mut driver = DummyDriver::new();
        let gpu = driver.gpu();
        let data = [0u8; 32];
        let buffer = driver
            .create_buffer(&BufferDescriptor::immutable(BufferType::VertexBuffer, &data))
            .unwrap();
        assert_eq!(gpu.live_objects(), 1);
        drop(buffer);
        assert_eq!(gpu.live_objects(), 0);
    }

    #[test]
    fn test_dummy_driver_shader_objects() {
        let mut driver = DummyDriver::new();
        let gpu = driver.gpu();

        let common = driver
            .create_shader(&ShaderDescriptor::from_source("vs_main fs_main"))
            .unwrap();
        assert!(common.library.is_some());
        assert!(common.vertex.library.is_none());
        assert!(common.fragment.function.is_some());
        assert_eq!(gpu.live_objects(), 3);

        let split = driver
            .create_shader(&ShaderDescriptor::from_stages("vs_main", "fs_main"))
            .unwrap();
        assert!(split.library.is_none());
        assert!(split.vertex.library.is_some());
        assert!(split.fragment.library.is_some());
    }

    #[test]
    fn test_dummy_driver_missing_entry_point_releases_objects() {
        let mut driver = DummyDriver::new();
        let gpu = driver.gpu();
        let result = driver.create_shader(&ShaderDescriptor::from_source("vs_main only"));
        assert!(matches!(
            result,
            Err(GraphicsError::ShaderCompilationFailed(_))
        ));
        assert_eq!(gpu.live_objects(), 0);
    }

    #[test]
    fn test_dummy_driver_manual_completion() {
        let mut driver = DummyDriver::with_completion(CompletionMode::Manual);
        let gpu = driver.gpu();
        let pacer = FramePacer::new(1);

        pacer.acquire();
        let cmd = driver.begin_command_buffer(1);
        driver.submit(cmd, Some(DummyDrawable), pacer.signal_handle());
        assert_eq!(gpu.pending_frames(), 1);
        assert_eq!(pacer.available(), 0);

        assert!(gpu.complete_frame());
        assert_eq!(pacer.available(), 1);
        assert!(!gpu.complete_frame());
        assert_eq!(
            gpu.commands(),
            vec![DummyCommand::Submit {
                frame: 1,
                presented: true
            }]
        );
    }
}

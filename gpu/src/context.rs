//! The graphics backend context.
//!
//! [`GraphicsBackend`] owns every piece of per-device state: the native
//! object pool and its release queue, the logical resource arenas, the frame
//! pacer, the uniform ring and the frame state machine. All calls happen on a
//! single submitting thread; the only state shared with the GPU side is the
//! pacer, through the [`FrameSignal`](crate::FrameSignal) each submitted frame
//! carries.
//!
//! # Frame Lifecycle
//!
//! ```text
//! begin_default_pass ──► wait for a frame slot (first pass only)
//!        │               open command buffer, reset the uniform ring
//!        ▼
//! apply_draw_state / apply_uniforms / draw ...
//!        │
//! end_pass ──► (more passes) ──► commit
//!                                  ├─ flush uniform bytes of this slot
//!                                  ├─ submit + present, completion -> pacer
//!                                  ├─ sweep the release queue
//!                                  └─ next rotation slot, frame + 1
//! ```
//!
//! # Example
//!
//! ```
//! use redlilium_gpu::{
//!     BackendDescriptor, DummyDrawable, DummyDriver, DummyTarget, GraphicsBackend, PassAction,
//!     SurfaceCallbacks,
//! };
//!
//! let surface = SurfaceCallbacks::new(|| Some(DummyTarget), || Some(DummyDrawable));
//! let mut backend =
//!     GraphicsBackend::new(DummyDriver::new(), BackendDescriptor::default(), surface).unwrap();
//!
//! backend.begin_default_pass(&PassAction::default(), 800, 600);
//! backend.end_pass();
//! backend.commit();
//! assert_eq!(backend.frame_index(), 2);
//! ```

use std::fmt;

use crate::backend::{DrawCall, Driver, PipelineRef, ShaderRef, StageRef, UniformBinding};
use crate::config::{BackendDescriptor, MAX_FRAMES_IN_FLIGHT, UNIFORM_ALIGNMENT};
use crate::error::{GraphicsError, GraphicsResult};
use crate::frame::{Bindings, FramePhase, FrameState};
use crate::pool::NativePool;
use crate::resources::{
    Buffer, BufferDescriptor, BufferId, BufferType, DrawState, Pipeline, PipelineDescriptor,
    PipelineId, ResourceKind, ResourceSlots, ResourceState, Shader, ShaderDescriptor, ShaderId,
    ShaderStageObjects, Usage,
};
use crate::surface::SurfaceProvider;
use crate::sync::FramePacer;
use crate::types::{Feature, IndexType, MAX_VERTEX_BUFFERS, PassAction, Rect, ShaderStage};
use crate::uniforms::UniformRing;

/// A frame-paced graphics backend over a native [`Driver`].
pub struct GraphicsBackend<D: Driver> {
    driver: D,
    desc: BackendDescriptor,
    objects: NativePool<D::Object>,
    buffers: ResourceSlots<Buffer>,
    shaders: ResourceSlots<Shader>,
    pipelines: ResourceSlots<Pipeline>,
    pacer: FramePacer,
    uniforms: UniformRing,
    /// One per rotation slot.
    uniform_buffers: Vec<D::Object>,
    frame: FrameState<D::CommandBuffer, D::Encoder>,
    surface: Box<dyn SurfaceProvider<D>>,
    is_shut_down: bool,
}

impl<D: Driver> GraphicsBackend<D> {
    /// Create a backend on top of `driver`.
    ///
    /// Fails if the per-frame uniform buffers cannot be created.
    pub fn new(
        mut driver: D,
        desc: BackendDescriptor,
        surface: impl SurfaceProvider<D> + 'static,
    ) -> GraphicsResult<Self> {
        let capacity = desc.native_pool_capacity();
        let uniform_buffer_size = desc.uniform_buffer_size();
        log::info!(
            "Creating GraphicsBackend on {} (native pool: {capacity} slots, uniforms: {MAX_FRAMES_IN_FLIGHT} x {uniform_buffer_size} bytes)",
            driver.name()
        );

        let uniform_buffers = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|slot| driver.create_uniform_buffer(uniform_buffer_size, slot))
            .collect::<GraphicsResult<Vec<_>>>()
            .map_err(|err| GraphicsError::InitializationFailed(format!("uniform buffer: {err}")))?;

        Ok(Self {
            driver,
            desc,
            objects: NativePool::new(capacity, MAX_FRAMES_IN_FLIGHT),
            buffers: ResourceSlots::new(ResourceKind::Buffer, desc.buffer_pool_size()),
            shaders: ResourceSlots::new(ResourceKind::Shader, desc.shader_pool_size()),
            pipelines: ResourceSlots::new(ResourceKind::Pipeline, desc.pipeline_pool_size()),
            pacer: FramePacer::new(MAX_FRAMES_IN_FLIGHT),
            uniforms: UniformRing::new(MAX_FRAMES_IN_FLIGHT, uniform_buffer_size, UNIFORM_ALIGNMENT),
            uniform_buffers,
            frame: FrameState::new(MAX_FRAMES_IN_FLIGHT),
            surface: Box::new(surface),
            is_shut_down: false,
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Counter of the frame being recorded, starting at 1.
    pub fn frame_index(&self) -> u64 {
        self.frame.frame_index()
    }

    /// Rotation slot of the frame being recorded.
    pub fn rotate_index(&self) -> usize {
        self.frame.rotate_index()
    }

    pub fn phase(&self) -> FramePhase {
        self.frame.phase()
    }

    pub fn query_feature(&self, feature: Feature) -> bool {
        self.driver.supports(feature)
    }

    pub fn buffer_state(&self, id: BufferId) -> Option<ResourceState> {
        self.buffers.state(id)
    }

    pub fn shader_state(&self, id: ShaderId) -> Option<ResourceState> {
        self.shaders.state(id)
    }

    pub fn pipeline_state(&self, id: PipelineId) -> Option<ResourceState> {
        self.pipelines.state(id)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    pub fn shader(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id)
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.get(id)
    }

    /// Native object pool, for diagnostics.
    pub fn native_pool(&self) -> &NativePool<D::Object> {
        &self.objects
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// Uniform bytes written in the current frame, including padding.
    pub fn uniform_bytes_written(&self) -> usize {
        self.uniforms.cursor()
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.desc
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    // ========================================================================
    // Buffers
    // ========================================================================

    /// Create a buffer.
    ///
    /// Driver failures do not return an error; the buffer enters
    /// [`ResourceState::Failed`] instead. An error means the buffer pool is
    /// exhausted.
    pub fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> GraphicsResult<BufferId> {
        let id = self.buffers.alloc()?;
        let buffer = match desc.validate() {
            Ok(()) => self.create_native_buffer(desc),
            Err(msg) => {
                log::warn!("Invalid buffer {:?}: {msg}", desc.label);
                None
            }
        };
        let state = self.buffers.init(id, buffer);
        log::debug!("Created buffer {id:?} {:?} ({state:?})", desc.label);
        Ok(id)
    }

    fn create_native_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Option<Buffer> {
        let slot_count = match desc.usage {
            Usage::Stream => MAX_FRAMES_IN_FLIGHT,
            Usage::Immutable | Usage::Dynamic => 1,
        };
        let natives = (0..slot_count)
            .map(|_| self.driver.create_buffer(desc))
            .collect::<GraphicsResult<Vec<_>>>();
        let natives = match natives {
            Ok(natives) => natives,
            Err(err) => {
                log::warn!("Failed to create buffer {:?}: {err}", desc.label);
                return None;
            }
        };

        Some(Buffer {
            size: desc.size,
            buffer_type: desc.buffer_type,
            usage: desc.usage,
            slots: natives
                .into_iter()
                .map(|native| self.objects.insert(native))
                .collect(),
            active_slot: 0,
            update_frame: 0,
        })
    }

    /// Replace the contents of a dynamic or stream buffer.
    ///
    /// Opens the frame first, so the write never lands in a native buffer the
    /// GPU may still read.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is invalid or immutable, the data does not fit, or
    /// the buffer was already updated this frame.
    pub fn update_buffer(&mut self, id: BufferId, data: &[u8]) {
        self.ensure_frame_open();
        let frame_index = self.frame.frame_index();
        let Some(buffer) = self.buffers.get_mut(id) else {
            panic!("update_buffer called with invalid buffer {id:?}");
        };
        assert!(
            buffer.usage != Usage::Immutable,
            "update_buffer called on immutable buffer {id:?}"
        );
        assert!(
            data.len() <= buffer.size,
            "update of {} bytes exceeds the {} bytes of buffer {id:?}",
            data.len(),
            buffer.size
        );
        assert!(
            buffer.update_frame != frame_index,
            "buffer {id:?} updated twice in frame {frame_index}"
        );

        buffer.update_frame = frame_index;
        buffer.active_slot = (buffer.active_slot + 1) % buffer.slots.len();
        let native = self.objects.get(buffer.active());
        self.driver.update_buffer(native, data);
    }

    /// Destroy a buffer. Its native buffers are released once no in-flight
    /// frame can reference them.
    pub fn destroy_buffer(&mut self, id: BufferId) {
        if self.buffers.state(id).is_none() {
            log::warn!("destroy_buffer called with stale handle {id:?}");
            return;
        }
        let frame_index = self.frame.frame_index();
        if let Some(buffer) = self.buffers.remove(id) {
            for slot in buffer.slots {
                self.objects.defer_release(frame_index, Some(slot));
            }
        }
        log::debug!("Destroyed buffer {id:?} in frame {frame_index}");
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Create a shader.
    ///
    /// Compilation failures leave the shader in [`ResourceState::Failed`].
    pub fn create_shader(&mut self, desc: &ShaderDescriptor) -> GraphicsResult<ShaderId> {
        let id = self.shaders.alloc()?;
        let objects = match desc.validate() {
            Ok(()) => self.driver.create_shader(desc),
            Err(msg) => Err(GraphicsError::InvalidParameter(msg)),
        };
        let shader = match objects {
            Ok(objects) => {
                let library = self.objects.add(objects.library);
                let stages = [objects.vertex, objects.fragment].map(|stage| ShaderStageObjects {
                    library: self.objects.add(stage.library),
                    function: self.objects.add(stage.function),
                });
                Some(Shader {
                    library,
                    stages,
                    entries: [desc.vertex.entry.clone(), desc.fragment.entry.clone()],
                    uniform_blocks: [
                        desc.vertex.uniform_blocks.clone(),
                        desc.fragment.uniform_blocks.clone(),
                    ],
                })
            }
            Err(err) => {
                log::warn!("Failed to create shader {:?}: {err}", desc.label);
                None
            }
        };
        let state = self.shaders.init(id, shader);
        log::debug!("Created shader {id:?} {:?} ({state:?})", desc.label);
        Ok(id)
    }

    pub fn destroy_shader(&mut self, id: ShaderId) {
        if self.shaders.state(id).is_none() {
            log::warn!("destroy_shader called with stale handle {id:?}");
            return;
        }
        let frame_index = self.frame.frame_index();
        if let Some(shader) = self.shaders.remove(id) {
            for slot in shader.native_slots() {
                self.objects.defer_release(frame_index, slot);
            }
        }
        log::debug!("Destroyed shader {id:?} in frame {frame_index}");
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    /// Create a render pipeline.
    ///
    /// An invalid shader or a driver failure leaves the pipeline in
    /// [`ResourceState::Failed`].
    pub fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> GraphicsResult<PipelineId> {
        let id = self.pipelines.alloc()?;
        let pipeline = match self.build_pipeline(desc) {
            Ok(pipeline) => Some(pipeline),
            Err(err) => {
                log::warn!("Failed to create pipeline {:?}: {err}", desc.label);
                None
            }
        };
        let state = self.pipelines.init(id, pipeline);
        log::debug!("Created pipeline {id:?} {:?} ({state:?})", desc.label);
        Ok(id)
    }

    fn build_pipeline(&mut self, desc: &PipelineDescriptor) -> GraphicsResult<Pipeline> {
        desc.validate().map_err(GraphicsError::InvalidParameter)?;
        let shader = self.shaders.get(desc.shader).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("shader {:?} is not valid", desc.shader))
        })?;
        let shader_ref = ShaderRef {
            vertex: stage_ref(&self.objects, shader, ShaderStage::Vertex)?,
            fragment: stage_ref(&self.objects, shader, ShaderStage::Fragment)?,
        };

        let natives = self
            .driver
            .create_pipeline(desc, shader_ref, &self.uniform_buffers)?;

        Ok(Pipeline {
            shader: desc.shader,
            primitive_type: desc.primitive_type,
            index_type: desc.index_type,
            vertex_buffer_count: desc.layout.buffers.len(),
            render_state: self.objects.insert(natives.render_state),
            depth_stencil_state: self.objects.add(natives.depth_stencil_state),
            blend_color: desc.blend.blend_color,
            stencil_ref: desc.depth_stencil.stencil_ref,
            cull_mode: desc.rasterizer.cull_mode,
            face_winding: desc.rasterizer.face_winding,
        })
    }

    pub fn destroy_pipeline(&mut self, id: PipelineId) {
        if self.pipelines.state(id).is_none() {
            log::warn!("destroy_pipeline called with stale handle {id:?}");
            return;
        }
        let frame_index = self.frame.frame_index();
        if let Some(pipeline) = self.pipelines.remove(id) {
            for slot in pipeline.native_slots() {
                self.objects.defer_release(frame_index, slot);
            }
        }
        log::debug!("Destroyed pipeline {id:?} in frame {frame_index}");
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Begin a pass on the target supplied by the surface provider.
    ///
    /// The first pass of a frame blocks until a frame slot is free. If the
    /// provider has no target, the pass is entered but encodes nothing.
    ///
    /// # Panics
    ///
    /// Panics if a pass is already open.
    pub fn begin_default_pass(&mut self, action: &PassAction, width: u32, height: u32) {
        assert!(!self.frame.in_pass(), "begin_pass called while a pass is open");
        self.ensure_frame_open();
        let target = self.surface.render_target();
        self.open_pass(target, action, width, height);
    }

    /// Begin a pass on a caller-supplied offscreen target.
    ///
    /// # Panics
    ///
    /// Panics if a pass is already open.
    pub fn begin_pass(&mut self, target: D::Target, action: &PassAction, width: u32, height: u32) {
        assert!(!self.frame.in_pass(), "begin_pass called while a pass is open");
        self.ensure_frame_open();
        self.open_pass(Some(target), action, width, height);
    }

    fn ensure_frame_open(&mut self) {
        assert!(!self.is_shut_down, "graphics backend used after shutdown");
        if self.frame.is_recording() {
            return;
        }

        {
            crate::profile_scope!("wait_for_frame_slot");
            let driver = &mut self.driver;
            self.pacer.acquire_with(|| driver.pump_completions());
        }

        let frame_index = self.frame.frame_index();
        let slot = self.frame.rotate_index();
        let command_buffer = self.driver.begin_command_buffer(frame_index);
        self.uniforms.begin_frame(slot);
        self.frame.open(command_buffer);
        log::trace!("Begin frame {frame_index} (slot {slot})");
    }

    fn open_pass(&mut self, target: Option<D::Target>, action: &PassAction, width: u32, height: u32) {
        crate::profile_scope!("begin_pass");
        let frame_index = self.frame.frame_index();
        let slot = self.frame.rotate_index();
        let encoder = match target {
            Some(target) => {
                let uniforms = UniformBinding {
                    buffer: &self.uniform_buffers[slot],
                    slot,
                };
                let command_buffer = self.frame.command_buffer_mut();
                let encoder = self
                    .driver
                    .begin_render_pass(command_buffer, target, action, uniforms);
                if encoder.is_none() {
                    log::debug!("No encoder for pass in frame {frame_index}, skipping its commands");
                }
                encoder
            }
            None => {
                log::debug!("Render target unavailable in frame {frame_index}, skipping pass");
                None
            }
        };
        self.frame.begin_pass(encoder, width, height);
    }

    /// Set the viewport of the current pass.
    ///
    /// With `origin_top_left == false`, `y` is measured from the bottom edge.
    pub fn apply_viewport(&mut self, x: i32, y: i32, width: u32, height: u32, origin_top_left: bool) {
        let (_, framebuffer_height) = self.frame.size();
        let Some(encoder) = self.frame.encoder_mut("apply_viewport") else {
            return;
        };
        let rect = viewport_rect(Rect::new(x, y, width, height), framebuffer_height, origin_top_left);
        self.driver.set_viewport(encoder, rect);
    }

    /// Set the scissor rectangle of the current pass, clipped to the framebuffer.
    pub fn apply_scissor_rect(&mut self, x: i32, y: i32, width: u32, height: u32, origin_top_left: bool) {
        let (framebuffer_width, framebuffer_height) = self.frame.size();
        let Some(encoder) = self.frame.encoder_mut("apply_scissor_rect") else {
            return;
        };
        let rect = scissor_rect(
            Rect::new(x, y, width, height),
            framebuffer_width,
            framebuffer_height,
            origin_top_left,
        );
        self.driver.set_scissor_rect(encoder, rect);
    }

    /// Bind a pipeline and its buffers for subsequent draws.
    ///
    /// # Panics
    ///
    /// Panics outside a pass, or in a valid pass if a handle is stale or the
    /// index buffer does not match the pipeline's index type.
    pub fn apply_draw_state(&mut self, state: &DrawState) {
        let previous_vertex_buffers = self.frame.bindings.vertex_buffer_count;
        let Some(encoder) = self.frame.encoder_mut("apply_draw_state") else {
            return;
        };

        let Some(pipeline) = self.pipelines.get(state.pipeline) else {
            panic!("apply_draw_state called with invalid pipeline {:?}", state.pipeline);
        };
        assert_eq!(
            pipeline.index_type != IndexType::None,
            state.index_buffer.is_some(),
            "index buffer must be bound exactly when the pipeline has an index type"
        );
        assert!(
            state.vertex_buffers.len() <= MAX_VERTEX_BUFFERS,
            "{} vertex buffers exceed the limit of {MAX_VERTEX_BUFFERS}",
            state.vertex_buffers.len()
        );
        if let Some(index_buffer) = state.index_buffer {
            let buffer = self.buffers.get(index_buffer);
            assert!(
                buffer.is_some_and(|buffer| buffer.buffer_type == BufferType::IndexBuffer),
                "{index_buffer:?} is not a valid index buffer"
            );
        }

        self.driver.apply_pipeline(
            encoder,
            PipelineRef {
                render_state: self.objects.get(pipeline.render_state),
                depth_stencil_state: self.objects.get_opt(pipeline.depth_stencil_state),
                cull_mode: pipeline.cull_mode,
                face_winding: pipeline.face_winding,
                blend_color: pipeline.blend_color,
                stencil_ref: pipeline.stencil_ref,
            },
        );

        for (slot, &id) in state.vertex_buffers.iter().enumerate() {
            let Some(buffer) = self
                .buffers
                .get(id)
                .filter(|buffer| buffer.buffer_type == BufferType::VertexBuffer)
            else {
                panic!("{id:?} is not a valid vertex buffer");
            };
            self.driver
                .set_vertex_buffer(encoder, slot, Some(self.objects.get(buffer.active())));
        }
        for slot in state.vertex_buffers.len()..previous_vertex_buffers {
            self.driver.set_vertex_buffer(encoder, slot, None);
        }

        self.frame.bindings = Bindings {
            pipeline: Some(state.pipeline),
            index_buffer: state.index_buffer,
            vertex_buffer_count: state.vertex_buffers.len(),
        };
    }

    /// Upload a uniform block for the bound pipeline's shader.
    ///
    /// # Panics
    ///
    /// Panics outside a pass, or in a valid pass if no pipeline is bound, the
    /// block is not declared, its size differs from the declaration, or the
    /// uniform buffer is full.
    pub fn apply_uniform_block(&mut self, stage: ShaderStage, index: usize, data: &[u8]) {
        let bound = self.frame.bindings.pipeline;
        let Some(encoder) = self.frame.encoder_mut("apply_uniform_block") else {
            return;
        };
        let Some(pipeline_id) = bound else {
            panic!("apply_uniform_block called before apply_draw_state");
        };
        let Some(pipeline) = self.pipelines.get(pipeline_id) else {
            panic!("pipeline {pipeline_id:?} destroyed while bound");
        };
        let Some(shader) = self.shaders.get(pipeline.shader) else {
            panic!("shader {:?} destroyed while bound", pipeline.shader);
        };
        let Some(expected) = shader.uniform_block_size(stage, index) else {
            panic!("{stage:?} uniform block {index} is not declared by the bound shader");
        };
        assert_eq!(
            data.len(),
            expected as usize,
            "{stage:?} uniform block {index} size mismatch"
        );

        let allocation = self.uniforms.push(data);
        self.driver.set_uniform_block(encoder, stage, index, allocation);
    }

    /// Upload a plain-old-data value as a uniform block.
    pub fn apply_uniforms<T: bytemuck::Pod>(&mut self, stage: ShaderStage, index: usize, value: &T) {
        self.apply_uniform_block(stage, index, bytemuck::bytes_of(value));
    }

    /// Draw with the bound draw state.
    ///
    /// Indexed pipelines read `num_elements` indices starting at
    /// `base_element`; others draw `num_elements` vertices starting there.
    pub fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        let bindings = self.frame.bindings;
        let Some(encoder) = self.frame.encoder_mut("draw") else {
            return;
        };
        let Some(pipeline_id) = bindings.pipeline else {
            panic!("draw called before apply_draw_state");
        };
        let Some(pipeline) = self.pipelines.get(pipeline_id) else {
            panic!("pipeline {pipeline_id:?} destroyed while bound");
        };

        let call = match pipeline.index_type {
            IndexType::None => DrawCall::Vertices {
                primitive_type: pipeline.primitive_type,
                first_vertex: base_element,
                vertex_count: num_elements,
                instance_count: num_instances,
            },
            index_type => {
                let index_buffer = bindings
                    .index_buffer
                    .and_then(|id| self.buffers.get(id))
                    .unwrap_or_else(|| panic!("index buffer destroyed while bound"));
                DrawCall::Indexed {
                    primitive_type: pipeline.primitive_type,
                    index_buffer: self.objects.get(index_buffer.active()),
                    index_type,
                    index_buffer_offset: u64::from(base_element) * index_type.size_bytes(),
                    index_count: num_elements,
                    instance_count: num_instances,
                }
            }
        };
        self.driver.draw(encoder, call);
    }

    /// End the current pass.
    ///
    /// # Panics
    ///
    /// Panics if no pass is open.
    pub fn end_pass(&mut self) {
        if let Some(encoder) = self.frame.end_pass() {
            let command_buffer = self.frame.command_buffer_mut();
            self.driver.end_render_pass(command_buffer, encoder);
        }
    }

    /// Submit the frame and move to the next one.
    ///
    /// Committing a frame in which no pass was begun still takes a frame slot
    /// and submits an empty command buffer.
    ///
    /// # Panics
    ///
    /// Panics if a pass is open.
    pub fn commit(&mut self) {
        assert!(!self.frame.in_pass(), "commit called while a pass is open");
        crate::profile_scope!("commit");
        self.ensure_frame_open();

        let frame_index = self.frame.frame_index();
        let slot = self.frame.rotate_index();

        let written = self.uniforms.written();
        if !written.is_empty() {
            self.driver
                .flush_uniforms(&self.uniform_buffers[slot], written);
        }
        crate::profile_plot!("uniform_bytes", written.len());

        let drawable = self.surface.drawable();
        if drawable.is_none() {
            log::debug!("No drawable for frame {frame_index}, submitting without present");
        }
        let command_buffer = self.frame.finish();
        self.driver
            .submit(command_buffer, drawable, self.pacer.signal_handle());

        self.objects.collect_garbage(frame_index);
        self.frame.advance();
        self.uniforms.begin_frame(self.frame.rotate_index());
        log::trace!("Committed frame {frame_index} (slot {slot})");
        crate::frame_mark!();
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Wait for every in-flight frame and release all native objects.
    ///
    /// Also run on drop. Any later frame operation panics.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;

        if self.frame.abandon() {
            log::warn!(
                "Discarding unsubmitted frame {} at shutdown",
                self.frame.frame_index()
            );
            self.pacer.release();
        }

        if std::thread::panicking() {
            log::error!("Skipping GPU drain while panicking");
        } else {
            let permits = self.pacer.permits();
            let driver = &mut self.driver;
            for _ in 0..permits {
                self.pacer.acquire_with(|| driver.pump_completions());
            }
            for _ in 0..permits {
                self.pacer.release();
            }
        }

        let released = self.objects.release_all();
        self.uniform_buffers.clear();
        log::info!(
            "GraphicsBackend on {} shut down ({released} native objects released)",
            self.driver.name()
        );
    }
}

impl<D: Driver> Drop for GraphicsBackend<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: Driver> fmt::Debug for GraphicsBackend<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsBackend")
            .field("driver", &self.driver.name())
            .field("frame_index", &self.frame.frame_index())
            .field("phase", &self.frame.phase())
            .field("objects", self.objects.pool())
            .field("pending_releases", &self.objects.pending_releases())
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

fn stage_ref<'a, O>(
    objects: &'a NativePool<O>,
    shader: &'a Shader,
    stage: ShaderStage,
) -> GraphicsResult<StageRef<'a, O>> {
    let library = shader.stage_library(stage).ok_or_else(|| {
        GraphicsError::InvalidParameter(format!("shader has no library for the {stage:?} stage"))
    })?;
    Ok(StageRef {
        library: objects.get(library),
        function: objects.get_opt(shader.stage_function(stage)),
        entry: shader.entry(stage),
        uniform_blocks: shader.uniform_blocks(stage),
    })
}

/// Convert a viewport to top-left origin.
fn viewport_rect(rect: Rect, framebuffer_height: u32, origin_top_left: bool) -> Rect {
    if origin_top_left {
        rect
    } else {
        Rect {
            y: framebuffer_height as i32 - (rect.y + rect.height as i32),
            ..rect
        }
    }
}

/// Clip a scissor rectangle to the framebuffer and convert it to top-left
/// origin. The result is at least 1x1.
fn scissor_rect(rect: Rect, framebuffer_width: u32, framebuffer_height: u32, origin_top_left: bool) -> Rect {
    let x = rect.x.clamp(0, framebuffer_width.saturating_sub(1) as i32);
    let y = rect.y.clamp(0, framebuffer_height.saturating_sub(1) as i32);
    let width = rect.width.min(framebuffer_width - x as u32).max(1);
    let height = rect.height.min(framebuffer_height - y as u32).max(1);
    let y = if origin_top_left {
        y
    } else {
        framebuffer_height as i32 - (y + height as i32)
    };
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_rect_flips_bottom_left_origin() {
        let rect = Rect::new(10, 20, 100, 50);
        assert_eq!(viewport_rect(rect, 600, true), rect);
        assert_eq!(viewport_rect(rect, 600, false), Rect::new(10, 530, 100, 50));
    }

    #[test]
    fn test_scissor_rect_inside_framebuffer() {
        let rect = Rect::new(10, 10, 100, 100);
        assert_eq!(scissor_rect(rect, 800, 600, true), rect);
        assert_eq!(scissor_rect(rect, 800, 600, false), Rect::new(10, 490, 100, 100));
    }

    #[test]
    fn test_scissor_rect_clipped_to_framebuffer() {
        let rect = Rect::new(-50, 550, 200, 200);
        assert_eq!(scissor_rect(rect, 800, 600, true), Rect::new(0, 550, 200, 50));
    }

    #[test]
    fn test_scissor_rect_minimum_size() {
        let rect = Rect::new(900, 700, 0, 0);
        assert_eq!(scissor_rect(rect, 800, 600, true), Rect::new(799, 599, 1, 1));
    }

    #[test]
    fn test_scissor_rect_empty_framebuffer() {
        let rect = Rect::new(5, 5, 10, 10);
        assert_eq!(scissor_rect(rect, 0, 0, true), Rect::new(0, 0, 1, 1));
    }
}

//! wgpu driver implementation.
//!
//! This driver uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, and WebGPU. The device and queue are created by the
//! application; the driver only records and submits.
//!
//! Uniform blocks map to dynamic-offset uniform bindings in bind group 0:
//! vertex block `i` at binding `i`, fragment block `j` at binding
//! `MAX_SHADERSTAGE_UBS + j`. Each pipeline owns one bind group per rotation
//! slot, pointing at that slot's uniform buffer.

pub(crate) mod conversion;

use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::time::Duration;

use wgpu::util::DeviceExt;

use super::{
    DrawCall, Driver, PipelineObjects, PipelineRef, ShaderObjects, ShaderRef, StageObjects,
    StageRef, UniformBinding,
};
use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{BufferDescriptor, BufferType, PipelineDescriptor, ShaderDescriptor, Usage};
use crate::sync::FrameSignal;
use crate::types::{Feature, MAX_SHADERSTAGE_UBS, PassAction, Rect, ShaderStage};
use crate::uniforms::RingAllocation;

use conversion::{
    convert_color, convert_color_targets, convert_depth_stencil_state, convert_index_format,
    convert_load_op, convert_primitive_state, convert_step_mode, convert_value_load_op,
    convert_vertex_format,
};

/// How long one completion pump blocks on the oldest submission.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Copy sizes must be multiples of this.
const COPY_ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

/// Native objects created by the wgpu driver.
#[derive(Debug)]
pub enum WgpuObject {
    Buffer(wgpu::Buffer),
    ShaderModule(wgpu::ShaderModule),
    RenderPipeline(WgpuPipeline),
}

/// A render pipeline with its per-slot uniform bind groups.
#[derive(Debug)]
pub struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
    vertex_blocks: usize,
    fragment_blocks: usize,
}

/// Attachments of a render pass.
#[derive(Debug, Clone)]
pub struct WgpuTarget {
    pub color: wgpu::TextureView,
    pub depth_stencil: Option<wgpu::TextureView>,
}

/// Command encoder of one frame.
#[derive(Debug)]
pub struct WgpuCommandBuffer {
    encoder: wgpu::CommandEncoder,
}

/// An open render pass and its uniform binding state.
#[derive(Debug)]
pub struct WgpuEncoder {
    pass: wgpu::RenderPass<'static>,
    uniform_slot: usize,
    bind_group: Option<wgpu::BindGroup>,
    /// Dynamic offsets in binding order: vertex blocks, then fragment blocks.
    offsets: [u32; 2 * MAX_SHADERSTAGE_UBS],
    vertex_blocks: usize,
    fragment_blocks: usize,
}

impl WgpuEncoder {
    fn bind_uniforms(&mut self) {
        if let Some(bind_group) = &self.bind_group {
            let count = self.vertex_blocks + self.fragment_blocks;
            self.pass.set_bind_group(0, bind_group, &self.offsets[..count]);
        }
    }
}

/// wgpu-based driver.
pub struct WgpuDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    in_flight: VecDeque<wgpu::SubmissionIndex>,
}

impl std::fmt::Debug for WgpuDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDriver")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl WgpuDriver {
    /// Create a driver on an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            in_flight: VecDeque::with_capacity(MAX_FRAMES_IN_FLIGHT + 1),
        }
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_module(&self, source: &str, label: Option<&str>) -> GraphicsResult<WgpuObject> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|message| message.message_type == wgpu::CompilationMessageType::Error)
            .map(|message| message.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(GraphicsError::ShaderCompilationFailed(errors.join("\n")));
        }

        Ok(WgpuObject::ShaderModule(module))
    }

    fn create_bind_group_layout(
        &self,
        label: Option<&str>,
        shader: &ShaderRef<'_, WgpuObject>,
    ) -> wgpu::BindGroupLayout {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = uniform_bindings(shader)
            .map(|(binding, stage, size)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: match stage {
                    ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
                    ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
                },
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(size)),
                },
                count: None,
            })
            .collect();

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label,
                entries: &entries,
            })
    }

    fn create_bind_group(
        &self,
        label: Option<&str>,
        layout: &wgpu::BindGroupLayout,
        shader: &ShaderRef<'_, WgpuObject>,
        uniform_buffer: &WgpuObject,
    ) -> GraphicsResult<wgpu::BindGroup> {
        let buffer = as_buffer(uniform_buffer)?;
        let entries: Vec<wgpu::BindGroupEntry<'_>> = uniform_bindings(shader)
            .map(|(binding, _, size)| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(u64::from(size)),
                }),
            })
            .collect();

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout,
            entries: &entries,
        }))
    }
}

/// Uniform bindings of a shader as `(binding, stage, size)`, in binding order.
fn uniform_bindings<'a>(
    shader: &'a ShaderRef<'_, WgpuObject>,
) -> impl Iterator<Item = (u32, ShaderStage, u32)> + 'a {
    ShaderStage::ALL.into_iter().flat_map(move |stage| {
        let base = (stage.index() * MAX_SHADERSTAGE_UBS) as u32;
        shader
            .stage(stage)
            .uniform_blocks
            .iter()
            .enumerate()
            .map(move |(index, &size)| (base + index as u32, stage, size))
    })
}

fn as_buffer(object: &WgpuObject) -> GraphicsResult<&wgpu::Buffer> {
    match object {
        WgpuObject::Buffer(buffer) => Ok(buffer),
        other => Err(GraphicsError::InvalidParameter(format!(
            "expected a buffer, got {other:?}"
        ))),
    }
}

fn as_module<'a>(stage: &StageRef<'a, WgpuObject>) -> GraphicsResult<&'a wgpu::ShaderModule> {
    match stage.library {
        WgpuObject::ShaderModule(module) => Ok(module),
        other => Err(GraphicsError::InvalidParameter(format!(
            "expected a shader module, got {other:?}"
        ))),
    }
}

/// Pad `data` to the copy alignment.
fn padded(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if data.len() % COPY_ALIGNMENT == 0 {
        std::borrow::Cow::Borrowed(data)
    } else {
        let mut bytes = data.to_vec();
        bytes.resize(data.len().next_multiple_of(COPY_ALIGNMENT), 0);
        std::borrow::Cow::Owned(bytes)
    }
}

impl Driver for WgpuDriver {
    type Object = WgpuObject;
    type CommandBuffer = WgpuCommandBuffer;
    type Encoder = WgpuEncoder;
    type Target = WgpuTarget;
    type Drawable = wgpu::SurfaceTexture;

    fn name(&self) -> &'static str {
        "wgpu Driver"
    }

    fn supports(&self, feature: Feature) -> bool {
        let features = self.device.features();
        match feature {
            Feature::Instancing
            | Feature::TextureFloat
            | Feature::TextureHalfFloat
            | Feature::OriginTopLeft
            | Feature::MsaaRenderTargets
            | Feature::PackedVertexFormat10_2
            | Feature::MultipleRenderTarget
            | Feature::ImageType3d
            | Feature::ImageTypeArray => true,
            Feature::OriginBottomLeft => false,
            Feature::TextureCompressionDxt => {
                features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC)
            }
            Feature::TextureCompressionEtc2 => {
                features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
            }
            Feature::TextureCompressionPvrtc | Feature::TextureCompressionAtc => false,
        }
    }

    fn create_uniform_buffer(&mut self, size: usize, slot: usize) -> GraphicsResult<WgpuObject> {
        let label = format!("Uniforms {slot}");
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size: size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuObject::Buffer(buffer))
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> GraphicsResult<WgpuObject> {
        let mut usage = match desc.buffer_type {
            BufferType::VertexBuffer => wgpu::BufferUsages::VERTEX,
            BufferType::IndexBuffer => wgpu::BufferUsages::INDEX,
        };
        if desc.usage != Usage::Immutable {
            usage |= wgpu::BufferUsages::COPY_DST;
        }

        let buffer = match desc.content {
            Some(content) => self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: desc.label,
                    contents: &padded(content),
                    usage,
                }),
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: desc.label,
                size: desc.size.next_multiple_of(COPY_ALIGNMENT) as u64,
                usage,
                mapped_at_creation: false,
            }),
        };
        Ok(WgpuObject::Buffer(buffer))
    }

    fn update_buffer(&mut self, buffer: &WgpuObject, data: &[u8]) {
        match as_buffer(buffer) {
            Ok(buffer) => self.queue.write_buffer(buffer, 0, &padded(data)),
            Err(err) => log::error!("update_buffer: {err}"),
        }
    }

    fn create_shader(&mut self, desc: &ShaderDescriptor) -> GraphicsResult<ShaderObjects<WgpuObject>> {
        let label = desc.label.as_deref();
        let library = desc
            .source
            .as_deref()
            .map(|source| self.create_module(source, label))
            .transpose()?;

        let mut objects = ShaderObjects {
            library,
            ..ShaderObjects::default()
        };
        for stage in ShaderStage::ALL {
            let stage_desc = desc.stage(stage);
            let stage_library = stage_desc
                .source
                .as_deref()
                .map(|source| self.create_module(source, label))
                .transpose()?;
            if stage_library.is_none() && objects.library.is_none() {
                return Err(GraphicsError::ShaderCompilationFailed(format!(
                    "{stage:?} stage has no source"
                )));
            }
            let stage_objects = StageObjects {
                library: stage_library,
                function: None,
            };
            match stage {
                ShaderStage::Vertex => objects.vertex = stage_objects,
                ShaderStage::Fragment => objects.fragment = stage_objects,
            }
        }

        log::debug!("wgpu: created shader {label:?}");
        Ok(objects)
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDescriptor,
        shader: ShaderRef<'_, WgpuObject>,
        uniform_buffers: &[WgpuObject],
    ) -> GraphicsResult<PipelineObjects<WgpuObject>> {
        let label = desc.label.as_deref();
        let vertex_module = as_module(&shader.vertex)?;
        let fragment_module = as_module(&shader.fragment)?;

        let bind_group_layout = self.create_bind_group_layout(label, &shader);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let mut attributes: Vec<Vec<wgpu::VertexAttribute>> =
            vec![Vec::new(); desc.layout.buffers.len()];
        for (location, attribute) in desc.layout.attributes.iter().enumerate() {
            attributes[attribute.buffer_index].push(wgpu::VertexAttribute {
                format: convert_vertex_format(attribute.format),
                offset: u64::from(attribute.offset),
                shader_location: location as u32,
            });
        }
        let vertex_buffer_layouts: Vec<wgpu::VertexBufferLayout<'_>> = desc
            .layout
            .buffers
            .iter()
            .zip(&attributes)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: u64::from(buffer.stride),
                step_mode: convert_step_mode(buffer.step),
                attributes,
            })
            .collect();

        let color_targets = convert_color_targets(&desc.blend);
        if color_targets.is_empty() {
            return Err(GraphicsError::PipelineCreationFailed(format!(
                "{:?} is not a color format",
                desc.blend.color_format
            )));
        }

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label,
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(shader.vertex.entry),
                    buffers: &vertex_buffer_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment_module,
                    entry_point: Some(shader.fragment.entry),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: convert_primitive_state(
                    desc.primitive_type,
                    desc.index_type,
                    &desc.rasterizer,
                ),
                depth_stencil: convert_depth_stencil_state(
                    &desc.depth_stencil,
                    desc.blend.depth_format,
                    &desc.rasterizer,
                ),
                multisample: wgpu::MultisampleState {
                    count: desc.rasterizer.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: desc.rasterizer.alpha_to_coverage_enabled,
                },
                multiview_mask: None,
                cache: None,
            });

        let bind_groups = uniform_buffers
            .iter()
            .map(|buffer| self.create_bind_group(label, &bind_group_layout, &shader, buffer))
            .collect::<GraphicsResult<Vec<_>>>()?;

        log::debug!("wgpu: created pipeline {label:?}");
        Ok(PipelineObjects {
            render_state: WgpuObject::RenderPipeline(WgpuPipeline {
                pipeline,
                bind_groups,
                vertex_blocks: shader.vertex.uniform_blocks.len(),
                fragment_blocks: shader.fragment.uniform_blocks.len(),
            }),
            depth_stencil_state: None,
        })
    }

    fn begin_command_buffer(&mut self, frame_index: u64) -> WgpuCommandBuffer {
        let label = format!("Frame {frame_index}");
        WgpuCommandBuffer {
            encoder: self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(&label),
                }),
        }
    }

    fn begin_render_pass(
        &mut self,
        cmd: &mut WgpuCommandBuffer,
        target: WgpuTarget,
        action: &PassAction,
        uniforms: UniformBinding<'_, WgpuObject>,
    ) -> Option<WgpuEncoder> {
        let color = &action.colors[0];
        let color_attachments = [Some(wgpu::RenderPassColorAttachment {
            view: &target.color,
            resolve_target: None,
            ops: wgpu::Operations {
                load: convert_load_op(color.action, color.value),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })];
        let depth_stencil_attachment =
            target
                .depth_stencil
                .as_ref()
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: convert_value_load_op(action.depth.action, action.depth.value),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: convert_value_load_op(
                            action.stencil.action,
                            u32::from(action.stencil.value),
                        ),
                        store: wgpu::StoreOp::Store,
                    }),
                });

        let pass = cmd
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();

        Some(WgpuEncoder {
            pass,
            uniform_slot: uniforms.slot,
            bind_group: None,
            offsets: [0; 2 * MAX_SHADERSTAGE_UBS],
            vertex_blocks: 0,
            fragment_blocks: 0,
        })
    }

    fn set_viewport(&mut self, encoder: &mut WgpuEncoder, rect: Rect) {
        encoder.pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
    }

    fn set_scissor_rect(&mut self, encoder: &mut WgpuEncoder, rect: Rect) {
        encoder
            .pass
            .set_scissor_rect(rect.x as u32, rect.y as u32, rect.width, rect.height);
    }

    fn apply_pipeline(&mut self, encoder: &mut WgpuEncoder, pipeline: PipelineRef<'_, WgpuObject>) {
        let WgpuObject::RenderPipeline(render_state) = pipeline.render_state else {
            log::error!("apply_pipeline: {:?} is not a pipeline", pipeline.render_state);
            return;
        };
        encoder.pass.set_pipeline(&render_state.pipeline);
        encoder
            .pass
            .set_blend_constant(convert_color(pipeline.blend_color));
        encoder
            .pass
            .set_stencil_reference(u32::from(pipeline.stencil_ref));

        encoder.bind_group = render_state.bind_groups.get(encoder.uniform_slot).cloned();
        encoder.vertex_blocks = render_state.vertex_blocks;
        encoder.fragment_blocks = render_state.fragment_blocks;
        encoder.offsets = [0; 2 * MAX_SHADERSTAGE_UBS];
        encoder.bind_uniforms();
    }

    fn set_vertex_buffer(&mut self, encoder: &mut WgpuEncoder, slot: usize, buffer: Option<&WgpuObject>) {
        // wgpu has no unbind; stale slots are unused by the new pipeline's layout
        if let Some(WgpuObject::Buffer(buffer)) = buffer {
            encoder.pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
    }

    fn set_uniform_block(
        &mut self,
        encoder: &mut WgpuEncoder,
        stage: ShaderStage,
        index: usize,
        allocation: RingAllocation,
    ) {
        let position = match stage {
            ShaderStage::Vertex => index,
            ShaderStage::Fragment => encoder.vertex_blocks + index,
        };
        encoder.offsets[position] = allocation.offset;
        encoder.bind_uniforms();
    }

    fn draw(&mut self, encoder: &mut WgpuEncoder, call: DrawCall<'_, WgpuObject>) {
        match call {
            DrawCall::Vertices {
                first_vertex,
                vertex_count,
                instance_count,
                ..
            } => {
                encoder
                    .pass
                    .draw(first_vertex..first_vertex + vertex_count, 0..instance_count);
            }
            DrawCall::Indexed {
                index_buffer,
                index_type,
                index_buffer_offset,
                index_count,
                instance_count,
                ..
            } => {
                let (Ok(buffer), Some(format)) =
                    (as_buffer(index_buffer), convert_index_format(index_type))
                else {
                    log::error!("draw: invalid index buffer binding");
                    return;
                };
                encoder
                    .pass
                    .set_index_buffer(buffer.slice(index_buffer_offset..), format);
                encoder.pass.draw_indexed(0..index_count, 0, 0..instance_count);
            }
        }
    }

    fn end_render_pass(&mut self, _cmd: &mut WgpuCommandBuffer, encoder: WgpuEncoder) {
        drop(encoder);
    }

    fn flush_uniforms(&mut self, buffer: &WgpuObject, data: &[u8]) {
        match as_buffer(buffer) {
            Ok(buffer) => self.queue.write_buffer(buffer, 0, &padded(data)),
            Err(err) => log::error!("flush_uniforms: {err}"),
        }
    }

    fn submit(
        &mut self,
        cmd: WgpuCommandBuffer,
        drawable: Option<wgpu::SurfaceTexture>,
        on_complete: FrameSignal,
    ) {
        let submission_index = self.queue.submit(std::iter::once(cmd.encoder.finish()));
        if let Some(drawable) = drawable {
            drawable.present();
        }
        self.queue
            .on_submitted_work_done(move || on_complete.signal());

        self.in_flight.push_back(submission_index);
        while self.in_flight.len() > MAX_FRAMES_IN_FLIGHT {
            self.in_flight.pop_front();
        }
    }

    fn pump_completions(&mut self) {
        let poll = match self.in_flight.pop_front() {
            Some(submission_index) => wgpu::PollType::Wait {
                submission_index: Some(submission_index),
                timeout: Some(POLL_TIMEOUT),
            },
            None => wgpu::PollType::Poll,
        };
        if let Err(err) = self.device.poll(poll) {
            log::warn!("wgpu: device poll failed: {err}");
        }
    }
}

impl Drop for WgpuDriver {
    fn drop(&mut self) {
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
    }
}

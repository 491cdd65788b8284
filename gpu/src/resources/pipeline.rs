//! Render pipelines and draw state.

use super::{BufferId, PipelineId, ShaderId};
use crate::pool::SlotIndex;
use crate::types::{
    BlendState, Color, CullMode, DepthStencilState, FaceWinding, IndexType, MAX_COLOR_ATTACHMENTS,
    MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS, PrimitiveType, RasterizerState, VertexLayout,
};

/// Descriptor for creating a render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub label: Option<String>,
    pub shader: ShaderId,
    pub primitive_type: PrimitiveType,
    pub index_type: IndexType,
    pub layout: VertexLayout,
    pub depth_stencil: DepthStencilState,
    pub blend: BlendState,
    pub rasterizer: RasterizerState,
}

impl PipelineDescriptor {
    /// Pipeline with default fixed-function state.
    pub fn new(shader: ShaderId, layout: VertexLayout) -> Self {
        Self {
            label: None,
            shader,
            primitive_type: PrimitiveType::default(),
            index_type: IndexType::default(),
            layout,
            depth_stencil: DepthStencilState::default(),
            blend: BlendState::default(),
            rasterizer: RasterizerState::default(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    pub fn with_primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.primitive_type = primitive_type;
        self
    }

    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let layout = &self.layout;
        if layout.buffers.len() > MAX_VERTEX_BUFFERS {
            return Err(format!(
                "{} vertex buffers exceed the limit of {MAX_VERTEX_BUFFERS}",
                layout.buffers.len()
            ));
        }
        if layout.attributes.len() > MAX_VERTEX_ATTRIBUTES {
            return Err(format!(
                "{} vertex attributes exceed the limit of {MAX_VERTEX_ATTRIBUTES}",
                layout.attributes.len()
            ));
        }
        for (location, attribute) in layout.attributes.iter().enumerate() {
            let Some(buffer) = layout.buffers.get(attribute.buffer_index) else {
                return Err(format!(
                    "attribute {location} reads vertex buffer {} which is not in the layout",
                    attribute.buffer_index
                ));
            };
            if attribute.offset + attribute.format.size() > buffer.stride {
                return Err(format!(
                    "attribute {location} ends past the stride {} of vertex buffer {}",
                    buffer.stride, attribute.buffer_index
                ));
            }
        }
        let colors = self.blend.color_attachment_count;
        if colors == 0 || colors > MAX_COLOR_ATTACHMENTS {
            return Err(format!("invalid color attachment count {colors}"));
        }
        Ok(())
    }
}

/// A logical render pipeline.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) shader: ShaderId,
    pub(crate) primitive_type: PrimitiveType,
    pub(crate) index_type: IndexType,
    pub(crate) vertex_buffer_count: usize,
    pub(crate) render_state: SlotIndex,
    pub(crate) depth_stencil_state: Option<SlotIndex>,
    pub(crate) blend_color: Color,
    pub(crate) stencil_ref: u8,
    pub(crate) cull_mode: CullMode,
    pub(crate) face_winding: FaceWinding,
}

impl Pipeline {
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    pub(crate) fn native_slots(&self) -> [Option<SlotIndex>; 2] {
        [Some(self.render_state), self.depth_stencil_state]
    }
}

/// Pipeline and buffers bound for subsequent draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawState {
    pub pipeline: PipelineId,
    pub vertex_buffers: Vec<BufferId>,
    pub index_buffer: Option<BufferId>,
}

impl DrawState {
    pub fn new(pipeline: PipelineId) -> Self {
        Self {
            pipeline,
            vertex_buffers: Vec::new(),
            index_buffer: None,
        }
    }

    /// Bind the next vertex buffer slot.
    pub fn with_vertex_buffer(mut self, buffer: BufferId) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    pub fn with_index_buffer(mut self, buffer: BufferId) -> Self {
        self.index_buffer = Some(buffer);
        self
    }
}

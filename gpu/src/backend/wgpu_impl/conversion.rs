//! Type conversions between RedLilium GPU types and wgpu types.

use crate::types::{
    Action, BlendFactor, BlendOp, BlendState, Color, ColorMask, CompareFunc, CullMode,
    DepthStencilState, FaceWinding, IndexType, PixelFormat, PrimitiveType, RasterizerState,
    StencilFaceState, StencilOp, VertexFormat, VertexStep,
};

/// Convert VertexFormat to wgpu vertex format.
pub fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float => wgpu::VertexFormat::Float32,
        VertexFormat::Float2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Byte4 => wgpu::VertexFormat::Sint8x4,
        VertexFormat::Byte4N => wgpu::VertexFormat::Snorm8x4,
        VertexFormat::UByte4 => wgpu::VertexFormat::Uint8x4,
        VertexFormat::UByte4N => wgpu::VertexFormat::Unorm8x4,
        VertexFormat::Short2 => wgpu::VertexFormat::Sint16x2,
        VertexFormat::Short2N => wgpu::VertexFormat::Snorm16x2,
        VertexFormat::Short4 => wgpu::VertexFormat::Sint16x4,
        VertexFormat::Short4N => wgpu::VertexFormat::Snorm16x4,
        VertexFormat::UInt10N2 => wgpu::VertexFormat::Unorm10_10_10_2,
    }
}

/// Convert VertexStep to wgpu vertex step mode.
pub fn convert_step_mode(step: VertexStep) -> wgpu::VertexStepMode {
    match step {
        VertexStep::PerVertex => wgpu::VertexStepMode::Vertex,
        VertexStep::PerInstance => wgpu::VertexStepMode::Instance,
    }
}

/// Convert PrimitiveType to wgpu primitive topology.
pub fn convert_topology(primitive_type: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive_type {
        PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Convert IndexType to wgpu index format. `None` for non-indexed drawing.
pub fn convert_index_format(index_type: IndexType) -> Option<wgpu::IndexFormat> {
    match index_type {
        IndexType::None => None,
        IndexType::Uint16 => Some(wgpu::IndexFormat::Uint16),
        IndexType::Uint32 => Some(wgpu::IndexFormat::Uint32),
    }
}

/// Build the primitive state of a pipeline.
pub fn convert_primitive_state(
    primitive_type: PrimitiveType,
    index_type: IndexType,
    rasterizer: &RasterizerState,
) -> wgpu::PrimitiveState {
    let is_strip = matches!(
        primitive_type,
        PrimitiveType::LineStrip | PrimitiveType::TriangleStrip
    );
    wgpu::PrimitiveState {
        topology: convert_topology(primitive_type),
        strip_index_format: if is_strip {
            convert_index_format(index_type)
        } else {
            None
        },
        front_face: convert_face_winding(rasterizer.face_winding),
        cull_mode: convert_cull_mode(rasterizer.cull_mode),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

pub fn convert_cull_mode(mode: CullMode) -> Option<wgpu::Face> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

pub fn convert_face_winding(winding: FaceWinding) -> wgpu::FrontFace {
    match winding {
        FaceWinding::Cw => wgpu::FrontFace::Cw,
        FaceWinding::Ccw => wgpu::FrontFace::Ccw,
    }
}

/// Convert CompareFunc to wgpu compare function.
pub fn convert_compare_function(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

pub fn convert_stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

fn convert_stencil_face(face: &StencilFaceState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: convert_compare_function(face.compare),
        fail_op: convert_stencil_op(face.fail_op),
        depth_fail_op: convert_stencil_op(face.depth_fail_op),
        pass_op: convert_stencil_op(face.pass_op),
    }
}

/// Build the depth-stencil state of a pipeline, `None` without a depth format.
pub fn convert_depth_stencil_state(
    state: &DepthStencilState,
    depth_format: PixelFormat,
    rasterizer: &RasterizerState,
) -> Option<wgpu::DepthStencilState> {
    let format = convert_depth_format(depth_format)?;
    let stencil = if state.stencil_enabled {
        wgpu::StencilState {
            front: convert_stencil_face(&state.stencil_front),
            back: convert_stencil_face(&state.stencil_back),
            read_mask: u32::from(state.stencil_read_mask),
            write_mask: u32::from(state.stencil_write_mask),
        }
    } else {
        wgpu::StencilState::default()
    };
    Some(wgpu::DepthStencilState {
        format,
        depth_write_enabled: state.depth_write_enabled,
        depth_compare: convert_compare_function(state.depth_compare),
        stencil,
        bias: wgpu::DepthBiasState {
            constant: rasterizer.depth_bias as i32,
            slope_scale: rasterizer.depth_bias_slope_scale,
            clamp: rasterizer.depth_bias_clamp,
        },
    })
}

/// Convert a color PixelFormat to a wgpu texture format.
pub fn convert_color_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    match format {
        PixelFormat::Rgba8 => Some(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::Bgra8 => Some(wgpu::TextureFormat::Bgra8Unorm),
        PixelFormat::Rgba16F => Some(wgpu::TextureFormat::Rgba16Float),
        PixelFormat::Rgba32F => Some(wgpu::TextureFormat::Rgba32Float),
        PixelFormat::None | PixelFormat::Depth | PixelFormat::DepthStencil => None,
    }
}

/// Convert a depth PixelFormat to a wgpu texture format.
pub fn convert_depth_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    match format {
        PixelFormat::Depth => Some(wgpu::TextureFormat::Depth32Float),
        PixelFormat::DepthStencil => Some(wgpu::TextureFormat::Depth24PlusStencil8),
        _ => None,
    }
}

pub fn convert_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::BlendColor => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusBlendColor => wgpu::BlendFactor::OneMinusConstant,
    }
}

pub fn convert_blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
    }
}

pub fn convert_color_writes(mask: ColorMask) -> wgpu::ColorWrites {
    let mut result = wgpu::ColorWrites::empty();

    if mask.contains(ColorMask::R) {
        result |= wgpu::ColorWrites::RED;
    }
    if mask.contains(ColorMask::G) {
        result |= wgpu::ColorWrites::GREEN;
    }
    if mask.contains(ColorMask::B) {
        result |= wgpu::ColorWrites::BLUE;
    }
    if mask.contains(ColorMask::A) {
        result |= wgpu::ColorWrites::ALPHA;
    }

    result
}

/// Build one color target state per color attachment.
pub fn convert_color_targets(blend: &BlendState) -> Vec<Option<wgpu::ColorTargetState>> {
    let Some(format) = convert_color_format(blend.color_format) else {
        return Vec::new();
    };
    let blend_state = blend.enabled.then(|| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: convert_blend_factor(blend.src_factor_rgb),
            dst_factor: convert_blend_factor(blend.dst_factor_rgb),
            operation: convert_blend_op(blend.op_rgb),
        },
        alpha: wgpu::BlendComponent {
            src_factor: convert_blend_factor(blend.src_factor_alpha),
            dst_factor: convert_blend_factor(blend.dst_factor_alpha),
            operation: convert_blend_op(blend.op_alpha),
        },
    });
    let target = wgpu::ColorTargetState {
        format,
        blend: blend_state,
        write_mask: convert_color_writes(blend.color_write_mask),
    };
    vec![Some(target); blend.color_attachment_count]
}

pub fn convert_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: color.a as f64,
    }
}

/// Convert a pass color action to a wgpu load op.
pub fn convert_load_op(action: Action, clear: Color) -> wgpu::LoadOp<wgpu::Color> {
    match action {
        Action::Clear => wgpu::LoadOp::Clear(convert_color(clear)),
        Action::Load => wgpu::LoadOp::Load,
        Action::DontCare => wgpu::LoadOp::Load, // wgpu doesn't have DontCare for color
    }
}

/// Convert a pass depth or stencil action to a wgpu load op.
pub fn convert_value_load_op<V>(action: Action, clear: V) -> wgpu::LoadOp<V> {
    match action {
        Action::Clear => wgpu::LoadOp::Clear(clear),
        Action::Load | Action::DontCare => wgpu::LoadOp::Load,
    }
}

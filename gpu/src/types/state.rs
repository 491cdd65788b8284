//! Fixed-function pipeline state.

use bitflags::bitflags;

use super::common::Color;

// ============================================================================
// Vertex Input
// ============================================================================

/// Format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Byte4,
    Byte4N,
    UByte4,
    UByte4N,
    Short2,
    Short2N,
    Short4,
    Short4N,
    UInt10N2,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float => 4,
            VertexFormat::Float2 => 8,
            VertexFormat::Float3 => 12,
            VertexFormat::Float4 => 16,
            VertexFormat::Byte4
            | VertexFormat::Byte4N
            | VertexFormat::UByte4
            | VertexFormat::UByte4N
            | VertexFormat::Short2
            | VertexFormat::Short2N
            | VertexFormat::UInt10N2 => 4,
            VertexFormat::Short4 | VertexFormat::Short4N => 8,
        }
    }
}

/// Rate at which a vertex buffer advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStep {
    #[default]
    PerVertex,
    PerInstance,
}

/// Stride and step rate of one vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub step: VertexStep,
    pub step_rate: u32,
}

impl VertexBufferLayout {
    pub fn new(stride: u32) -> Self {
        Self {
            stride,
            step: VertexStep::PerVertex,
            step_rate: 1,
        }
    }

    pub fn per_instance(mut self) -> Self {
        self.step = VertexStep::PerInstance;
        self
    }
}

/// A vertex attribute. The shader location is its position in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub buffer_index: usize,
    pub offset: u32,
    pub format: VertexFormat,
}

/// Vertex input layout of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    pub buffers: Vec<VertexBufferLayout>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer slot.
    pub fn with_buffer(mut self, layout: VertexBufferLayout) -> Self {
        self.buffers.push(layout);
        self
    }

    /// Add an attribute sourced from `buffer_index`.
    pub fn with_attribute(mut self, buffer_index: usize, offset: u32, format: VertexFormat) -> Self {
        self.attributes.push(VertexAttribute {
            buffer_index,
            offset,
            format,
        });
        self
    }
}

// ============================================================================
// Depth / Stencil
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilFaceState {
    pub compare: CompareFunc,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_compare: CompareFunc,
    pub depth_write_enabled: bool,
    pub stencil_enabled: bool,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    /// Reference value, applied when the pipeline is bound.
    pub stencil_ref: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_compare: CompareFunc::Always,
            depth_write_enabled: false,
            stencil_enabled: false,
            stencil_front: StencilFaceState::default(),
            stencil_back: StencilFaceState::default(),
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            stencil_ref: 0,
        }
    }
}

// ============================================================================
// Blending
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    BlendColor,
    OneMinusBlendColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
}

bitflags! {
    /// Color channels written by a pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGB = Self::R.bits() | Self::G.bits() | Self::B.bits();
        const ALL = Self::RGB.bits() | Self::A.bits();
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Pixel formats of render targets a pipeline can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    None,
    Rgba8,
    Bgra8,
    Rgba16F,
    Rgba32F,
    Depth,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub src_factor_rgb: BlendFactor,
    pub dst_factor_rgb: BlendFactor,
    pub op_rgb: BlendOp,
    pub src_factor_alpha: BlendFactor,
    pub dst_factor_alpha: BlendFactor,
    pub op_alpha: BlendOp,
    pub color_write_mask: ColorMask,
    pub color_attachment_count: usize,
    pub color_format: PixelFormat,
    pub depth_format: PixelFormat,
    /// Constant blend color, applied when the pipeline is bound.
    pub blend_color: Color,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_factor_rgb: BlendFactor::One,
            dst_factor_rgb: BlendFactor::Zero,
            op_rgb: BlendOp::Add,
            src_factor_alpha: BlendFactor::One,
            dst_factor_alpha: BlendFactor::Zero,
            op_alpha: BlendOp::Add,
            color_write_mask: ColorMask::ALL,
            color_attachment_count: 1,
            color_format: PixelFormat::Bgra8,
            depth_format: PixelFormat::DepthStencil,
            blend_color: Color::TRANSPARENT,
        }
    }
}

impl BlendState {
    /// Non-premultiplied alpha blending.
    pub fn alpha_blending() -> Self {
        Self {
            enabled: true,
            src_factor_rgb: BlendFactor::SrcAlpha,
            dst_factor_rgb: BlendFactor::OneMinusSrcAlpha,
            src_factor_alpha: BlendFactor::One,
            dst_factor_alpha: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceWinding {
    #[default]
    Cw,
    Ccw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub alpha_to_coverage_enabled: bool,
    pub cull_mode: CullMode,
    pub face_winding: FaceWinding,
    pub sample_count: u32,
    pub depth_bias: f32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            alpha_to_coverage_enabled: false,
            cull_mode: CullMode::None,
            face_winding: FaceWinding::Cw,
            sample_count: 1,
            depth_bias: 0.0,
            depth_bias_slope_scale: 0.0,
            depth_bias_clamp: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_mask_default_is_all() {
        assert_eq!(ColorMask::default(), ColorMask::R | ColorMask::G | ColorMask::B | ColorMask::A);
    }

    #[test]
    fn test_vertex_format_sizes() {
        assert_eq!(VertexFormat::Float3.size(), 12);
        assert_eq!(VertexFormat::UByte4N.size(), 4);
        assert_eq!(VertexFormat::Short4N.size(), 8);
    }

    #[test]
    fn test_vertex_layout_builder() {
        let layout = VertexLayout::new()
            .with_buffer(VertexBufferLayout::new(20))
            .with_attribute(0, 0, VertexFormat::Float3)
            .with_attribute(0, 12, VertexFormat::Float2);
        assert_eq!(layout.buffers.len(), 1);
        assert_eq!(layout.attributes[1].offset, 12);
    }
}

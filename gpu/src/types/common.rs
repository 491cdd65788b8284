//! Common types: limits, colors, stages and draw primitives.

/// Maximum uniform blocks per shader stage.
pub const MAX_SHADERSTAGE_UBS: usize = 4;

/// Maximum vertex buffers bound by one draw state.
pub const MAX_VERTEX_BUFFERS: usize = 8;

/// Maximum vertex attributes in a pipeline's vertex layout.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Maximum color attachments of a render pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// RGBA color with `f32` components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// Programmable shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Both stages, in pipeline order.
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Position of the stage in per-stage arrays.
    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        }
    }
}

/// Index element type of a pipeline. `None` selects non-indexed drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    #[default]
    None,
    Uint16,
    Uint32,
}

impl IndexType {
    /// Size of one index in bytes (0 for non-indexed).
    pub fn size_bytes(self) -> u64 {
        match self {
            IndexType::None => 0,
            IndexType::Uint16 => 2,
            IndexType::Uint32 => 4,
        }
    }
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// Integer rectangle in framebuffer pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Optional capabilities a driver may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Instancing,
    TextureCompressionDxt,
    TextureCompressionPvrtc,
    TextureCompressionAtc,
    TextureCompressionEtc2,
    TextureFloat,
    TextureHalfFloat,
    OriginBottomLeft,
    OriginTopLeft,
    MsaaRenderTargets,
    PackedVertexFormat10_2,
    MultipleRenderTarget,
    ImageType3d,
    ImageTypeArray,
}

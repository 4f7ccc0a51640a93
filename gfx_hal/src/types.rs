//! Plain data types shared by the command surface and the [`Backend`].
//!
//! [`Backend`]: crate::backend::Backend

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawPrimitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
}

/// How often the contents of a buffer are written and read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferMemoryProfile {
    /// The data is rarely written and rarely used.
    RareWriteRareRead,
    /// The data is rarely written and often used.
    RareWriteOftenRead,
    /// The data is often written and often used.
    OftenWriteOftenRead,
}

/// The direction in which buffer data flows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferAccessProfile {
    /// The application writes data read by the GPU.
    CpuToGpu,
    /// The GPU writes data read by the application.
    GpuToCpu,
    /// Data is only accessed by the GPU.
    GpuToGpu,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    Vec2I32,
    Vec3I32,
    Vec4I32,
    Float32,
    Vec2F32,
    Vec3F32,
    Vec4F32,
}

impl DataType {
    /// Returns the size of the type in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Vec2I32 | Self::Vec2F32 => 8,
            Self::Vec3I32 | Self::Vec3F32 => 12,
            Self::Vec4I32 | Self::Vec4F32 => 16,
        }
    }

    /// Returns the number of scalar components.
    pub const fn components(self) -> usize {
        self.size() / 4
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Vertex,
    Pixel,
    Geometry,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureType {
    Texture1d,
    Texture2d,
    Texture3d,
    Cubemap,
    Texture1dArray,
    Texture2dArray,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFiltering {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureWrapping {
    Repeat,
    MirrorRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Channel layout of pixel data uploaded to a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureSourceFormat {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl TextureSourceFormat {
    pub const fn channels(self) -> usize {
        match self {
            Self::R => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Storage format of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureSizedFormat {
    R8,
    R16,
    Rg8,
    Rg16,
    R3G3B2,
    Rgb4,
    Rgb5,
    Rgb8,
    Rgb10,
    Rgb12,
    Rgba2,
    Rgba4,
    Rgba8,
    Rgba12,
    Rgba16,
    Rgba32F,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullingMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonFill {
    #[default]
    Shape,
    Edges,
    Vertices,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// A rectangle described by its lower-left point `a` and its upper-right point `b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub ax: i32,
    pub ay: i32,
    pub bx: i32,
    pub by: i32,
}

impl Rectangle {
    pub const fn new(ax: i32, ay: i32, bx: i32, by: i32) -> Self {
        Self { ax, ay, bx, by }
    }

    pub const fn width(&self) -> i32 {
        self.bx - self.ax
    }

    pub const fn height(&self) -> i32 {
        self.by - self.ay
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Self::new(0, 0, 400, 400)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttributeConfig {
    /// The vertex buffer binding slot the attribute is sourced from.
    pub binding: usize,
    /// The shader input location.
    pub location: u32,
    pub ty: DataType,
    pub stride: usize,
    pub offset: usize,
    /// Advance the attribute once per instance instead of once per vertex.
    pub per_instance: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RasterizationConfig {
    pub enable_culling: bool,
    pub polygon_fill: PolygonFill,
    pub culling_mode: CullingMode,
    pub front_face: FrontFace,
    pub line_width: f32,
}

impl Default for RasterizationConfig {
    fn default() -> Self {
        Self {
            enable_culling: false,
            polygon_fill: PolygonFill::Shape,
            culling_mode: CullingMode::None,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DepthStencilConfig {
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
    pub depth_compare: DepthCompare,
}

/// Values a [`clear`] command writes into the bound frame buffer. `None` leaves the
/// attachment untouched.
///
/// [`clear`]: crate::Commands::clear
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClearValues {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

/// The kind of resource expected at a binding of a resources descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorBindingType {
    UniformBuffer,
    StorageBuffer,
    SampledTexture,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameBufferAttachment {
    Color(usize),
    Depth,
    Stencil,
}

/// Parameters of a non-indexed draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DrawVertices {
    pub vertex_count: usize,
    pub first_vertex: usize,
    pub instance_count: usize,
    pub first_instance: usize,
}

/// Parameters of an indexed draw. Indices are `u32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DrawIndexed {
    pub index_count: usize,
    /// Index of the first index read from the index buffer.
    pub first_index: usize,
    /// Value added to every index before fetching vertices.
    pub base_vertex: i32,
    pub instance_count: usize,
    pub first_instance: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub ty: TextureType,
    pub mip_levels: usize,
    pub format: TextureSizedFormat,
    pub size: [usize; 3],
}

#[cfg(test)]
mod tests {
    use super::{DataType, Rectangle};

    #[test]
    fn data_type_sizes() {
        assert_eq!(DataType::Float32.size(), 4);
        assert_eq!(DataType::Vec3F32.size(), 12);
        assert_eq!(DataType::Vec4I32.components(), 4);
    }

    #[test]
    fn rectangle_extent() {
        let rect = Rectangle::new(10, 20, 110, 70);
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 50);
        assert_eq!(Rectangle::default(), Rectangle::new(0, 0, 400, 400));
    }
}

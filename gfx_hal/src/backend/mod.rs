//! The graphics API driven by the engine thread.
//!
//! A [`Backend`] is created on the engine thread and never leaves it. All methods are called
//! from engine tasks only, so implementations need not be `Send` or `Sync`.

pub mod headless;

use crate::types::{
    BufferAccessProfile, BufferMemoryProfile, ClearValues, CullingMode, DepthCompare,
    DrawIndexed, DrawPrimitive, DrawVertices, FrameBufferAttachment, FrontFace, PolygonFill,
    Rectangle, ShaderType, TextureDescriptor, TextureFiltering, TextureSourceFormat,
    TextureWrapping, VertexAttributeConfig,
};

/// Identifier of an object created by a [`Backend`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl nohash_hasher::IsEnabled for ObjectId {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_color_attachments: usize,
    pub shading_language: &'static str,
}

/// A resource bound to a shader location before a draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundResource {
    UniformBuffer(ObjectId),
    StorageBuffer(ObjectId),
    SampledTexture { texture: ObjectId, sampler: ObjectId },
}

/// A region written by [`Backend::write_texture`].
#[derive(Copy, Clone, Debug)]
pub struct TextureWrite<'a> {
    pub mip_level: usize,
    pub format: TextureSourceFormat,
    pub offset: [usize; 3],
    pub size: [usize; 3],
    pub data: &'a [u8],
}

pub trait Backend: 'static {
    fn limits(&self) -> Limits;

    fn create_buffer(&mut self) -> ObjectId;
    fn delete_buffer(&mut self, buffer: ObjectId);
    /// (Re)allocates the storage of `buffer`. Previous contents are discarded.
    fn allocate_buffer(
        &mut self,
        buffer: ObjectId,
        size: usize,
        memory: BufferMemoryProfile,
        access: BufferAccessProfile,
    );
    fn write_buffer(&mut self, buffer: ObjectId, offset: usize, data: &[u8]);
    fn copy_buffer(
        &mut self,
        src: ObjectId,
        dst: ObjectId,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );
    fn read_buffer(&mut self, buffer: ObjectId, offset: usize, len: usize) -> Vec<u8>;

    fn create_texture(&mut self) -> ObjectId;
    fn delete_texture(&mut self, texture: ObjectId);
    fn allocate_texture(&mut self, texture: ObjectId, descriptor: &TextureDescriptor);
    fn write_texture(&mut self, texture: ObjectId, write: &TextureWrite<'_>);

    fn create_sampler(&mut self) -> ObjectId;
    fn delete_sampler(&mut self, sampler: ObjectId);
    fn set_sampler_wrapping(&mut self, sampler: ObjectId, wrapping: [TextureWrapping; 3]);
    fn set_sampler_filtering(
        &mut self,
        sampler: ObjectId,
        magnifying: TextureFiltering,
        minifying: TextureFiltering,
        mipmap: TextureFiltering,
    );

    fn create_shader(&mut self, ty: ShaderType) -> ObjectId;
    fn delete_shader(&mut self, shader: ObjectId);
    /// Compiles `source` into `shader`, returning the compiler log on failure.
    fn compile_shader(&mut self, shader: ObjectId, source: &str) -> Result<(), String>;
    /// Resolves a named binding of a compiled shader to its location.
    fn shader_binding_location(&mut self, shader: ObjectId, name: &str) -> Option<u32>;

    /// Links compiled shader stages into a program, returning the linker log on failure.
    fn link_program(&mut self, stages: &[ObjectId]) -> Result<ObjectId, String>;
    fn delete_program(&mut self, program: ObjectId);
    fn bind_program(&mut self, program: ObjectId);

    fn create_frame_buffer(&mut self) -> ObjectId;
    fn delete_frame_buffer(&mut self, frame_buffer: ObjectId);
    /// Attaches `texture` to `frame_buffer`, or detaches the attachment if `texture` is `None`.
    fn attach_texture(
        &mut self,
        frame_buffer: ObjectId,
        attachment: FrameBufferAttachment,
        texture: Option<ObjectId>,
    );
    /// Binds `frame_buffer` as the render target. `None` binds the default frame buffer.
    fn bind_frame_buffer(&mut self, frame_buffer: Option<ObjectId>);

    /// Sets the vertex layout and the vertex buffers of all binding slots.
    fn bind_vertex_buffers(
        &mut self,
        attributes: &[VertexAttributeConfig],
        buffers: &[Option<ObjectId>],
    );
    fn bind_index_buffer(&mut self, buffer: Option<ObjectId>);

    fn set_culling_enabled(&mut self, enabled: bool);
    fn set_polygon_fill(&mut self, fill: PolygonFill);
    fn set_culling_mode(&mut self, mode: CullingMode);
    fn set_front_face(&mut self, front_face: FrontFace);
    fn set_line_width(&mut self, width: f32);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_depth_compare(&mut self, compare: DepthCompare);

    /// Binds `resource` to texture/buffer `unit` and points `location` of `shader` at it.
    fn bind_resource(&mut self, shader: ObjectId, location: u32, unit: u32, resource: BoundResource);

    fn set_viewport(&mut self, rect: Rectangle);
    fn set_scissors(&mut self, rect: Rectangle);
    fn clear(&mut self, values: &ClearValues);

    fn draw_arrays(&mut self, primitive: DrawPrimitive, draw: DrawVertices);
    fn draw_elements(&mut self, primitive: DrawPrimitive, draw: DrawIndexed);
}

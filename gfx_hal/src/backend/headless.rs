//! An in-memory [`Backend`] without a GPU.
//!
//! Buffers are backed by host memory, shaders are "compiled" by checking for an entry point
//! and programs by checking their stages. Every call can optionally be recorded into a
//! [`CallLog`].

use std::collections::HashMap;
use std::sync::Arc;

use nohash_hasher::IntMap;
use parking_lot::Mutex;

use super::{Backend, BoundResource, Limits, ObjectId, TextureWrite};
use crate::types::{
    BufferAccessProfile, BufferMemoryProfile, ClearValues, CullingMode, DepthCompare,
    DrawIndexed, DrawPrimitive, DrawVertices, FrameBufferAttachment, FrontFace, PolygonFill,
    Rectangle, ShaderType, TextureDescriptor, TextureFiltering, TextureSourceFormat,
    TextureWrapping, VertexAttributeConfig,
};

const LIMITS: Limits = Limits {
    max_color_attachments: 8,
    shading_language: "GLSL",
};

/// A call made on a [`HeadlessBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    CreateBuffer(ObjectId),
    DeleteBuffer(ObjectId),
    AllocateBuffer {
        buffer: ObjectId,
        size: usize,
        memory: BufferMemoryProfile,
        access: BufferAccessProfile,
    },
    WriteBuffer {
        buffer: ObjectId,
        offset: usize,
        len: usize,
    },
    CopyBuffer {
        src: ObjectId,
        dst: ObjectId,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    },
    ReadBuffer {
        buffer: ObjectId,
        offset: usize,
        len: usize,
    },
    CreateTexture(ObjectId),
    DeleteTexture(ObjectId),
    AllocateTexture(ObjectId, TextureDescriptor),
    WriteTexture {
        texture: ObjectId,
        mip_level: usize,
        format: TextureSourceFormat,
        offset: [usize; 3],
        size: [usize; 3],
    },
    CreateSampler(ObjectId),
    DeleteSampler(ObjectId),
    SetSamplerWrapping(ObjectId, [TextureWrapping; 3]),
    SetSamplerFiltering(ObjectId, [TextureFiltering; 3]),
    CreateShader(ObjectId, ShaderType),
    DeleteShader(ObjectId),
    CompileShader(ObjectId),
    LinkProgram(ObjectId, Vec<ObjectId>),
    DeleteProgram(ObjectId),
    BindProgram(ObjectId),
    CreateFrameBuffer(ObjectId),
    DeleteFrameBuffer(ObjectId),
    AttachTexture(ObjectId, FrameBufferAttachment, Option<ObjectId>),
    BindFrameBuffer(Option<ObjectId>),
    BindVertexBuffers(Vec<VertexAttributeConfig>, Vec<Option<ObjectId>>),
    BindIndexBuffer(Option<ObjectId>),
    SetCullingEnabled(bool),
    SetPolygonFill(PolygonFill),
    SetCullingMode(CullingMode),
    SetFrontFace(FrontFace),
    SetLineWidth(f32),
    SetDepthTest(bool),
    SetDepthWrite(bool),
    SetDepthCompare(DepthCompare),
    BindResource {
        shader: ObjectId,
        location: u32,
        unit: u32,
        resource: BoundResource,
    },
    SetViewport(Rectangle),
    SetScissors(Rectangle),
    Clear(ClearValues),
    DrawArrays(DrawPrimitive, DrawVertices),
    DrawElements(DrawPrimitive, DrawIndexed),
}

/// A shared, cloneable record of [`BackendCall`]s.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    /// Removes and returns all recorded calls.
    pub fn take(&self) -> Vec<BackendCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn snapshot(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[derive(Debug)]
struct Shader {
    ty: ShaderType,
    source: Option<String>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    log: Option<CallLog>,
    buffers: IntMap<ObjectId, Vec<u8>>,
    textures: IntMap<ObjectId, Option<TextureDescriptor>>,
    samplers: IntMap<ObjectId, ()>,
    shaders: IntMap<ObjectId, Shader>,
    programs: IntMap<ObjectId, Vec<ObjectId>>,
    frame_buffers: IntMap<ObjectId, HashMap<FrameBufferAttachment, ObjectId>>,
    bound_program: Option<ObjectId>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that records every call into `log`.
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Default::default()
        }
    }

    /// Returns the number of live backend objects of all kinds.
    pub fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.shaders.len()
            + self.programs.len()
            + self.frame_buffers.len()
    }

    pub fn bound_program(&self) -> Option<ObjectId> {
        self.bound_program
    }

    fn record(&self, call: BackendCall) {
        if let Some(log) = &self.log {
            log.push(call);
        }
    }

    fn alloc_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    fn buffer_mut(&mut self, buffer: ObjectId) -> Option<&mut Vec<u8>> {
        let storage = self.buffers.get_mut(&buffer);
        if storage.is_none() {
            tracing::warn!("access to unknown buffer {:?}", buffer);
        }
        storage
    }
}

impl Backend for HeadlessBackend {
    fn limits(&self) -> Limits {
        LIMITS
    }

    fn create_buffer(&mut self) -> ObjectId {
        let id = self.alloc_id();
        self.buffers.insert(id, Vec::new());
        self.record(BackendCall::CreateBuffer(id));
        id
    }

    fn delete_buffer(&mut self, buffer: ObjectId) {
        self.buffers.remove(&buffer);
        self.record(BackendCall::DeleteBuffer(buffer));
    }

    fn allocate_buffer(
        &mut self,
        buffer: ObjectId,
        size: usize,
        memory: BufferMemoryProfile,
        access: BufferAccessProfile,
    ) {
        if let Some(storage) = self.buffer_mut(buffer) {
            *storage = vec![0; size];
        }

        self.record(BackendCall::AllocateBuffer {
            buffer,
            size,
            memory,
            access,
        });
    }

    fn write_buffer(&mut self, buffer: ObjectId, offset: usize, data: &[u8]) {
        if let Some(storage) = self.buffer_mut(buffer) {
            let end = usize::min(offset.saturating_add(data.len()), storage.len());
            if end - usize::min(offset, end) != data.len() {
                tracing::warn!("write to {:?} out of bounds, truncating", buffer);
            }

            if offset < end {
                storage[offset..end].copy_from_slice(&data[..end - offset]);
            }
        }

        self.record(BackendCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn copy_buffer(
        &mut self,
        src: ObjectId,
        dst: ObjectId,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        let data = self.read_buffer_unlogged(src, read_offset, size);
        if let Some(storage) = self.buffer_mut(dst) {
            let end = usize::min(write_offset.saturating_add(data.len()), storage.len());
            if write_offset < end {
                storage[write_offset..end].copy_from_slice(&data[..end - write_offset]);
            }
        }

        self.record(BackendCall::CopyBuffer {
            src,
            dst,
            read_offset,
            write_offset,
            size,
        });
    }

    fn read_buffer(&mut self, buffer: ObjectId, offset: usize, len: usize) -> Vec<u8> {
        self.record(BackendCall::ReadBuffer {
            buffer,
            offset,
            len,
        });
        self.read_buffer_unlogged(buffer, offset, len)
    }

    fn create_texture(&mut self) -> ObjectId {
        let id = self.alloc_id();
        self.textures.insert(id, None);
        self.record(BackendCall::CreateTexture(id));
        id
    }

    fn delete_texture(&mut self, texture: ObjectId) {
        self.textures.remove(&texture);
        self.record(BackendCall::DeleteTexture(texture));
    }

    fn allocate_texture(&mut self, texture: ObjectId, descriptor: &TextureDescriptor) {
        match self.textures.get_mut(&texture) {
            Some(storage) => *storage = Some(*descriptor),
            None => tracing::warn!("allocate of unknown texture {:?}", texture),
        }

        self.record(BackendCall::AllocateTexture(texture, *descriptor));
    }

    fn write_texture(&mut self, texture: ObjectId, write: &TextureWrite<'_>) {
        match self.textures.get(&texture) {
            Some(Some(descriptor)) => {
                let fits = (0..3).all(|axis| {
                    write.offset[axis] + write.size[axis] <= descriptor.size[axis].max(1)
                });
                let expected = write.size.iter().product::<usize>() * write.format.channels();

                if !fits || write.mip_level >= descriptor.mip_levels.max(1) {
                    tracing::warn!("write to {:?} out of bounds", texture);
                } else if write.data.len() < expected {
                    tracing::warn!(
                        "write to {:?} with {} bytes, expected {}",
                        texture,
                        write.data.len(),
                        expected
                    );
                }
            }
            Some(None) => tracing::warn!("write to unallocated texture {:?}", texture),
            None => tracing::warn!("write to unknown texture {:?}", texture),
        }

        self.record(BackendCall::WriteTexture {
            texture,
            mip_level: write.mip_level,
            format: write.format,
            offset: write.offset,
            size: write.size,
        });
    }

    fn create_sampler(&mut self) -> ObjectId {
        let id = self.alloc_id();
        self.samplers.insert(id, ());
        self.record(BackendCall::CreateSampler(id));
        id
    }

    fn delete_sampler(&mut self, sampler: ObjectId) {
        self.samplers.remove(&sampler);
        self.record(BackendCall::DeleteSampler(sampler));
    }

    fn set_sampler_wrapping(&mut self, sampler: ObjectId, wrapping: [TextureWrapping; 3]) {
        self.record(BackendCall::SetSamplerWrapping(sampler, wrapping));
    }

    fn set_sampler_filtering(
        &mut self,
        sampler: ObjectId,
        magnifying: TextureFiltering,
        minifying: TextureFiltering,
        mipmap: TextureFiltering,
    ) {
        self.record(BackendCall::SetSamplerFiltering(
            sampler,
            [magnifying, minifying, mipmap],
        ));
    }

    fn create_shader(&mut self, ty: ShaderType) -> ObjectId {
        let id = self.alloc_id();
        self.shaders.insert(id, Shader { ty, source: None });
        self.record(BackendCall::CreateShader(id, ty));
        id
    }

    fn delete_shader(&mut self, shader: ObjectId) {
        self.shaders.remove(&shader);
        self.record(BackendCall::DeleteShader(shader));
    }

    fn compile_shader(&mut self, shader: ObjectId, source: &str) -> Result<(), String> {
        self.record(BackendCall::CompileShader(shader));

        let Some(state) = self.shaders.get_mut(&shader) else {
            return Err(format!("unknown shader {:?}", shader));
        };

        state.source = None;
        if !source.contains("main") {
            return Err(String::from("missing entry point `main`"));
        }

        state.source = Some(source.to_owned());
        Ok(())
    }

    /// Resolves `name` to the index of the first source line that mentions it.
    fn shader_binding_location(&mut self, shader: ObjectId, name: &str) -> Option<u32> {
        let source = self.shaders.get(&shader)?.source.as_ref()?;
        let line = source.lines().position(|line| line.contains(name))?;
        u32::try_from(line).ok()
    }

    fn link_program(&mut self, stages: &[ObjectId]) -> Result<ObjectId, String> {
        let mut has_vertex = false;
        for stage in stages {
            let Some(shader) = self.shaders.get(stage) else {
                return Err(format!("unknown shader {:?}", stage));
            };

            if shader.source.is_none() {
                return Err(format!("shader {:?} is not compiled", stage));
            }

            has_vertex |= shader.ty == ShaderType::Vertex;
        }

        if !has_vertex {
            return Err(String::from("program has no vertex stage"));
        }

        let id = self.alloc_id();
        self.programs.insert(id, stages.to_vec());
        self.record(BackendCall::LinkProgram(id, stages.to_vec()));
        Ok(id)
    }

    fn delete_program(&mut self, program: ObjectId) {
        self.programs.remove(&program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }

        self.record(BackendCall::DeleteProgram(program));
    }

    fn bind_program(&mut self, program: ObjectId) {
        if !self.programs.contains_key(&program) {
            tracing::warn!("bind of unknown program {:?}", program);
        }

        self.bound_program = Some(program);
        self.record(BackendCall::BindProgram(program));
    }

    fn create_frame_buffer(&mut self) -> ObjectId {
        let id = self.alloc_id();
        self.frame_buffers.insert(id, HashMap::new());
        self.record(BackendCall::CreateFrameBuffer(id));
        id
    }

    fn delete_frame_buffer(&mut self, frame_buffer: ObjectId) {
        self.frame_buffers.remove(&frame_buffer);
        self.record(BackendCall::DeleteFrameBuffer(frame_buffer));
    }

    fn attach_texture(
        &mut self,
        frame_buffer: ObjectId,
        attachment: FrameBufferAttachment,
        texture: Option<ObjectId>,
    ) {
        if let Some(attachments) = self.frame_buffers.get_mut(&frame_buffer) {
            match texture {
                Some(texture) => attachments.insert(attachment, texture),
                None => attachments.remove(&attachment),
            };
        }

        self.record(BackendCall::AttachTexture(frame_buffer, attachment, texture));
    }

    fn bind_frame_buffer(&mut self, frame_buffer: Option<ObjectId>) {
        self.record(BackendCall::BindFrameBuffer(frame_buffer));
    }

    fn bind_vertex_buffers(
        &mut self,
        attributes: &[VertexAttributeConfig],
        buffers: &[Option<ObjectId>],
    ) {
        self.record(BackendCall::BindVertexBuffers(
            attributes.to_vec(),
            buffers.to_vec(),
        ));
    }

    fn bind_index_buffer(&mut self, buffer: Option<ObjectId>) {
        self.record(BackendCall::BindIndexBuffer(buffer));
    }

    fn set_culling_enabled(&mut self, enabled: bool) {
        self.record(BackendCall::SetCullingEnabled(enabled));
    }

    fn set_polygon_fill(&mut self, fill: PolygonFill) {
        self.record(BackendCall::SetPolygonFill(fill));
    }

    fn set_culling_mode(&mut self, mode: CullingMode) {
        self.record(BackendCall::SetCullingMode(mode));
    }

    fn set_front_face(&mut self, front_face: FrontFace) {
        self.record(BackendCall::SetFrontFace(front_face));
    }

    fn set_line_width(&mut self, width: f32) {
        self.record(BackendCall::SetLineWidth(width));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.record(BackendCall::SetDepthTest(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.record(BackendCall::SetDepthWrite(enabled));
    }

    fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.record(BackendCall::SetDepthCompare(compare));
    }

    fn bind_resource(&mut self, shader: ObjectId, location: u32, unit: u32, resource: BoundResource) {
        self.record(BackendCall::BindResource {
            shader,
            location,
            unit,
            resource,
        });
    }

    fn set_viewport(&mut self, rect: Rectangle) {
        self.record(BackendCall::SetViewport(rect));
    }

    fn set_scissors(&mut self, rect: Rectangle) {
        self.record(BackendCall::SetScissors(rect));
    }

    fn clear(&mut self, values: &ClearValues) {
        self.record(BackendCall::Clear(*values));
    }

    fn draw_arrays(&mut self, primitive: DrawPrimitive, draw: DrawVertices) {
        if self.bound_program.is_none() {
            tracing::warn!("draw without a bound program");
        }

        self.record(BackendCall::DrawArrays(primitive, draw));
    }

    fn draw_elements(&mut self, primitive: DrawPrimitive, draw: DrawIndexed) {
        if self.bound_program.is_none() {
            tracing::warn!("draw without a bound program");
        }

        self.record(BackendCall::DrawElements(primitive, draw));
    }
}

impl HeadlessBackend {
    fn read_buffer_unlogged(&self, buffer: ObjectId, offset: usize, len: usize) -> Vec<u8> {
        let Some(storage) = self.buffers.get(&buffer) else {
            tracing::warn!("read of unknown buffer {:?}", buffer);
            return Vec::new();
        };

        let start = usize::min(offset, storage.len());
        let end = usize::min(offset.saturating_add(len), storage.len());
        storage[start..end].to_vec()
    }
}

//! The bound draw state of the engine thread.
//!
//! Bind commands only record what is bound and mark it dirty. Right before a draw
//! [`BindingState::apply`] pushes the dirty parts to the backend, in this order:
//!
//! 1. vertex layout and vertex buffers (if the vertex buffers or the pipeline changed)
//! 2. index buffer
//! 3. frame buffer
//! 4. rasterization and depth/stencil state (if the pipeline changed), diffed per field
//!    against the last applied state
//! 5. descriptor resources (if any descriptor or the pipeline changed)
//! 6. the program of the pipeline, always

use bitflags::bitflags;
use gfx_tracing::trace_span;
use parking_lot::RwLockReadGuard;

use crate::backend::{Backend, ObjectId};
use crate::error::{Error, ErrorChannel};
use crate::handle::{Resource, ResourceKind};
use crate::pipeline_cache::{ProgramCache, ShaderSetKey};
use crate::resources::{
    Buffer, FrameBuffer, GraphicsPipeline, ResourcesDescriptor, Shader, ShaderObject,
    ShaderStages,
};
use crate::types::{DepthStencilConfig, RasterizationConfig};

pub const MAX_VERTEX_BINDINGS: usize = 16;
pub const MAX_DESCRIPTOR_SLOTS: usize = 8;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    struct Dirty: u8 {
        const PIPELINE = 1 << 0;
        const VERTEX_BUFFERS = 1 << 1;
        const INDEX_BUFFER = 1 << 2;
        const FRAME_BUFFER = 1 << 3;
        const DESCRIPTORS = 1 << 4;
    }
}

#[derive(Debug, Default)]
pub(crate) struct BindingState {
    pipeline: GraphicsPipeline,
    pipeline_version: u64,
    vertex_buffers: [Buffer; MAX_VERTEX_BINDINGS],
    index_buffer: Buffer,
    frame_buffer: FrameBuffer,
    descriptors: [ResourcesDescriptor; MAX_DESCRIPTOR_SLOTS],
    descriptor_versions: [u64; MAX_DESCRIPTOR_SLOTS],
    dirty: Dirty,
    rasterization: Option<RasterizationConfig>,
    depth_stencil: Option<DepthStencilConfig>,
}

impl BindingState {
    pub(crate) fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        let version = pipeline.read().map_or(0, |pipeline| pipeline.version);

        if self.pipeline != *pipeline || self.pipeline_version != version {
            self.pipeline = pipeline.clone();
            self.pipeline_version = version;
            self.dirty |= Dirty::PIPELINE;
        }
    }

    pub(crate) fn bind_vertex_buffer(
        &mut self,
        buffer: &Buffer,
        slot: usize,
    ) -> Result<(), Error> {
        let bound = self
            .vertex_buffers
            .get_mut(slot)
            .ok_or(Error::BindingSlotOutOfRange {
                slot,
                max: MAX_VERTEX_BINDINGS,
            })?;

        if bound != buffer {
            *bound = buffer.clone();
            self.dirty |= Dirty::VERTEX_BUFFERS;
        }

        Ok(())
    }

    pub(crate) fn bind_index_buffer(&mut self, buffer: &Buffer) {
        if self.index_buffer != *buffer {
            self.index_buffer = buffer.clone();
            self.dirty |= Dirty::INDEX_BUFFER;
        }
    }

    pub(crate) fn bind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) {
        if self.frame_buffer != *frame_buffer {
            self.frame_buffer = frame_buffer.clone();
            self.dirty |= Dirty::FRAME_BUFFER;
        }
    }

    pub(crate) fn bind_descriptor(
        &mut self,
        descriptor: &ResourcesDescriptor,
        slot: usize,
    ) -> Result<(), Error> {
        if slot >= MAX_DESCRIPTOR_SLOTS {
            return Err(Error::BindingSlotOutOfRange {
                slot,
                max: MAX_DESCRIPTOR_SLOTS,
            });
        }

        let version = descriptor.read().map_or(0, |descriptor| descriptor.version);

        if self.descriptors[slot] != *descriptor || self.descriptor_versions[slot] != version {
            self.descriptors[slot] = descriptor.clone();
            self.descriptor_versions[slot] = version;
            self.dirty |= Dirty::DESCRIPTORS;
        }

        Ok(())
    }

    /// Applies a pending frame buffer change.
    pub(crate) fn apply_frame_buffer(&mut self, backend: &mut dyn Backend) {
        if !self.dirty.contains(Dirty::FRAME_BUFFER) {
            return;
        }

        let id = if self.frame_buffer.is_empty() {
            None
        } else {
            let id = self.frame_buffer.read().ok().and_then(|fb| fb.id());
            if id.is_none() {
                tracing::warn!("frame buffer not created yet, binding default frame buffer");
            }
            id
        };

        backend.bind_frame_buffer(id);
        self.dirty.remove(Dirty::FRAME_BUFFER);
    }

    /// Applies all dirty state for a draw.
    ///
    /// Returns `false` if no usable pipeline is bound. The draw must then be skipped and the
    /// dirty state is kept for the next draw.
    pub(crate) fn apply(
        &mut self,
        backend: &mut dyn Backend,
        programs: &ProgramCache,
        errors: &ErrorChannel,
    ) -> bool {
        let _span = trace_span!("BindingState::apply").entered();

        let pipeline_handle = self.pipeline.clone();
        let pipeline = match pipeline_handle.read() {
            Ok(pipeline) => pipeline,
            Err(err) => {
                errors.report(&err);
                return false;
            }
        };

        let Some(config) = pipeline.config() else {
            errors.report(&Error::NotReady(ResourceKind::GraphicsPipeline));
            return false;
        };

        let stages = match Stages::resolve(&config.shaders) {
            Ok(stages) => stages,
            Err(err) => {
                errors.report(&err);
                return false;
            }
        };

        let link = || backend.link_program(&stages.ids);
        let program = match programs.get_or_link(stages.key, link) {
            Ok(program) => program,
            Err(log) => {
                errors.report(&Error::ProgramLink(log));
                return false;
            }
        };

        if self.dirty.intersects(Dirty::VERTEX_BUFFERS | Dirty::PIPELINE) {
            let buffers: Vec<_> = self.vertex_buffers.iter().map(buffer_id).collect();
            backend.bind_vertex_buffers(&config.vertex_layout, &buffers);
        }

        if self.dirty.contains(Dirty::INDEX_BUFFER) {
            backend.bind_index_buffer(buffer_id(&self.index_buffer));
        }

        self.apply_frame_buffer(backend);

        if self.dirty.contains(Dirty::PIPELINE) {
            self.apply_rasterization(backend, config.rasterization);
            self.apply_depth_stencil(backend, config.depth_stencil);
        }

        if self.dirty.intersects(Dirty::DESCRIPTORS | Dirty::PIPELINE) {
            self.apply_descriptors(backend, &stages, errors);
        }

        backend.bind_program(program);
        self.dirty = Dirty::empty();
        true
    }

    fn apply_rasterization(&mut self, backend: &mut dyn Backend, new: RasterizationConfig) {
        let old = self.rasterization;

        if old.map_or(true, |old| old.enable_culling != new.enable_culling) {
            backend.set_culling_enabled(new.enable_culling);
        }

        if old.map_or(true, |old| old.polygon_fill != new.polygon_fill) {
            backend.set_polygon_fill(new.polygon_fill);
        }

        if old.map_or(true, |old| old.culling_mode != new.culling_mode) {
            backend.set_culling_mode(new.culling_mode);
        }

        if old.map_or(true, |old| old.front_face != new.front_face) {
            backend.set_front_face(new.front_face);
        }

        if old.map_or(true, |old| old.line_width != new.line_width) {
            backend.set_line_width(new.line_width);
        }

        self.rasterization = Some(new);
    }

    fn apply_depth_stencil(&mut self, backend: &mut dyn Backend, new: DepthStencilConfig) {
        let old = self.depth_stencil;

        if old.map_or(true, |old| old.enable_depth_test != new.enable_depth_test) {
            backend.set_depth_test(new.enable_depth_test);
        }

        if old.map_or(true, |old| old.enable_depth_write != new.enable_depth_write) {
            backend.set_depth_write(new.enable_depth_write);
        }

        if old.map_or(true, |old| old.depth_compare != new.depth_compare) {
            backend.set_depth_compare(new.depth_compare);
        }

        self.depth_stencil = Some(new);
    }

    fn apply_descriptors(
        &self,
        backend: &mut dyn Backend,
        stages: &Stages<'_>,
        errors: &ErrorChannel,
    ) {
        let mut unit = 0;

        for (slot, descriptor) in self.descriptors.iter().enumerate() {
            if descriptor.is_empty() {
                continue;
            }

            let Ok(descriptor) = descriptor.read() else {
                continue;
            };

            for (binding, resource) in descriptor.resources().iter().enumerate() {
                let resource = match resource.resolve() {
                    Ok(resource) => resource,
                    Err(err) => {
                        errors.report(&err);
                        continue;
                    }
                };

                let (shader, location) = match stages.location(slot, binding) {
                    Some(target) => target,
                    None => {
                        errors.report(&Error::MissingDescriptorMapping { slot, binding });
                        (stages.ids[0], 0)
                    }
                };

                backend.bind_resource(shader, location, unit, resource);
                unit += 1;
            }
        }
    }
}

fn buffer_id(buffer: &Buffer) -> Option<ObjectId> {
    buffer.read().ok().and_then(|buffer| buffer.id())
}

/// The compiled shaders of the bound pipeline.
struct Stages<'a> {
    key: ShaderSetKey,
    /// Backend ids, vertex stage first.
    ids: Vec<ObjectId>,
    shaders: Vec<RwLockReadGuard<'a, ShaderObject>>,
}

impl<'a> Stages<'a> {
    fn resolve(stages: &'a ShaderStages) -> Result<Self, Error> {
        let vertex = read_compiled(&stages.vertex)?;
        let pixel = optional(&stages.pixel)?;
        let geometry = optional(&stages.geometry)?;

        let key = ShaderSetKey {
            vertex: vertex.key(),
            pixel: pixel.as_ref().map(|shader| shader.key()),
            geometry: geometry.as_ref().map(|shader| shader.key()),
        };

        let shaders: Vec<_> = [Some(vertex), pixel, geometry]
            .into_iter()
            .flatten()
            .collect();

        // `read_compiled` guarantees that every shader has an id.
        let ids = shaders.iter().filter_map(|shader| shader.id()).collect();

        Ok(Self { key, ids, shaders })
    }

    /// Returns the shader and location a descriptor binding maps to.
    fn location(&self, slot: usize, binding: usize) -> Option<(ObjectId, u32)> {
        self.shaders.iter().find_map(|shader| {
            let location = shader.location(slot, binding)?;
            Some((shader.id()?, location))
        })
    }
}

fn optional(shader: &Shader) -> Result<Option<RwLockReadGuard<'_, ShaderObject>>, Error> {
    if shader.is_empty() {
        Ok(None)
    } else {
        read_compiled(shader).map(Some)
    }
}

fn read_compiled(shader: &Shader) -> Result<RwLockReadGuard<'_, ShaderObject>, Error> {
    let guard = shader.read()?;
    if guard.is_compiled() && guard.id().is_some() {
        Ok(guard)
    } else {
        Err(Error::NotReady(ShaderObject::KIND))
    }
}

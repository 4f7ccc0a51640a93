//! Recording of commands for later submission.
//!
//! Commands are issued through the [`Commands`] trait on either a [`Recording`] of a
//! [`CommandBuffer`], which stores them for any number of later submissions, or on an
//! [`Immediate`] sink, which enqueues them directly.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use gfx_tasks::{QueueClass, SharedTask};

use crate::backend::{ObjectId, TextureWrite};
use crate::binding::{MAX_DESCRIPTOR_SLOTS, MAX_VERTEX_BINDINGS};
use crate::device::Device;
use crate::engine::EngineState;
use crate::error::{Error, ErrorChannel};
use crate::handle::{Handle, Resource, ResourceKind};
use crate::resources::{Buffer, FrameBuffer, GraphicsPipeline, ResourcesDescriptor, Texture};
use crate::types::{
    BufferAccessProfile, BufferMemoryProfile, ClearValues, DrawIndexed, DrawPrimitive,
    DrawVertices, Rectangle, TextureDescriptor, TextureSourceFormat,
};

pub type CommandBuffer = Handle<CommandBufferObject>;

pub struct CommandBufferObject {
    target: QueueClass,
    tasks: Vec<SharedTask<EngineState>>,
    errors: ErrorChannel,
}

impl CommandBufferObject {
    pub(crate) fn new(errors: ErrorChannel) -> Self {
        Self {
            target: QueueClass::General,
            tasks: Vec::new(),
            errors,
        }
    }

    /// Returns the queue class set by [`configure`].
    ///
    /// [`configure`]: Handle::configure
    pub fn target(&self) -> QueueClass {
        self.target
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn tasks(&self) -> &[SharedTask<EngineState>] {
        &self.tasks
    }
}

impl Resource for CommandBufferObject {
    const KIND: ResourceKind = ResourceKind::CommandBuffer;
}

impl Debug for CommandBufferObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBufferObject")
            .field("target", &self.target)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Handle<CommandBufferObject> {
    pub fn configure(&self, target: QueueClass) -> Result<(), Error> {
        self.write()?.target = target;
        Ok(())
    }

    /// Starts recording into the buffer, discarding all previously recorded commands.
    ///
    /// Every command is appended to the buffer as it is recorded, so submitting the buffer
    /// while the recording is open submits the commands recorded so far.
    pub fn begin_recording(&self) -> Result<Recording<'_>, Error> {
        let mut buffer = self.write()?;
        buffer.tasks.clear();

        Ok(Recording {
            buffer: self,
            errors: buffer.errors.clone(),
        })
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.write()?.tasks.clear();
        Ok(())
    }
}

/// An open recording of a [`CommandBuffer`].
pub struct Recording<'a> {
    buffer: &'a CommandBuffer,
    errors: ErrorChannel,
}

impl Recording<'_> {
    pub fn end_recording(self) {}

    /// Returns the number of commands recorded so far.
    pub fn len(&self) -> usize {
        self.buffer.read().map_or(0, |buffer| buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for Recording<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl private::Sink for Recording<'_> {
    fn push(&mut self, task: SharedTask<EngineState>) -> Result<(), Error> {
        self.buffer.write()?.tasks.push(task);
        Ok(())
    }

    fn errors(&self) -> &ErrorChannel {
        &self.errors
    }
}

impl Commands for Recording<'_> {}

/// Issues commands directly into a queue.
#[derive(Clone, Debug)]
pub struct Immediate {
    device: Device,
    class: QueueClass,
}

impl Immediate {
    pub(crate) fn new(device: Device, class: QueueClass) -> Self {
        Self { device, class }
    }

    pub fn class(&self) -> QueueClass {
        self.class
    }
}

impl private::Sink for Immediate {
    fn push(&mut self, task: SharedTask<EngineState>) -> Result<(), Error> {
        self.device.push_shared(self.class, task)
    }

    fn errors(&self) -> &ErrorChannel {
        self.device.errors()
    }
}

impl Commands for Immediate {}

mod private {
    use gfx_tasks::SharedTask;

    use crate::engine::EngineState;
    use crate::error::{Error, ErrorChannel};

    pub trait Sink {
        fn push(&mut self, task: SharedTask<EngineState>) -> Result<(), Error>;

        fn errors(&self) -> &ErrorChannel;
    }
}

/// The command surface shared by [`Recording`] and [`Immediate`].
///
/// Validation errors are reported to the error channel and returned. Errors of the recorded
/// tasks themselves are only reported once the engine executes them.
pub trait Commands: private::Sink {
    fn bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) -> Result<(), Error> {
        let pipeline = pipeline.clone();
        record(self, move |engine| engine.bindings.bind_pipeline(&pipeline))
    }

    /// Binds `buffer` to the vertex buffer `binding`. An empty handle unbinds the slot.
    fn bind_vertex_buffer(&mut self, buffer: &Buffer, binding: usize) -> Result<(), Error> {
        check_slot(self, binding, MAX_VERTEX_BINDINGS)?;

        let buffer = buffer.clone();
        record(self, move |engine| {
            if let Err(err) = engine.bindings.bind_vertex_buffer(&buffer, binding) {
                engine.report(err);
            }
        })
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer) -> Result<(), Error> {
        let buffer = buffer.clone();
        record(self, move |engine| engine.bindings.bind_index_buffer(&buffer))
    }

    /// Binds the render target. An empty handle binds the default frame buffer.
    fn bind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> Result<(), Error> {
        let frame_buffer = frame_buffer.clone();
        record(self, move |engine| {
            engine.bindings.bind_frame_buffer(&frame_buffer);
        })
    }

    fn bind_resources_descriptor(
        &mut self,
        descriptor: &ResourcesDescriptor,
        slot: usize,
    ) -> Result<(), Error> {
        check_slot(self, slot, MAX_DESCRIPTOR_SLOTS)?;

        let descriptor = descriptor.clone();
        record(self, move |engine| {
            if let Err(err) = engine.bindings.bind_descriptor(&descriptor, slot) {
                engine.report(err);
            }
        })
    }

    fn set_viewport(&mut self, rect: Rectangle) -> Result<(), Error> {
        record(self, move |engine| engine.backend().set_viewport(rect))
    }

    fn set_scissors(&mut self, rect: Rectangle) -> Result<(), Error> {
        record(self, move |engine| engine.backend().set_scissors(rect))
    }

    fn clear(&mut self, values: ClearValues) -> Result<(), Error> {
        record(self, move |engine| engine.clear(values))
    }

    fn draw_vertices(
        &mut self,
        primitive: DrawPrimitive,
        vertex_count: usize,
        first_vertex: usize,
        instance_count: usize,
        first_instance: usize,
    ) -> Result<(), Error> {
        let draw = DrawVertices {
            vertex_count,
            first_vertex,
            instance_count,
            first_instance,
        };

        record(self, move |engine| engine.draw_vertices(primitive, draw))
    }

    fn draw_indexed(
        &mut self,
        primitive: DrawPrimitive,
        index_count: usize,
        first_index: usize,
        base_vertex: i32,
        instance_count: usize,
        first_instance: usize,
    ) -> Result<(), Error> {
        let draw = DrawIndexed {
            index_count,
            first_index,
            base_vertex,
            instance_count,
            first_instance,
        };

        record(self, move |engine| engine.draw_indexed(primitive, draw))
    }

    /// Allocates `size` bytes of storage for `buffer`, discarding its previous contents.
    ///
    /// The size and profiles are visible on the buffer immediately, the storage exists once
    /// the command executed.
    fn assign_buffer_memory(
        &mut self,
        buffer: &Buffer,
        size: usize,
        memory: BufferMemoryProfile,
        access: BufferAccessProfile,
    ) -> Result<(), Error> {
        {
            let mut object = report(self, buffer.write())?;
            object.size = size;
            object.profile = Some((memory, access));
        }

        let buffer = buffer.clone();
        record(self, move |engine| {
            let Ok(mut object) = buffer.write() else {
                return;
            };

            let id = *object
                .id
                .get_or_insert_with(|| engine.backend().create_buffer());
            engine.backend().allocate_buffer(id, size, memory, access);
        })
    }

    /// Writes `data` to the start of `buffer`.
    fn write_buffer(&mut self, buffer: &Buffer, data: impl Into<Bytes>) -> Result<(), Error> {
        self.write_buffer_region(buffer, 0, data)
    }

    fn write_buffer_region(
        &mut self,
        buffer: &Buffer,
        offset: usize,
        data: impl Into<Bytes>,
    ) -> Result<(), Error> {
        check_non_empty(self, buffer)?;

        let buffer = buffer.clone();
        let data = data.into();
        record(self, move |engine| {
            match ready_id(&buffer, |object| object.id()) {
                Ok(id) => engine.backend().write_buffer(id, offset, &data),
                Err(err) => engine.report(err),
            }
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: &Buffer,
        destination: &Buffer,
        read_offset: usize,
        read_size: usize,
        write_offset: usize,
    ) -> Result<(), Error> {
        check_non_empty(self, source)?;
        check_non_empty(self, destination)?;

        let source = source.clone();
        let destination = destination.clone();
        record(self, move |engine| {
            let ids = ready_id(&source, |object| object.id())
                .and_then(|src| Ok((src, ready_id(&destination, |object| object.id())?)));

            match ids {
                Ok((src, dst)) => {
                    engine
                        .backend()
                        .copy_buffer(src, dst, read_offset, write_offset, read_size);
                }
                Err(err) => engine.report(err),
            }
        })
    }

    fn assign_texture_memory(
        &mut self,
        texture: &Texture,
        descriptor: TextureDescriptor,
    ) -> Result<(), Error> {
        report(self, texture.write())?.descriptor = Some(descriptor);

        let texture = texture.clone();
        record(self, move |engine| {
            let Ok(mut object) = texture.write() else {
                return;
            };

            let id = *object
                .id
                .get_or_insert_with(|| engine.backend().create_texture());
            engine.backend().allocate_texture(id, &descriptor);
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn write_texture(
        &mut self,
        texture: &Texture,
        mip_level: usize,
        format: TextureSourceFormat,
        offset: [usize; 3],
        size: [usize; 3],
        data: impl Into<Bytes>,
    ) -> Result<(), Error> {
        check_non_empty(self, texture)?;

        let texture = texture.clone();
        let data = data.into();
        record(self, move |engine| {
            match ready_id(&texture, |object| object.id()) {
                Ok(id) => {
                    let write = TextureWrite {
                        mip_level,
                        format,
                        offset,
                        size,
                        data: &data,
                    };
                    engine.backend().write_texture(id, &write);
                }
                Err(err) => engine.report(err),
            }
        })
    }
}

fn record<S, F>(sink: &mut S, f: F) -> Result<(), Error>
where
    S: private::Sink + ?Sized,
    F: Fn(&mut EngineState) + Send + Sync + 'static,
{
    let result = sink.push(Arc::new(f));
    report(sink, result)
}

fn report<S, T>(sink: &S, result: Result<T, Error>) -> Result<T, Error>
where
    S: private::Sink + ?Sized,
{
    result.inspect_err(|err| sink.errors().report(err))
}

fn check_slot<S>(sink: &S, slot: usize, max: usize) -> Result<(), Error>
where
    S: private::Sink + ?Sized,
{
    if slot < max {
        Ok(())
    } else {
        report(sink, Err(Error::BindingSlotOutOfRange { slot, max }))
    }
}

fn check_non_empty<S, T>(sink: &S, handle: &Handle<T>) -> Result<(), Error>
where
    S: private::Sink + ?Sized,
    T: Resource,
{
    if handle.is_empty() {
        report(sink, Err(Error::EmptyHandle(T::KIND)))
    } else {
        Ok(())
    }
}

/// Returns the backend object of `handle`, or [`Error::NotReady`] if it was not created yet.
pub(crate) fn ready_id<T, F>(handle: &Handle<T>, id: F) -> Result<ObjectId, Error>
where
    T: Resource,
    F: FnOnce(&T) -> Option<ObjectId>,
{
    id(&*handle.read()?).ok_or(Error::NotReady(T::KIND))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{CommandBuffer, CommandBufferObject, Commands};
    use crate::error::{Error, ErrorChannel};
    use crate::resources::Buffer;
    use crate::types::{DrawPrimitive, Rectangle};

    fn command_buffer() -> (CommandBuffer, Arc<Mutex<Vec<String>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let channel = ErrorChannel::new({
            let errors = errors.clone();
            move |msg| errors.lock().push(msg.to_owned())
        });

        (CommandBuffer::new(CommandBufferObject::new(channel)), errors)
    }

    #[test]
    fn begin_recording_clears_previous_commands() {
        let (buffer, _) = command_buffer();

        let mut recording = buffer.begin_recording().unwrap();
        recording.set_viewport(Rectangle::default()).unwrap();
        recording
            .draw_vertices(DrawPrimitive::Triangles, 3, 0, 1, 0)
            .unwrap();
        assert_eq!(recording.len(), 2);
        recording.end_recording();

        assert_eq!(buffer.read().unwrap().len(), 2);

        let recording = buffer.begin_recording().unwrap();
        assert!(recording.is_empty());
        drop(recording);

        assert!(buffer.read().unwrap().is_empty());
    }

    #[test]
    fn invalid_commands_are_reported() {
        let (buffer, errors) = command_buffer();

        let mut recording = buffer.begin_recording().unwrap();
        let err = recording
            .bind_vertex_buffer(&Buffer::default(), 16)
            .unwrap_err();
        assert!(matches!(err, Error::BindingSlotOutOfRange { slot: 16, .. }));

        let err = recording
            .write_buffer(&Buffer::default(), vec![0u8; 4])
            .unwrap_err();
        assert!(matches!(err, Error::EmptyHandle(_)));

        assert!(recording.is_empty());
        drop(recording);

        assert_eq!(errors.lock().len(), 2);
    }

    #[test]
    fn clear_and_configure() {
        let (buffer, _) = command_buffer();
        buffer.configure(gfx_tasks::QueueClass::Transfer).unwrap();

        let mut recording = buffer.begin_recording().unwrap();
        recording.set_scissors(Rectangle::default()).unwrap();
        recording.end_recording();

        buffer.clear().unwrap();
        let object = buffer.read().unwrap();
        assert!(object.is_empty());
        assert_eq!(object.target(), gfx_tasks::QueueClass::Transfer);
    }
}

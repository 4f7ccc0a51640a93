use std::sync::Arc;

use bytes::Bytes;
use gfx_tasks::{Executor, QueueClass, Task};
use gfx_tracing::trace_span;
use tokio::sync::oneshot;

use crate::backend::{Backend, Limits};
use crate::command_buffer::{ready_id, CommandBuffer, CommandBufferObject, Immediate};
use crate::config::Config;
use crate::device::Device;
use crate::engine::EngineState;
use crate::error::{Error, ErrorChannel};
use crate::fence::{Fence, FenceObject};
use crate::handle::{Handle, Resource};
use crate::pipeline_cache::ProgramCache;
use crate::resources::{
    Buffer, BufferObject, DescriptorResource, FrameBuffer, FrameBufferObject, GraphicsPipeline,
    GraphicsPipelineConfig, GraphicsPipelineObject, ResourcesDescriptor,
    ResourcesDescriptorObject, Sampler, SamplerObject, Shader, ShaderBinding, ShaderObject,
    Texture, TextureObject,
};
use crate::types::{
    DescriptorBindingType, FrameBufferAttachment, ShaderType, TextureFiltering, TextureWrapping,
};

/// The number of queues the engine provides per [`QueueClass`].
const QUEUES_PER_CLASS: usize = 1;

/// A running graphics engine.
///
/// The context owns the engine thread, which is the only thread that ever calls into the
/// [`Backend`]. All other threads create resources, record commands and enqueue tasks.
///
/// Blocking methods (`wait_*`, [`finish`], [`read_buffer`]) must not be called from a task
/// running on the engine.
///
/// [`finish`]: Self::finish
/// [`read_buffer`]: Self::read_buffer
#[derive(Debug)]
pub struct Context {
    executor: Option<Executor<EngineState>>,
    device: Device,
}

impl Context {
    /// Starts the engine thread.
    ///
    /// `backend` is called on the engine thread to create the backend. Every error of the
    /// context, including errors of tasks executed on the engine thread, is reported to
    /// `errors`.
    pub fn start<F, B>(config: &Config, errors: ErrorChannel, backend: F) -> Result<Self, Error>
    where
        F: FnOnce() -> B + Send + 'static,
        B: Backend,
    {
        let programs = Arc::new(ProgramCache::new());

        let executor = Executor::new(config.engine.thread_name.clone(), {
            let programs = programs.clone();
            let errors = errors.clone();
            move || EngineState::new(Box::new(backend()), programs, errors)
        })
        .map_err(Error::Spawn)?;

        let spawner = executor.spawner();

        let (tx, rx) = oneshot::channel();
        spawner
            .push(
                QueueClass::General,
                Task::once(move |engine: &mut EngineState| {
                    let _ = tx.send(engine.limits().clone());
                }),
            )
            .map_err(|_| Error::EngineStopped)?;

        // The sender is dropped without sending if the backend could not be created.
        let limits = rx.blocking_recv().map_err(|_| Error::EngineStopped)?;
        tracing::debug!("engine started with {:?}", limits);

        let context = Self {
            executor: Some(executor),
            device: Device::new(spawner, programs, errors, limits),
        };

        for (class, count) in [
            (QueueClass::Compute, config.queues.compute),
            (QueueClass::Transfer, config.queues.transfer),
        ] {
            // Invalid counts are only reported.
            if count != 0 && context.enable_queues(class, count).is_err() {
                tracing::warn!("{} queues not enabled", class);
            }
        }

        Ok(context)
    }

    /// Stops the engine.
    ///
    /// All tasks enqueued before the call are executed. Afterwards all bound resources are
    /// released and every cached program is deleted. Backend objects of handles that are
    /// dropped after this call are not deleted.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(executor) = self.executor.take() else {
            return;
        };

        let _span = trace_span!("Context::stop").entered();

        // Bound handles are released while the engine still accepts their deletions.
        if self
            .device
            .enqueue(QueueClass::General, EngineState::reset_bindings)
            .is_err()
        {
            tracing::warn!("engine stopped before bindings were reset");
        }

        executor.shutdown();
        tracing::debug!("engine stopped");
    }

    pub fn limits(&self) -> &Limits {
        self.device.limits()
    }

    pub fn max_color_attachments(&self) -> usize {
        self.limits().max_color_attachments
    }

    pub fn shading_language_name(&self) -> &'static str {
        self.limits().shading_language
    }

    /// Returns the number of queues of `class` the engine supports.
    pub fn max_queues(&self, _class: QueueClass) -> usize {
        QUEUES_PER_CLASS
    }

    /// Enables `count` queues of `class`.
    ///
    /// Every class has exactly one queue, which always accepts tasks. Requesting any other
    /// number of queues is an error.
    pub fn enable_queues(&self, class: QueueClass, count: usize) -> Result<(), Error> {
        if count != QUEUES_PER_CLASS {
            return self.device.check(Err(Error::InvalidQueueCount {
                class,
                count,
                max: QUEUES_PER_CLASS,
            }));
        }

        tracing::debug!("enabled {} {} queue(s)", count, class);
        Ok(())
    }

    /// Enqueues a task with exclusive access to the engine state.
    pub fn enqueue<F>(&self, class: QueueClass, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut EngineState) + Send + 'static,
    {
        self.device.check(self.device.enqueue(class, f))
    }

    /// Runs `f` with the backend on the general queue.
    pub fn execute_raw<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut dyn Backend) + Send + 'static,
    {
        self.enqueue(QueueClass::General, move |engine| f(engine.backend()))
    }

    /// Blocks until the queue of `class` is empty and its tasks have finished executing.
    pub fn wait_queue_empty(&self, class: QueueClass) {
        self.device.spawner().wait_idle(class);
    }

    pub fn wait_all_queues_empty(&self) {
        self.device.spawner().wait_all_idle();
    }

    /// Blocks until all tasks enqueued on the general queue before the call have executed.
    pub fn finish(&self) -> Result<(), Error> {
        let _span = trace_span!("Context::finish").entered();

        let (tx, rx) = oneshot::channel();
        self.enqueue(QueueClass::General, move |_| {
            let _ = tx.send(());
        })?;

        self.device
            .check(rx.blocking_recv().map_err(|_| Error::EngineStopped))
    }

    /// Returns a sink issuing commands directly into the queue of `class`.
    pub fn immediate(&self, class: QueueClass) -> Immediate {
        Immediate::new(self.device.clone(), class)
    }

    /// Submits the commands of `buffer` to the queue it was configured for.
    pub fn submit(&self, buffer: &CommandBuffer) -> Result<(), Error> {
        let class = self.device.check(buffer.read().map(|buffer| buffer.target()))?;
        self.submit_command_buffer(buffer, class)
    }

    /// Submits the commands of `buffer` into the queue of `class` as one contiguous run.
    ///
    /// The buffer keeps its commands and can be submitted again.
    pub fn submit_command_buffer(
        &self,
        buffer: &CommandBuffer,
        class: QueueClass,
    ) -> Result<(), Error> {
        let _span = trace_span!("Context::submit_command_buffer").entered();

        let tasks = self.device.check(recorded_tasks(buffer))?;
        self.device.check(self.device.extend(class, tasks))
    }

    /// Submits `buffer` like [`submit_command_buffer`] and signals `fence` once its last
    /// command executed.
    ///
    /// [`submit_command_buffer`]: Self::submit_command_buffer
    pub fn submit_command_buffer_with_fence(
        &self,
        buffer: &CommandBuffer,
        class: QueueClass,
        fence: &Fence,
    ) -> Result<(), Error> {
        let _span = trace_span!("Context::submit_command_buffer_with_fence").entered();

        let mut tasks = self.device.check(recorded_tasks(buffer))?;
        let signal = self.device.check(fence.read().map(|fence| fence.submit()))?;

        // The signal is raised without locking the handle.
        tasks.push(Task::once({
            let signal = signal.clone();
            move |_| signal.signal()
        }));

        let result = self.device.extend(class, tasks);
        if result.is_err() {
            // Never leave waiters blocked on a submission that was rejected.
            signal.signal();
        }

        self.device.check(result)
    }

    /// Reads `len` bytes at `offset` from `buffer`, blocking until the read executed on the
    /// general queue.
    ///
    /// Must not be called from within an async runtime.
    pub fn read_buffer(&self, buffer: &Buffer, offset: usize, len: usize) -> Result<Bytes, Error> {
        let _span = trace_span!("Context::read_buffer").entered();

        let (tx, rx) = oneshot::channel();
        let buffer = buffer.clone();
        self.enqueue(QueueClass::General, move |engine| {
            let data = ready_id(&buffer, BufferObject::id)
                .map(|id| Bytes::from(engine.backend().read_buffer(id, offset, len)));
            let _ = tx.send(data);
        })?;

        let result = match rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(Error::EngineStopped),
        };
        self.device.check(result)
    }

    /// Returns the size last assigned to `buffer`.
    pub fn buffer_size(&self, buffer: &Buffer) -> Result<usize, Error> {
        self.device.check(buffer.read().map(|buffer| buffer.size()))
    }

    /// Creates a buffer without storage. The backend object is created by
    /// `assign_buffer_memory`.
    pub fn new_buffer(&self) -> Buffer {
        Buffer::new(BufferObject::new(self.device.clone()))
    }

    /// Creates a texture without storage. The backend object is created by
    /// `assign_texture_memory`.
    pub fn new_texture(&self) -> Texture {
        Texture::new(TextureObject::new(self.device.clone()))
    }

    pub fn new_sampler(&self) -> Sampler {
        let sampler = Sampler::new(SamplerObject::new(self.device.clone()));

        let handle = sampler.clone();
        self.spawn(move |engine| {
            if let Ok(mut sampler) = handle.write() {
                sampler.id = Some(engine.backend().create_sampler());
            }
        });

        sampler
    }

    /// Creates an empty shader. The backend object is created by [`compile_shader`].
    ///
    /// [`compile_shader`]: Self::compile_shader
    pub fn new_shader(&self) -> Shader {
        Shader::new(ShaderObject::new(self.device.clone()))
    }

    pub fn new_graphics_pipeline(&self) -> GraphicsPipeline {
        GraphicsPipeline::new(GraphicsPipelineObject::default())
    }

    pub fn new_frame_buffer(&self) -> FrameBuffer {
        let frame_buffer = FrameBuffer::new(FrameBufferObject::new(self.device.clone()));

        let handle = frame_buffer.clone();
        self.spawn(move |engine| {
            if let Ok(mut frame_buffer) = handle.write() {
                frame_buffer.id = Some(engine.backend().create_frame_buffer());
            }
        });

        frame_buffer
    }

    /// Returns the frame buffer presented by the backend.
    pub fn default_frame_buffer(&self) -> FrameBuffer {
        FrameBuffer::empty()
    }

    pub fn new_fence(&self) -> Fence {
        Fence::new(FenceObject::default())
    }

    pub fn new_command_buffer(&self) -> CommandBuffer {
        CommandBuffer::new(CommandBufferObject::new(self.device.errors().clone()))
    }

    pub fn new_resources_descriptor(&self) -> ResourcesDescriptor {
        ResourcesDescriptor::new(ResourcesDescriptorObject::default())
    }

    pub fn set_sampler_wrapping(
        &self,
        sampler: &Sampler,
        wrapping: [TextureWrapping; 3],
    ) -> Result<(), Error> {
        self.check_non_empty(sampler)?;

        let sampler = sampler.clone();
        self.enqueue(QueueClass::General, move |engine| {
            match ready_id(&sampler, SamplerObject::id) {
                Ok(id) => engine.backend().set_sampler_wrapping(id, wrapping),
                Err(err) => engine.report(err),
            }
        })
    }

    pub fn set_sampler_filtering(
        &self,
        sampler: &Sampler,
        mag: TextureFiltering,
        min: TextureFiltering,
        mipmap: TextureFiltering,
    ) -> Result<(), Error> {
        self.check_non_empty(sampler)?;

        let sampler = sampler.clone();
        self.enqueue(QueueClass::General, move |engine| {
            match ready_id(&sampler, SamplerObject::id) {
                Ok(id) => engine.backend().set_sampler_filtering(id, mag, min, mipmap),
                Err(err) => engine.report(err),
            }
        })
    }

    /// Compiles `source` as a shader of type `ty`.
    ///
    /// Compilation failures are reported to the error channel and leave the shader not ready.
    /// A successful recompilation relinks every program using the shader on its next draw.
    pub fn compile_shader(
        &self,
        shader: &Shader,
        ty: ShaderType,
        source: impl Into<String>,
    ) -> Result<(), Error> {
        self.check_non_empty(shader)?;

        let shader = shader.clone();
        let source = source.into();
        self.enqueue(QueueClass::General, move |engine| {
            let _span = trace_span!("compile_shader").entered();

            let Ok(mut object) = shader.write() else {
                return;
            };

            if let Some(id) = object.id {
                if object.ty != Some(ty) {
                    engine.backend().delete_shader(id);
                    object.id = None;
                }
            }

            let id = *object
                .id
                .get_or_insert_with(|| engine.backend().create_shader(ty));
            object.ty = Some(ty);

            // Programs linked from the previous binary are stale.
            for program in engine.programs.invalidate_for(object.key()) {
                engine.backend().delete_program(program);
            }

            match engine.backend().compile_shader(id, &source) {
                Ok(()) => object.compiled = true,
                Err(log) => {
                    object.compiled = false;
                    engine.report(Error::ShaderCompile(log));
                }
            }
        })
    }

    /// Maps descriptor bindings to named bindings of `shader`.
    ///
    /// The shader must be compiled when the task executes. Names the shader does not declare
    /// are skipped and reported when a draw needs them.
    pub fn link_shader_bindings(
        &self,
        shader: &Shader,
        bindings: &[ShaderBinding],
    ) -> Result<(), Error> {
        self.check_non_empty(shader)?;

        let shader = shader.clone();
        let bindings = bindings.to_vec();
        self.enqueue(QueueClass::General, move |engine| {
            let Ok(mut object) = shader.write() else {
                return;
            };

            let Some(id) = object.id.filter(|_| object.compiled) else {
                engine.report(Error::NotReady(ShaderObject::KIND));
                return;
            };

            for binding in bindings {
                match engine.backend().shader_binding_location(id, &binding.name) {
                    Some(location) => {
                        object
                            .locations
                            .insert((binding.slot, binding.binding), location);
                    }
                    None => {
                        tracing::warn!("shader does not declare binding {:?}", binding.name);
                    }
                }
            }
        })
    }

    /// Sets the configuration of `pipeline`. Takes effect on the next bind of the pipeline.
    pub fn configure_graphics_pipeline(
        &self,
        pipeline: &GraphicsPipeline,
        config: GraphicsPipelineConfig,
    ) -> Result<(), Error> {
        let mut pipeline = self.device.check(pipeline.write())?;
        pipeline.configure(config);
        Ok(())
    }

    /// Attaches `texture` to `frame_buffer`.
    ///
    /// The texture must have its memory assigned before the attachment executes.
    pub fn attach_to_frame_buffer(
        &self,
        frame_buffer: &FrameBuffer,
        attachment: FrameBufferAttachment,
        texture: &Texture,
    ) -> Result<(), Error> {
        self.check_attachment(attachment)?;
        self.check_non_empty(texture)?;

        self.device
            .check(frame_buffer.write())?
            .attachments
            .insert(attachment, texture.clone());

        let frame_buffer = frame_buffer.clone();
        let texture = texture.clone();
        self.enqueue(QueueClass::General, move |engine| {
            let ids = ready_id(&frame_buffer, FrameBufferObject::id)
                .and_then(|fb| Ok((fb, ready_id(&texture, TextureObject::id)?)));

            match ids {
                Ok((fb, texture)) => engine.backend().attach_texture(fb, attachment, Some(texture)),
                Err(err) => engine.report(err),
            }
        })
    }

    pub fn detach_from_frame_buffer(
        &self,
        frame_buffer: &FrameBuffer,
        attachment: FrameBufferAttachment,
    ) -> Result<(), Error> {
        self.check_attachment(attachment)?;

        let texture = self
            .device
            .check(frame_buffer.write())?
            .attachments
            .remove(&attachment);

        let frame_buffer = frame_buffer.clone();
        self.enqueue(QueueClass::General, move |engine| {
            match ready_id(&frame_buffer, FrameBufferObject::id) {
                Ok(fb) => engine.backend().attach_texture(fb, attachment, None),
                Err(err) => engine.report(err),
            }

            // Keep the texture alive until the backend no longer references it.
            drop(texture);
        })
    }

    /// Sets the binding layout of `descriptor`. The layout can only be set once.
    pub fn configure_resources_descriptor(
        &self,
        descriptor: &ResourcesDescriptor,
        layout: Vec<DescriptorBindingType>,
    ) -> Result<(), Error> {
        let result = descriptor
            .write()
            .and_then(|mut descriptor| descriptor.set_layout(layout));
        self.device.check(result)
    }

    /// Binds `resources` to `descriptor`, replacing all previously bound resources.
    pub fn bind_to_resources_descriptor(
        &self,
        descriptor: &ResourcesDescriptor,
        resources: Vec<DescriptorResource>,
    ) -> Result<(), Error> {
        let result = descriptor
            .write()
            .and_then(|mut descriptor| descriptor.bind(resources));
        self.device.check(result)
    }

    /// Enqueues a task on the general queue whose failure to enqueue is only reported.
    fn spawn<F>(&self, f: F)
    where
        F: FnOnce(&mut EngineState) + Send + 'static,
    {
        if let Err(err) = self.device.enqueue(QueueClass::General, f) {
            self.device.errors().report(&err);
        }
    }

    fn check_non_empty<T>(&self, handle: &Handle<T>) -> Result<(), Error>
    where
        T: Resource,
    {
        if handle.is_empty() {
            self.device.check(Err(Error::EmptyHandle(T::KIND)))
        } else {
            Ok(())
        }
    }

    fn check_attachment(&self, attachment: FrameBufferAttachment) -> Result<(), Error> {
        match attachment {
            FrameBufferAttachment::Color(index) if index >= self.max_color_attachments() => {
                self.device.check(Err(Error::BindingSlotOutOfRange {
                    slot: index,
                    max: self.max_color_attachments(),
                }))
            }
            _ => Ok(()),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn recorded_tasks(buffer: &CommandBuffer) -> Result<Vec<Task<EngineState>>, Error> {
    let buffer = buffer.read()?;
    Ok(buffer.tasks().iter().cloned().map(Task::from).collect())
}

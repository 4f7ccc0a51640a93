use std::sync::Arc;

use gfx_tasks::{QueueClass, SharedTask, Spawner, Task};

use crate::backend::Limits;
use crate::engine::EngineState;
use crate::error::{Error, ErrorChannel};
use crate::handle::ResourceKind;
use crate::pipeline_cache::ProgramCache;

/// The parts of a [`Context`] shared with every resource object.
///
/// [`Context`]: crate::Context
#[derive(Clone, Debug)]
pub(crate) struct Device {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    spawner: Spawner<EngineState>,
    programs: Arc<ProgramCache>,
    errors: ErrorChannel,
    limits: Limits,
}

impl Device {
    pub(crate) fn new(
        spawner: Spawner<EngineState>,
        programs: Arc<ProgramCache>,
        errors: ErrorChannel,
        limits: Limits,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                spawner,
                programs,
                errors,
                limits,
            }),
        }
    }

    pub(crate) fn enqueue<F>(&self, class: QueueClass, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut EngineState) + Send + 'static,
    {
        self.push(class, Task::once(f))
    }

    pub(crate) fn push(&self, class: QueueClass, task: Task<EngineState>) -> Result<(), Error> {
        self.shared
            .spawner
            .push(class, task)
            .map_err(|_| Error::EngineStopped)
    }

    /// Pushes `tasks` as one contiguous run.
    pub(crate) fn extend<I>(&self, class: QueueClass, tasks: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Task<EngineState>>,
    {
        self.shared
            .spawner
            .extend(class, tasks)
            .map_err(|_| Error::EngineStopped)
    }

    pub(crate) fn push_shared(
        &self,
        class: QueueClass,
        task: SharedTask<EngineState>,
    ) -> Result<(), Error> {
        self.push(class, Task::from(task))
    }

    /// Enqueues the deletion of a backend object from a destructor.
    pub(crate) fn enqueue_deletion<F>(&self, kind: ResourceKind, f: F)
    where
        F: FnOnce(&mut EngineState) + Send + 'static,
    {
        if self.enqueue(QueueClass::General, f).is_err() {
            tracing::debug!("engine is stopped, not deleting {}", kind);
        }
    }

    #[inline]
    pub(crate) fn spawner(&self) -> &Spawner<EngineState> {
        &self.shared.spawner
    }

    #[inline]
    pub(crate) fn programs(&self) -> &ProgramCache {
        &self.shared.programs
    }

    #[inline]
    pub(crate) fn errors(&self) -> &ErrorChannel {
        &self.shared.errors
    }

    #[inline]
    pub(crate) fn limits(&self) -> &Limits {
        &self.shared.limits
    }

    /// Reports the error of `result` to the error channel and returns it unchanged.
    pub(crate) fn check<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        result.inspect_err(|err| self.errors().report(err))
    }
}

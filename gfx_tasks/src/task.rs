use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A replayable task.
///
/// Shared tasks are stored in recorded buffers and pushed into a queue every time the buffer
/// is submitted.
pub type SharedTask<C> = Arc<dyn Fn(&mut C) + Send + Sync>;

/// A unit of work executed on the engine thread with exclusive access to the engine state `C`.
pub enum Task<C> {
    /// A task that runs exactly once.
    Once(Box<dyn FnOnce(&mut C) + Send>),
    /// A task that may be pushed into queues any number of times.
    Shared(SharedTask<C>),
}

impl<C> Task<C> {
    pub fn once<F>(f: F) -> Self
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        Self::Once(Box::new(f))
    }

    pub fn shared<F>(f: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        Self::Shared(Arc::new(f))
    }

    #[inline]
    pub fn run(self, state: &mut C) {
        match self {
            Self::Once(f) => f(state),
            Self::Shared(f) => f(state),
        }
    }
}

impl<C> From<SharedTask<C>> for Task<C> {
    #[inline]
    fn from(task: SharedTask<C>) -> Self {
        Self::Shared(task)
    }
}

impl<C> Debug for Task<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once(_) => f.write_str("Task::Once"),
            Self::Shared(_) => f.write_str("Task::Shared"),
        }
    }
}

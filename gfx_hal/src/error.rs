use std::fmt::{self, Debug, Formatter};
use std::io;
use std::sync::Arc;

use gfx_tasks::QueueClass;
use thiserror::Error;

use crate::handle::ResourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid number of {class} queues: {count} (only {max} supported)")]
    InvalidQueueCount {
        class: QueueClass,
        count: usize,
        max: usize,
    },
    #[error("binding resources to a resources descriptor before setting its layout")]
    DescriptorLayoutNotSet,
    #[error("resources descriptor layout already set")]
    DescriptorLayoutAlreadySet,
    #[error("resources do not match the descriptor layout: {0}")]
    DescriptorLayoutMismatch(String),
    #[error("no shader location for descriptor slot {slot} binding {binding}, falling back to 0")]
    MissingDescriptorMapping { slot: usize, binding: usize },
    #[error("failed to compile shader: {0}")]
    ShaderCompile(String),
    #[error("failed to link program: {0}")]
    ProgramLink(String),
    #[error("{0} handle is empty")]
    EmptyHandle(ResourceKind),
    #[error("{0} is not ready")]
    NotReady(ResourceKind),
    #[error("binding slot {slot} out of range (max {max})")]
    BindingSlotOutOfRange { slot: usize, max: usize },
    #[error("engine is stopped")]
    EngineStopped,
    #[error("engine task panicked: {0}")]
    TaskPanicked(String),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Receives every error that is reported by the engine or by caller-side validation.
///
/// The channel is process-wide for a [`Context`] and must be provided when starting it.
///
/// [`Context`]: crate::Context
#[derive(Clone)]
pub struct ErrorChannel {
    notify: Arc<dyn Fn(&str) + Send + Sync>,
}

impl ErrorChannel {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    /// Aborts the process on the first reported error.
    pub fn abort() -> Self {
        Self::new(|message| {
            eprintln!("fatal graphics error: {}", message);
            std::process::abort();
        })
    }

    pub fn report(&self, error: &Error) {
        tracing::error!("{}", error);
        (self.notify)(&error.to_string());
    }
}

impl Debug for ErrorChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorChannel").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gfx_tasks::QueueClass;
    use parking_lot::Mutex;

    use super::{Error, ErrorChannel};

    #[test]
    fn report_forwards_display_text() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let channel = ErrorChannel::new({
            let messages = messages.clone();
            move |msg| messages.lock().push(msg.to_owned())
        });

        channel.report(&Error::InvalidQueueCount {
            class: QueueClass::Compute,
            count: 2,
            max: 1,
        });

        assert_eq!(
            *messages.lock(),
            ["invalid number of compute queues: 2 (only 1 supported)"]
        );
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use gfx_hal::backend::headless::{BackendCall, CallLog, HeadlessBackend};
use gfx_hal::{Config, Context, ErrorChannel};
use parking_lot::Mutex;

pub struct Harness {
    pub context: Context,
    pub log: CallLog,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let log = CallLog::new();
        let errors = Arc::new(Mutex::new(Vec::new()));

        let channel = ErrorChannel::new({
            let errors = errors.clone();
            move |message| errors.lock().push(message.to_owned())
        });

        let context = Context::start(config, channel, {
            let log = log.clone();
            move || HeadlessBackend::with_log(log)
        })
        .unwrap();

        Self {
            context,
            log,
            errors,
        }
    }

    /// Waits for all queued work and returns the calls made since the last call.
    pub fn flush(&self) -> Vec<BackendCall> {
        self.context.wait_all_queues_empty();
        self.log.take()
    }

    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }
}

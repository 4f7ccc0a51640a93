use std::sync::Arc;

use gfx_tasks::ExecutorState;
use gfx_tracing::trace_span;

use crate::backend::{Backend, Limits};
use crate::binding::BindingState;
use crate::error::{Error, ErrorChannel};
use crate::pipeline_cache::ProgramCache;
use crate::types::{ClearValues, DrawIndexed, DrawPrimitive, DrawVertices};

/// The state owned by the engine thread.
///
/// Every task enqueued on a [`Context`] receives exclusive access to the engine state. It is
/// the only way to reach the [`Backend`].
///
/// [`Context`]: crate::Context
pub struct EngineState {
    backend: Box<dyn Backend>,
    limits: Limits,
    pub(crate) bindings: BindingState,
    pub(crate) programs: Arc<ProgramCache>,
    pub(crate) errors: ErrorChannel,
}

impl EngineState {
    pub(crate) fn new(
        backend: Box<dyn Backend>,
        programs: Arc<ProgramCache>,
        errors: ErrorChannel,
    ) -> Self {
        Self {
            limits: backend.limits(),
            backend,
            bindings: BindingState::default(),
            programs,
            errors,
        }
    }

    #[inline]
    pub fn backend(&mut self) -> &mut dyn Backend {
        &mut *self.backend
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub(crate) fn report(&self, error: Error) {
        self.errors.report(&error);
    }

    /// Applies all pending binding changes. Returns `false` if the draw must be skipped.
    fn apply_bindings(&mut self) -> bool {
        self.bindings
            .apply(&mut *self.backend, &self.programs, &self.errors)
    }

    pub(crate) fn draw_vertices(&mut self, primitive: DrawPrimitive, draw: DrawVertices) {
        let _span = trace_span!("EngineState::draw_vertices").entered();

        if self.apply_bindings() {
            self.backend.draw_arrays(primitive, draw);
        }
    }

    pub(crate) fn draw_indexed(&mut self, primitive: DrawPrimitive, draw: DrawIndexed) {
        let _span = trace_span!("EngineState::draw_indexed").entered();

        if self.apply_bindings() {
            self.backend.draw_elements(primitive, draw);
        }
    }

    pub(crate) fn clear(&mut self, values: ClearValues) {
        // The clear targets the bound frame buffer, which may not have been applied yet.
        self.bindings.apply_frame_buffer(&mut *self.backend);
        self.backend.clear(&values);
    }

    /// Drops all bound handles.
    pub(crate) fn reset_bindings(&mut self) {
        self.bindings = BindingState::default();
    }
}

impl ExecutorState for EngineState {
    fn task_panicked(&mut self, message: &str) {
        self.report(Error::TaskPanicked(message.to_owned()));
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        self.reset_bindings();

        let programs = self.programs.drain();
        tracing::debug!("deleting {} programs", programs.len());
        for program in programs {
            self.backend.delete_program(program);
        }
    }
}

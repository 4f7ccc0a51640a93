#[doc(hidden)]
pub use tracing;

/// Creates a new [`Span`] with the given `name` at the current callsite.
#[macro_export]
macro_rules! trace_span {
    ($name:expr) => {{
        $crate::span::Span {
            inner: $crate::span::tracing::span!($crate::span::tracing::Level::TRACE, $name),
        }
    }};
}

/// A `Span` represents a zone of time in which an operation is being run.
#[derive(Clone, Debug)]
pub struct Span {
    #[doc(hidden)]
    pub inner: tracing::span::Span,
}

impl Span {
    /// Enters this span.
    pub fn entered(self) -> EnteredSpan {
        EnteredSpan {
            _inner: self.inner.entered(),
        }
    }
}

/// A handle to a [`Span`] that is currently active.
///
/// The span is exited when the `EnteredSpan` is dropped.
#[derive(Debug)]
#[must_use = "the span is exited immediately if the guard is not held"]
pub struct EnteredSpan {
    _inner: tracing::span::EnteredSpan,
}

#[cfg(test)]
mod tests {
    #[test]
    fn span_enter_without_subscriber() {
        let span = trace_span!("span_enter_without_subscriber");
        let guard = span.clone().entered();
        drop(guard);

        let _guard = span.entered();
    }
}

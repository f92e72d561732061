use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture};

use rum_session::SessionIdSource;

use crate::span::SpanData;

/// Hooks into the span lifecycle.
///
/// Processors only see recording spans. `on_start` may add attributes before the span is handed
/// to instrumentation code.
pub trait SpanProcessor: Send + Sync {
    /// Called when a span starts.
    fn on_start(&self, span: &mut SpanData);

    /// Called when a span ends.
    fn on_end(&self, span: &SpanData);

    /// Exports all spans that ended so far.
    fn force_flush(&self) -> BoxFuture<'static, ()> {
        Box::pin(future::ready(()))
    }

    /// Flushes and releases resources.
    fn shutdown(&self) -> BoxFuture<'static, ()> {
        self.force_flush()
    }
}

impl<P: SpanProcessor + ?Sized> SpanProcessor for Arc<P> {
    fn on_start(&self, span: &mut SpanData) {
        (**self).on_start(span)
    }

    fn on_end(&self, span: &SpanData) {
        (**self).on_end(span)
    }

    fn force_flush(&self) -> BoxFuture<'static, ()> {
        (**self).force_flush()
    }

    fn shutdown(&self) -> BoxFuture<'static, ()> {
        (**self).shutdown()
    }
}

/// Counts every span start as user activity, extending the current session.
pub struct SessionSpanProcessor {
    session: Arc<dyn SessionIdSource>,
}

impl SessionSpanProcessor {
    /// Creates the processor.
    pub fn new(session: Arc<dyn SessionIdSource>) -> Self {
        Self { session }
    }
}

impl SpanProcessor for SessionSpanProcessor {
    fn on_start(&self, _: &mut SpanData) {
        self.session.record_activity(true);
    }

    fn on_end(&self, _: &SpanData) {}
}

impl fmt::Debug for SessionSpanProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSpanProcessor").finish_non_exhaustive()
    }
}

/// Logs every ended span at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSpanProcessor;

impl SpanProcessor for LoggingSpanProcessor {
    fn on_start(&self, _: &mut SpanData) {}

    fn on_end(&self, span: &SpanData) {
        let duration = span
            .end_time
            .map(|end| end.saturating_duration_since(span.start_time));

        rum_log::debug!(
            name = span.name,
            trace_id = span.context.trace_id,
            span_id = span.context.span_id,
            scope = span.scope.name,
            ?duration,
            attributes = ?span.attributes,
            "span ended"
        );
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;

use rum_common::{Attributes, Clock, Resource, SystemClock, generate_id};
use rum_sampling::{AlwaysOnSampler, Sampler, SamplingParameters};

use crate::processor::SpanProcessor;
use crate::span::{InstrumentationScope, Span, SpanBuilder, SpanContext, SpanData};

pub(crate) struct ProviderInner {
    sampler: Box<dyn Sampler>,
    processors: Vec<Box<dyn SpanProcessor>>,
    pub(crate) clock: Arc<dyn Clock>,
    resource: Resource,
    is_shutdown: AtomicBool,
}

impl ProviderInner {
    pub(crate) fn on_end(&self, span: &SpanData) {
        for processor in &self.processors {
            processor.on_end(span);
        }
    }
}

/// Builder for a [`TracerProvider`].
#[derive(Default)]
pub struct TracerProviderBuilder {
    sampler: Option<Box<dyn Sampler>>,
    processors: Vec<Box<dyn SpanProcessor>>,
    clock: Option<Arc<dyn Clock>>,
    resource: Option<Resource>,
}

impl TracerProviderBuilder {
    /// Sets the sampler. Defaults to [`AlwaysOnSampler`].
    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Appends a span processor. Processors run in the order they were added.
    pub fn with_processor(mut self, processor: impl SpanProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Sets the clock used for span timestamps. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the resource describing this page instance.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Creates the provider.
    pub fn build(self) -> TracerProvider {
        TracerProvider {
            inner: Arc::new(ProviderInner {
                sampler: self.sampler.unwrap_or_else(|| Box::new(AlwaysOnSampler)),
                processors: self.processors,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                resource: self.resource.unwrap_or_default(),
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}

/// Creates tracers and owns the span pipeline.
///
/// Clones share the same pipeline.
#[derive(Clone)]
pub struct TracerProvider {
    inner: Arc<ProviderInner>,
}

impl TracerProvider {
    /// Returns a builder for a provider.
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Returns a tracer for the given instrumentation.
    pub fn tracer(&self, name: impl Into<String>, version: impl Into<String>) -> Tracer {
        Tracer {
            provider: Arc::clone(&self.inner),
            scope: InstrumentationScope {
                name: name.into(),
                version: version.into(),
            },
        }
    }

    /// Returns the resource.
    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    /// Flushes all processors.
    pub async fn force_flush(&self) {
        join_all(self.inner.processors.iter().map(|p| p.force_flush())).await;
    }

    /// Shuts down all processors. Spans started afterwards are non-recording.
    pub async fn shutdown(&self) {
        if self.inner.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        join_all(self.inner.processors.iter().map(|p| p.shutdown())).await;
        rum_log::debug!("tracer provider shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TracerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerProvider")
            .field("sampler", &self.inner.sampler.description())
            .field("processors", &self.inner.processors.len())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Starts spans on behalf of one instrumentation.
#[derive(Clone)]
pub struct Tracer {
    provider: Arc<ProviderInner>,
    scope: InstrumentationScope,
}

impl Tracer {
    /// Returns the instrumentation scope of this tracer.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Starts a root span without initial attributes.
    pub fn start_span(&self, name: impl Into<String>) -> Span {
        self.build(SpanBuilder::new(name))
    }

    /// Starts a span described by `builder`.
    ///
    /// The sampler decides whether the span records. Recording spans are passed to every
    /// processor's `on_start` before they are returned.
    pub fn build(&self, builder: SpanBuilder) -> Span {
        let SpanBuilder {
            name,
            attributes,
            parent,
        } = builder;

        let trace_id = match &parent {
            Some(parent) => parent.trace_id.clone(),
            None => generate_id(128),
        };

        let provider = &self.provider;
        if provider.is_shutdown.load(Ordering::SeqCst) {
            return Span::non_recording(SpanContext::new(trace_id, false));
        }

        let result = provider.sampler.should_sample(&SamplingParameters {
            trace_id: &trace_id,
            name: &name,
            attributes: &attributes,
        });

        if !result.decision.is_recording() {
            return Span::non_recording(SpanContext::new(trace_id, false));
        }

        let mut all_attributes: Attributes = attributes;
        all_attributes.extend(result.attributes);

        let mut data = SpanData {
            name,
            context: SpanContext::new(trace_id, true),
            parent_span_id: parent.map(|parent| parent.span_id),
            start_time: provider.clock.now(),
            end_time: None,
            attributes: all_attributes,
            scope: self.scope.clone(),
        };

        for processor in &provider.processors {
            processor.on_start(&mut data);
        }

        Span::recording(data, Arc::clone(provider))
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").field("scope", &self.scope).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use rum_common::{ManualClock, UnixMillis};
    use rum_sampling::AlwaysOffSampler;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        started: Arc<Mutex<Vec<String>>>,
        ended: Arc<Mutex<Vec<SpanData>>>,
    }

    impl SpanProcessor for Recorder {
        fn on_start(&self, span: &mut SpanData) {
            span.attributes.insert("seen".to_owned(), true.into());
            self.started.lock().push(span.name.clone());
        }

        fn on_end(&self, span: &SpanData) {
            self.ended.lock().push(span.clone());
        }
    }

    #[test]
    fn test_span_lifecycle() {
        let clock = ManualClock::new(UnixMillis::from_millis(1_000));
        let recorder = Recorder::default();
        let provider = TracerProvider::builder()
            .with_processor(recorder.clone())
            .with_clock(Arc::new(clock.clone()))
            .build();

        let tracer = provider.tracer("test", "1.0");
        let mut span = tracer.start_span("work");
        span.set_attribute("key", "value");
        clock.advance(Duration::from_millis(250));
        span.end();
        span.end();

        assert_eq!(*recorder.started.lock(), vec!["work"]);
        let ended = recorder.ended.lock();
        assert_eq!(ended.len(), 1);

        let data = &ended[0];
        assert_eq!(data.start_time, UnixMillis::from_millis(1_000));
        assert_eq!(data.end_time, Some(UnixMillis::from_millis(1_250)));
        assert_eq!(data.attribute("seen"), Some(&true.into()));
        assert_eq!(data.attribute("key"), Some(&"value".into()));
        assert_eq!(data.scope.name, "test");
        assert_eq!(data.context.trace_id.len(), 32);
        assert_eq!(data.context.span_id.len(), 16);
    }

    #[test]
    fn test_sampled_out_span_skips_processors() {
        let recorder = Recorder::default();
        let provider = TracerProvider::builder()
            .with_sampler(AlwaysOffSampler)
            .with_processor(recorder.clone())
            .build();

        let mut span = provider.tracer("test", "1.0").start_span("dropped");
        assert!(!span.is_recording());
        assert!(!span.context().is_sampled);
        span.set_attribute("ignored", 1i64);
        assert!(span.data().is_none());
        drop(span);

        assert!(recorder.started.lock().is_empty());
        assert!(recorder.ended.lock().is_empty());
    }

    #[test]
    fn test_drop_ends_span() {
        let recorder = Recorder::default();
        let provider = TracerProvider::builder()
            .with_processor(recorder.clone())
            .build();

        drop(provider.tracer("test", "1.0").start_span("dropped"));
        assert_eq!(recorder.ended.lock().len(), 1);
    }

    #[test]
    fn test_child_span_shares_trace() {
        let recorder = Recorder::default();
        let provider = TracerProvider::builder()
            .with_processor(recorder.clone())
            .build();
        let tracer = provider.tracer("test", "1.0");

        let parent = tracer.start_span("parent");
        let builder = SpanBuilder::new("child").with_parent(parent.context().clone());
        let mut child = tracer.build(builder);
        child.end();

        let ended = recorder.ended.lock();
        assert_eq!(ended[0].context.trace_id, parent.context().trace_id);
        assert_eq!(
            ended[0].parent_span_id.as_deref(),
            Some(parent.context().span_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_recording() {
        let provider = TracerProvider::builder().build();
        let tracer = provider.tracer("test", "1.0");

        provider.shutdown().await;
        assert!(provider.is_shutdown());
        assert!(!tracer.start_span("late").is_recording());
    }
}

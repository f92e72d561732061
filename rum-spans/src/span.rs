use std::fmt;
use std::sync::Arc;

use rum_common::{AttributeValue, Attributes, UnixMillis, generate_id};

use crate::tracer::ProviderInner;

/// Identifies a span within a trace.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SpanContext {
    /// 128-bit trace id as 32 lowercase hex characters.
    pub trace_id: String,
    /// 64-bit span id as 16 lowercase hex characters.
    pub span_id: String,
    /// Whether the span was sampled.
    pub is_sampled: bool,
}

impl SpanContext {
    pub(crate) fn new(trace_id: String, is_sampled: bool) -> Self {
        Self {
            trace_id,
            span_id: generate_id(64),
            is_sampled,
        }
    }
}

/// The library that created a span.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstrumentationScope {
    /// Name of the instrumentation, for example `splunk.rr-web`.
    pub name: String,
    /// Version of the instrumentation.
    pub version: String,
}

/// The recorded state of a span.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Name of the span.
    pub name: String,
    /// Trace and span id.
    pub context: SpanContext,
    /// Span id of the parent span, if any.
    pub parent_span_id: Option<String>,
    /// Start timestamp.
    pub start_time: UnixMillis,
    /// End timestamp, `None` while the span is running.
    pub end_time: Option<UnixMillis>,
    /// Span attributes.
    pub attributes: Attributes,
    /// The tracer that created the span.
    pub scope: InstrumentationScope,
}

impl SpanData {
    /// Returns the value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Describes a span before it is started.
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    /// Name of the span.
    pub name: String,
    /// Attributes the span starts with. The sampler sees these.
    pub attributes: Attributes,
    /// Parent span. Without a parent the span starts a new trace.
    pub parent: Option<SpanContext>,
}

impl SpanBuilder {
    /// Creates a builder for a root span named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the initial attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the parent span.
    pub fn with_parent(mut self, parent: SpanContext) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// A running span.
///
/// Spans that were sampled out are non-recording: all mutations are no-ops and ending them does
/// not reach any processor. A span that is dropped without calling [`end`](Self::end) is ended
/// on drop.
pub struct Span {
    context: SpanContext,
    recording: Option<(SpanData, Arc<ProviderInner>)>,
}

impl Span {
    pub(crate) fn recording(data: SpanData, provider: Arc<ProviderInner>) -> Self {
        Self {
            context: data.context.clone(),
            recording: Some((data, provider)),
        }
    }

    pub(crate) fn non_recording(context: SpanContext) -> Self {
        Self {
            context,
            recording: None,
        }
    }

    /// Returns the span's context.
    pub fn context(&self) -> &SpanContext {
        &self.context
    }

    /// Returns `true` if the span records attributes and will be exported.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Sets an attribute, replacing a previous value with the same key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        if let Some((data, _)) = &mut self.recording {
            data.attributes.insert(key.into(), value.into());
        }
    }

    /// Returns the recorded data, or `None` for non-recording spans.
    pub fn data(&self) -> Option<&SpanData> {
        self.recording.as_ref().map(|(data, _)| data)
    }

    /// Ends the span and hands it to the span processors.
    ///
    /// Ending a span a second time has no effect.
    pub fn end(&mut self) {
        if let Some((mut data, provider)) = self.recording.take() {
            data.end_time = Some(provider.clock.now());
            provider.on_end(&data);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.end();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("context", &self.context)
            .field("data", &self.data())
            .finish()
    }
}

//! Spans of the rum telemetry pipeline.
//!
//! A [`TracerProvider`] owns the sampler and the chain of [`SpanProcessor`]s. Spans are started
//! through a [`Tracer`]; the sampler decides at start whether a span is recording, and every
//! processor sees recording spans when they start and when they end.
//!
//! The processors in this crate implement the rum specific parts of the pipeline:
//!
//!  - [`SpanAttributesProcessor`] stamps the current session id, the anonymous user id and
//!    global attributes onto every span.
//!  - [`SessionSpanProcessor`] counts every span start as session activity.
//!  - [`BatchSpanProcessor`] batches ended spans for export as OTLP JSON.
//!  - [`LoggingSpanProcessor`] dumps ended spans to the debug log.
//!
//! # Example
//!
//! ```
//! use rum_spans::TracerProvider;
//!
//! let provider = TracerProvider::builder().build();
//! let tracer = provider.tracer("example", "1.0");
//!
//! let mut span = tracer.start_span("page load");
//! span.set_attribute("page", "/");
//! assert!(span.is_recording());
//! span.end();
//! ```
#![warn(missing_docs)]

mod attributes;
mod batch;
mod otlp;
mod processor;
mod span;
mod tracer;

pub use self::attributes::*;
pub use self::batch::*;
pub use self::processor::*;
pub use self::span::*;
pub use self::tracer::*;

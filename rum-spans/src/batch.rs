use std::fmt;

use futures::future::BoxFuture;

use rum_export::{BatchConfig, BatchProcessor, Exporter};

use crate::processor::SpanProcessor;
use crate::span::SpanData;

/// Batches ended spans and exports them.
///
/// This is a span processor over the generic [`BatchProcessor`]: ending a span only enqueues it,
/// flushes happen in the background.
pub struct BatchSpanProcessor {
    processor: BatchProcessor<SpanData>,
}

impl BatchSpanProcessor {
    /// Starts the batch service. Must be called within a tokio runtime.
    pub fn new<E: Exporter<SpanData>>(config: BatchConfig, exporter: E) -> Self {
        Self {
            processor: BatchProcessor::start(config, exporter),
        }
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_start(&self, _: &mut SpanData) {}

    fn on_end(&self, span: &SpanData) {
        if span.context.is_sampled {
            self.processor.emit(span.clone());
        }
    }

    fn force_flush(&self) -> BoxFuture<'static, ()> {
        let processor = self.processor.clone();
        Box::pin(async move { processor.force_flush().await })
    }

    fn shutdown(&self) -> BoxFuture<'static, ()> {
        let processor = self.processor.clone();
        Box::pin(async move { processor.shutdown().await })
    }
}

impl fmt::Debug for BatchSpanProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSpanProcessor")
            .field("processor", &self.processor)
            .finish()
    }
}

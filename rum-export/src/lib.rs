//! Batching and export of rum telemetry.
//!
//! Records are handed to a [`BatchProcessor`], which accumulates them in a background service
//! and flushes a batch when it is full, when the oldest record waited for the scheduled delay, or
//! on an explicit [`force_flush`](BatchProcessor::force_flush). Each batch goes to an
//! [`Exporter`], typically an [`OtlpExporter`] that encodes it as OTLP JSON and hands it to a
//! [`Transport`].
//!
//! Export is best effort. Failed exports are logged and dropped, unless the transport is wrapped
//! in a [`PersistentTransport`], which keeps payloads in storage until they have been sent.
//!
//! # Example
//!
//! ```
//! use rum_export::{BatchConfig, BatchProcessor, LogRecord, MemoryTransport, OtlpExporter};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let transport = MemoryTransport::new();
//! let exporter = OtlpExporter::<LogRecord>::new(
//!     "https://rum.example.com/v1/logs".to_owned(),
//!     Default::default(),
//!     std::sync::Arc::new(transport.clone()),
//!     std::sync::Arc::new(rum_common::Resource::default()),
//! );
//!
//! let processor = BatchProcessor::start(BatchConfig::default(), exporter);
//! processor.emit(LogRecord::new(1.0, "hello", Default::default()));
//! processor.force_flush().await;
//!
//! assert_eq!(transport.requests().len(), 1);
//! # });
//! ```
#![warn(missing_docs)]

mod batch;
mod error;
mod exporter;
mod log;
mod persistent;
mod transport;

pub use self::batch::*;
pub use self::error::*;
pub use self::exporter::*;
pub use self::log::*;
pub use self::persistent::*;
pub use self::transport::*;

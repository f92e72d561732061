use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use rum_system::{
    Addr, AsyncResponse, FromMessage, Interface, NoResponse, Receiver, Sender, Service,
};

use crate::exporter::Exporter;

/// Controls when a [`BatchProcessor`] flushes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchConfig {
    /// A batch is flushed as soon as it holds this many records.
    pub max_export_batch_size: usize,
    /// A batch is flushed this long after its first record arrived.
    pub scheduled_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_export_batch_size: 50,
            scheduled_delay: Duration::from_millis(4_000),
        }
    }
}

/// Adds a record to the current batch.
#[derive(Debug)]
pub struct Emit<T>(pub T);

/// Flushes the current batch and resolves once all pending exports have finished.
#[derive(Debug)]
pub struct ForceFlush;

/// Flushes the current batch, waits for all pending exports and stops the service.
#[derive(Debug)]
pub struct Shutdown;

/// Service interface of the [`BatchService`].
#[derive(Debug)]
pub enum Batch<T> {
    /// Adds a record to the current batch.
    Emit(T),
    /// Flushes the current batch.
    ForceFlush(ForceFlush, Sender<()>),
    /// Flushes the current batch and stops.
    Shutdown(Shutdown, Sender<()>),
}

impl<T: Send + 'static> Interface for Batch<T> {}

impl<T: Send + 'static> FromMessage<Emit<T>> for Batch<T> {
    type Response = NoResponse;

    fn from_message(message: Emit<T>, _: ()) -> Self {
        Self::Emit(message.0)
    }
}

impl<T: Send + 'static> FromMessage<ForceFlush> for Batch<T> {
    type Response = AsyncResponse<()>;

    fn from_message(message: ForceFlush, sender: Sender<()>) -> Self {
        Self::ForceFlush(message, sender)
    }
}

impl<T: Send + 'static> FromMessage<Shutdown> for Batch<T> {
    type Response = AsyncResponse<()>;

    fn from_message(message: Shutdown, sender: Sender<()>) -> Self {
        Self::Shutdown(message, sender)
    }
}

#[derive(Clone, Copy, Debug)]
enum FlushReason {
    Size,
    Timeout,
    Forced,
    Shutdown,
}

/// Service accumulating records and handing batches to an [`Exporter`].
///
/// The service cycles between accumulating and flushing. A flush hands the whole current batch to
/// a spawned export task and immediately starts a new, empty batch, so emitting never waits for
/// the network.
pub struct BatchService<T, E> {
    config: BatchConfig,
    exporter: Arc<E>,
    batch: Vec<T>,
    deadline: Option<Instant>,
    in_flight: Vec<JoinHandle<()>>,
}

impl<T, E> BatchService<T, E>
where
    T: Send + 'static,
    E: Exporter<T>,
{
    /// Creates a new batch service exporting to `exporter`.
    pub fn new(config: BatchConfig, exporter: E) -> Self {
        Self {
            config,
            exporter: Arc::new(exporter),
            batch: Vec::new(),
            deadline: None,
            in_flight: Vec::new(),
        }
    }

    fn handle_emit(&mut self, record: T) {
        if self.batch.is_empty() {
            self.deadline = Some(Instant::now() + self.config.scheduled_delay);
        }

        self.batch.push(record);

        if self.batch.len() >= self.config.max_export_batch_size {
            self.flush(FlushReason::Size);
        }
    }

    fn flush(&mut self, reason: FlushReason) {
        self.deadline = None;
        self.in_flight.retain(|handle| !handle.is_finished());

        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        rum_log::trace!(?reason, "flushing batch of {} records", batch.len());

        let exporter = Arc::clone(&self.exporter);
        self.in_flight.push(tokio::spawn(async move {
            if let Err(error) = exporter.export(batch).await {
                rum_log::warn!(
                    error = &error as &dyn std::error::Error,
                    "failed to export batch"
                );
            }
        }));
    }

    /// Flushes and responds once every export started so far has finished.
    fn flush_and_wait(&mut self, reason: FlushReason, sender: Sender<()>) {
        self.flush(reason);

        let pending = std::mem::take(&mut self.in_flight);
        tokio::spawn(async move {
            join_all(pending).await;
            sender.send(());
        });
    }

    fn handle_message(&mut self, message: Batch<T>) -> bool {
        match message {
            Batch::Emit(record) => self.handle_emit(record),
            Batch::ForceFlush(ForceFlush, sender) => {
                self.flush_and_wait(FlushReason::Forced, sender)
            }
            Batch::Shutdown(Shutdown, sender) => {
                self.flush_and_wait(FlushReason::Shutdown, sender);
                return false;
            }
        }

        true
    }
}

impl<T, E> Service for BatchService<T, E>
where
    T: Send + 'static,
    E: Exporter<T>,
{
    type Interface = Batch<T>;

    fn spawn_handler(mut self, mut rx: Receiver<Self::Interface>) {
        tokio::spawn(async move {
            loop {
                let deadline = self.deadline;
                let timer = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now));

                tokio::select! {
                    biased;

                    message = rx.recv() => match message {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => {
                            self.flush(FlushReason::Shutdown);
                            break;
                        }
                    },
                    _ = timer, if deadline.is_some() => {
                        self.flush(FlushReason::Timeout);
                    }
                }
            }

            rum_log::debug!("batch service stopped");
        });
    }
}

impl<T, E> fmt::Debug for BatchService<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchService")
            .field("config", &self.config)
            .field("batch_len", &self.batch.len())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Producer handle of a running [`BatchService`].
///
/// Emitting is synchronous and never fails visibly. Once the service stopped, records are
/// dropped.
pub struct BatchProcessor<T: Send + 'static> {
    addr: Addr<Batch<T>>,
}

impl<T: Send + 'static> BatchProcessor<T> {
    /// Starts a batch service in the current tokio runtime.
    pub fn start<E: Exporter<T>>(config: BatchConfig, exporter: E) -> Self {
        Self {
            addr: BatchService::new(config, exporter).start(),
        }
    }

    /// Creates a processor from the address of a running service.
    pub fn from_addr(addr: Addr<Batch<T>>) -> Self {
        Self { addr }
    }

    /// Adds a record to the current batch.
    pub fn emit(&self, record: T) {
        self.addr.send(Emit(record));
    }

    /// Flushes the current batch and waits for all pending exports.
    pub async fn force_flush(&self) {
        if self.addr.send(ForceFlush).await.is_err() {
            rum_log::debug!("batch service already stopped, nothing to flush");
        }
    }

    /// Flushes the current batch, waits for all pending exports and stops the service.
    pub async fn shutdown(&self) {
        self.addr.send(Shutdown).await.ok();
    }

    /// Returns `true` if the service is no longer accepting records.
    pub fn is_closed(&self) -> bool {
        self.addr.is_closed()
    }
}

impl<T: Send + 'static> Clone for BatchProcessor<T> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for BatchProcessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("addr", &self.addr)
            .finish()
    }
}

/// Receives log records from the recorder pipeline.
pub trait LogSink: Send + Sync {
    /// Queues a record for export. Must not block.
    fn emit(&self, record: crate::LogRecord);
}

impl LogSink for BatchProcessor<crate::LogRecord> {
    fn emit(&self, record: crate::LogRecord) {
        BatchProcessor::emit(self, record)
    }
}

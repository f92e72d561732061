use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::TransportError;

/// A single encoded export, ready to be sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportRequest {
    /// The collector URL.
    pub url: String,
    /// Request headers, such as `Authorization`.
    pub headers: BTreeMap<String, String>,
    /// The encoded payload.
    pub body: Bytes,
}

/// Sends encoded payloads to the collector.
///
/// This is the network capability of the host, usually `fetch` with `keepalive` or
/// `navigator.sendBeacon`. Implementations apply their own network timeouts. A returned future
/// is never cancelled by the pipeline.
pub trait Transport: Send + Sync {
    /// Sends the request and resolves once the collector accepted or rejected it.
    fn send(&self, request: ExportRequest) -> BoxFuture<'static, Result<(), TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: ExportRequest) -> BoxFuture<'static, Result<(), TransportError>> {
        (**self).send(request)
    }
}

#[derive(Debug, Default)]
struct MemoryTransportState {
    requests: Vec<ExportRequest>,
    failures: VecDeque<TransportError>,
}

/// A [`Transport`] that keeps requests in memory.
///
/// Clones share their state. Failures queued with [`fail_next`](Self::fail_next) are returned by
/// subsequent sends, in order, without recording the request.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryTransportState>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.state.lock().failures.push_back(error);
    }

    /// Returns all successfully sent requests.
    pub fn requests(&self) -> Vec<ExportRequest> {
        self.state.lock().requests.clone()
    }

    /// Removes and returns all successfully sent requests.
    pub fn take_requests(&self) -> Vec<ExportRequest> {
        std::mem::take(&mut self.state.lock().requests)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: ExportRequest) -> BoxFuture<'static, Result<(), TransportError>> {
        let mut state = self.state.lock();
        let result = match state.failures.pop_front() {
            Some(error) => Err(error),
            None => {
                state.requests.push(request);
                Ok(())
            }
        };

        Box::pin(futures::future::ready(result))
    }
}

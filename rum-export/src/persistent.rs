use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use data_encoding::BASE64;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rum_common::{KeyValueStorage, StorageError, generate_id};

use crate::error::TransportError;
use crate::transport::{ExportRequest, Transport};

/// Storage key of the persistent export queue.
pub const EXPORT_QUEUE_KEY: &str = "_rum_export_queue";

/// Default number of staged requests kept in storage.
pub const DEFAULT_MAX_QUEUED_REQUESTS: usize = 100;

/// A staged request as persisted in storage.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct QueueEntry {
    id: String,
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// Base64 encoded payload.
    body: String,
}

impl QueueEntry {
    fn new(request: &ExportRequest) -> Self {
        Self {
            id: generate_id(64),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: BASE64.encode(&request.body),
        }
    }

    fn to_request(&self) -> Option<ExportRequest> {
        let body = BASE64.decode(self.body.as_bytes()).ok()?;
        Some(ExportRequest {
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: body.into(),
        })
    }
}

struct Shared {
    inner: Arc<dyn Transport>,
    storage: Arc<dyn KeyValueStorage>,
    max_entries: usize,
    /// Ids of staged entries that are currently being sent by this instance.
    ///
    /// The lock also serializes read-modify-write cycles of the stored queue.
    in_flight: Mutex<HashSet<String>>,
}

impl Shared {
    fn load(&self) -> Vec<QueueEntry> {
        let Some(raw) = self.storage.get_item(EXPORT_QUEUE_KEY) else {
            return Vec::new();
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                rum_log::warn!(
                    error = &error as &dyn std::error::Error,
                    "discarding corrupted export queue"
                );
                self.storage.remove_item(EXPORT_QUEUE_KEY);
                Vec::new()
            }
        }
    }

    fn store(&self, entries: &[QueueEntry]) -> Result<(), StorageError> {
        if entries.is_empty() {
            self.storage.remove_item(EXPORT_QUEUE_KEY);
            return Ok(());
        }

        let raw = serde_json::to_string(entries)
            .map_err(|error| StorageError::Unavailable(error.to_string()))?;
        self.storage.set_item(EXPORT_QUEUE_KEY, &raw)
    }

    /// Appends an entry, dropping the oldest entries beyond the bound.
    fn stage(&self, entry: QueueEntry) -> Result<(), StorageError> {
        let mut in_flight = self.in_flight.lock();

        let mut entries = self.load();
        entries.push(entry);
        let excess = entries.len().saturating_sub(self.max_entries);
        if excess > 0 {
            rum_log::debug!("export queue full, dropping {excess} oldest requests");
            entries.drain(..excess);
        }

        let result = self.store(&entries);
        if let Some(entry) = entries.last() {
            in_flight.insert(entry.id.clone());
        }
        result
    }

    /// Marks a send as finished and removes the entry on success.
    fn complete(&self, id: &str, result: &Result<(), TransportError>) {
        let mut in_flight = self.in_flight.lock();
        in_flight.remove(id);

        if result.is_err() {
            return;
        }

        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() != before && self.store(&entries).is_err() {
            rum_log::debug!("failed to remove sent request from export queue");
        }
    }

    /// Claims all staged entries that are not being sent right now.
    fn claim_pending(&self) -> Vec<(String, ExportRequest)> {
        let mut in_flight = self.in_flight.lock();

        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|entry| entry.to_request().is_some());
        if entries.len() != before {
            rum_log::warn!("dropping undecodable requests from export queue");
            self.store(&entries).ok();
        }

        entries
            .into_iter()
            .filter_map(|entry| {
                if in_flight.contains(&entry.id) {
                    return None;
                }
                let request = entry.to_request()?;
                in_flight.insert(entry.id.clone());
                Some((entry.id, request))
            })
            .collect()
    }
}

/// A [`Transport`] that stages every request in storage until it has been sent.
///
/// Requests are written to a queue under [`EXPORT_QUEUE_KEY`] before they are handed to the inner
/// transport and removed once the collector accepted them. Requests that were staged but never
/// confirmed, because the send failed or the page unloaded first, are sent again by
/// [`resend_pending`](Self::resend_pending).
///
/// This layer is best effort. If staging fails, for example because the storage quota is
/// exceeded, the request is sent anyway. Requests may be delivered more than once.
#[derive(Clone)]
pub struct PersistentTransport {
    shared: Arc<Shared>,
}

impl PersistentTransport {
    /// Creates a persistent transport with the default queue bound.
    pub fn new(inner: Arc<dyn Transport>, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_max_entries(inner, storage, DEFAULT_MAX_QUEUED_REQUESTS)
    }

    /// Creates a persistent transport keeping at most `max_entries` staged requests.
    pub fn with_max_entries(
        inner: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStorage>,
        max_entries: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner,
                storage,
                max_entries: max_entries.max(1),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Returns the number of requests currently staged in storage.
    pub fn pending(&self) -> usize {
        let _guard = self.shared.in_flight.lock();
        self.shared.load().len()
    }

    /// Sends all staged requests that are not currently in flight.
    ///
    /// Call this on startup and from a retry timer. Returns the number of requests that were
    /// delivered successfully.
    pub fn resend_pending(&self) -> BoxFuture<'static, usize> {
        let shared = Arc::clone(&self.shared);
        let pending = shared.claim_pending();

        if !pending.is_empty() {
            rum_log::debug!("resending {} staged export requests", pending.len());
        }

        Box::pin(async move {
            let mut delivered = 0;

            for (id, request) in pending {
                let result = shared.inner.send(request).await;
                if result.is_ok() {
                    delivered += 1;
                }
                shared.complete(&id, &result);
            }

            delivered
        })
    }
}

impl Transport for PersistentTransport {
    fn send(&self, request: ExportRequest) -> BoxFuture<'static, Result<(), TransportError>> {
        let entry = QueueEntry::new(&request);
        let id = entry.id.clone();

        if let Err(error) = self.shared.stage(entry) {
            rum_log::warn!(
                error = &error as &dyn std::error::Error,
                "failed to stage export request, sending without persistence"
            );
        }

        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let result = shared.inner.send(request).await;
            shared.complete(&id, &result);
            result
        })
    }
}

impl fmt::Debug for PersistentTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentTransport")
            .field("max_entries", &self.shared.max_entries)
            .field("in_flight", &self.shared.in_flight.lock().len())
            .finish()
    }
}

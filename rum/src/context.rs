use std::fmt;
use std::sync::Arc;

use rum_common::{Clock, KeyValueStorage, MemoryStorage, SystemClock};
use rum_export::Transport;
use rum_replays::{PageVisibility, Recorder, VisibilityState};
use rum_session::{DocumentCookie, MemoryDocumentCookie};
use rum_spans::PageLocation;

/// The capabilities of the page the pipeline runs in.
///
/// Everything the pipeline needs from the browser is passed in here. Missing storage means the
/// pipeline does not run in a browser document and initialization fails.
pub struct BrowserContext {
    /// `document.cookie`.
    pub cookies: Option<Arc<dyn DocumentCookie>>,
    /// `window.localStorage`.
    pub local_storage: Option<Arc<dyn KeyValueStorage>>,
    /// Sends export requests to the collector.
    pub transport: Arc<dyn Transport>,
    /// `window.location`.
    pub location: Option<Arc<dyn PageLocation>>,
    /// `document.hidden`.
    pub visibility: Arc<dyn PageVisibility>,
    /// Wall clock time.
    pub clock: Arc<dyn Clock>,
    /// `navigator.userAgent`.
    pub user_agent: Option<String>,
    /// Id of the browser instance, if the host provides one.
    pub browser_instance_id: Option<String>,
    /// The session replay capture mechanism, started when recording is enabled.
    pub recorder: Option<Box<dyn Recorder>>,
}

impl BrowserContext {
    /// Creates a context with in-memory cookies, storage and visibility.
    pub fn in_memory(transport: Arc<dyn Transport>) -> Self {
        Self {
            cookies: Some(Arc::new(MemoryDocumentCookie::new())),
            local_storage: Some(Arc::new(MemoryStorage::new())),
            transport,
            location: None,
            visibility: Arc::new(VisibilityState::new()),
            clock: Arc::new(SystemClock),
            user_agent: None,
            browser_instance_id: None,
            recorder: None,
        }
    }
}

impl fmt::Debug for BrowserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserContext")
            .field("cookies", &self.cookies.is_some())
            .field("local_storage", &self.local_storage.is_some())
            .field("clock", &self.clock)
            .field("user_agent", &self.user_agent)
            .field("browser_instance_id", &self.browser_instance_id)
            .field("recorder", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use rum_common::constants::{ANONYMOUS_USER_ID, LOCATION_HREF, SESSION_ID};
use rum_common::{Attributes, Subscribers, SubscriptionId};
use rum_session::{AnonymousIdStore, SessionIdSource};

use crate::processor::SpanProcessor;
use crate::span::SpanData;

/// Provides the URL of the current page.
pub trait PageLocation: Send + Sync {
    /// Returns `location.href`.
    fn href(&self) -> Option<String>;
}

/// A [`PageLocation`] that always reports the same URL.
#[derive(Clone, Debug)]
pub struct StaticLocation(pub String);

impl PageLocation for StaticLocation {
    fn href(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Stamps session and user context onto every span at start.
///
/// Every span receives, in this order of precedence (later wins):
///
///  - `location.href` of the page,
///  - the global attributes: static ones from the configuration, overlaid by attributes set at
///    runtime with [`set_global_attributes`](Self::set_global_attributes),
///  - the current session id under `kloudmate.rumSessionId`,
///  - the anonymous user id under `user.anonymous_id` while anonymous tracking is on.
///
/// The session id is looked up for every span, so spans started after a session rotation carry
/// the new id.
pub struct SpanAttributesProcessor {
    static_attributes: Attributes,
    overlay: RwLock<Attributes>,
    session: Arc<dyn SessionIdSource>,
    location: Option<Arc<dyn PageLocation>>,
    anonymous_ids: Option<AnonymousIdStore>,
    anonymous_tracking: AtomicBool,
    changes: Subscribers<Attributes>,
}

impl SpanAttributesProcessor {
    /// Creates the processor with the static global attributes from the configuration.
    pub fn new(static_attributes: Attributes, session: Arc<dyn SessionIdSource>) -> Self {
        Self {
            static_attributes,
            overlay: RwLock::new(Attributes::new()),
            session,
            location: None,
            anonymous_ids: None,
            anonymous_tracking: AtomicBool::new(false),
            changes: Subscribers::new(),
        }
    }

    /// Sets the page location provider.
    pub fn with_location(mut self, location: Arc<dyn PageLocation>) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the store of the anonymous user id.
    pub fn with_anonymous_ids(mut self, anonymous_ids: AnonymousIdStore) -> Self {
        self.anonymous_ids = Some(anonymous_ids);
        self
    }

    /// Turns stamping of the anonymous user id on or off.
    pub fn set_anonymous_tracking(&self, enabled: bool) {
        self.anonymous_tracking.store(enabled, Ordering::Relaxed);
    }

    /// Returns the anonymous user id if anonymous tracking is on.
    pub fn anonymous_id(&self) -> Option<String> {
        if !self.anonymous_tracking.load(Ordering::Relaxed) {
            return None;
        }

        self.anonymous_ids.as_ref().map(AnonymousIdStore::get_or_create)
    }

    /// Returns the effective global attributes.
    pub fn get_global_attributes(&self) -> Attributes {
        let mut attributes = self.static_attributes.clone();
        attributes.extend(
            self.overlay
                .read()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        attributes
    }

    /// Merges `attributes` into the runtime global attributes.
    ///
    /// Keys replace static attributes of the same name. `None` removes all runtime attributes,
    /// the static ones remain. Subscribers are notified with the effective attributes after
    /// every call.
    pub fn set_global_attributes(&self, attributes: Option<Attributes>) {
        {
            let mut overlay = self.overlay.write();
            match attributes {
                Some(attributes) => overlay.extend(attributes),
                None => overlay.clear(),
            }
        }

        self.changes.notify(&self.get_global_attributes());
    }

    /// Registers a callback for changes of the global attributes.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Attributes) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }

    /// Removes a callback registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }
}

impl SpanProcessor for SpanAttributesProcessor {
    fn on_start(&self, span: &mut SpanData) {
        if let Some(href) = self.location.as_ref().and_then(|location| location.href()) {
            span.attributes.insert(LOCATION_HREF.to_owned(), href.into());
        }

        span.attributes.extend(self.get_global_attributes());

        if let Some(session_id) = self.session.session_id() {
            span.attributes
                .insert(SESSION_ID.to_owned(), session_id.as_str().into());
        }

        if let Some(anonymous_id) = self.anonymous_id() {
            span.attributes
                .insert(ANONYMOUS_USER_ID.to_owned(), anonymous_id.into());
        }
    }

    fn on_end(&self, _: &SpanData) {}
}

impl fmt::Debug for SpanAttributesProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanAttributesProcessor")
            .field("global_attributes", &self.get_global_attributes())
            .field(
                "anonymous_tracking",
                &self.anonymous_tracking.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

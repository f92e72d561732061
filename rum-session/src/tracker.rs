use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use rum_common::SessionId;

use crate::session::Session;
use crate::store::{SessionOutcome, SessionStore};

/// Provides the current session id to consumers outside of the session crate.
///
/// Implementations must look up the id on every call. The session can rotate at any time, so
/// consumers never cache the result beyond a single decision.
pub trait SessionIdSource: Send + Sync {
    /// Returns the current session id, or `None` if session tracking is not active.
    fn session_id(&self) -> Option<SessionId>;

    /// Reports that a span was started, which may count as user activity.
    fn record_activity(&self, had_activity: bool) {
        let _ = had_activity;
    }
}

impl<T: SessionIdSource + ?Sized> SessionIdSource for Arc<T> {
    fn session_id(&self) -> Option<SessionId> {
        (**self).session_id()
    }

    fn record_activity(&self, had_activity: bool) {
        (**self).record_activity(had_activity)
    }
}

/// Tracks user activity and keeps the persisted session up to date.
///
/// The host reports user interactions through [`note_activity`](Self::note_activity). The next
/// status update consumes the flag and renews the session.
pub struct SessionTracker {
    store: Arc<SessionStore>,
    active: AtomicBool,
    recent_activity: AtomicBool,
    created_id: Mutex<Option<SessionId>>,
}

impl SessionTracker {
    /// Starts tracking sessions in `store`.
    ///
    /// A session is created or picked up from the store immediately.
    pub fn new(store: Arc<SessionStore>) -> Self {
        let tracker = Self {
            store,
            active: AtomicBool::new(true),
            recent_activity: AtomicBool::new(false),
            created_id: Mutex::new(None),
        };

        tracker.update_session_status(true, false);
        tracker
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Returns the current session id.
    ///
    /// This reads the store on every call, creating a new session if the previous one expired.
    /// Returns `None` after [`deinit`](Self::deinit).
    pub fn session_id(&self) -> Option<SessionId> {
        self.update_session_status(false, false)
            .map(|session| session.id)
    }

    /// Brings the persisted session up to date.
    ///
    /// Activity reported since the last update, or `had_activity`, renews the session. With
    /// `force_store`, an unchanged session is written again to refresh the medium's own expiry.
    pub fn update_session_status(&self, force_store: bool, had_activity: bool) -> Option<Session> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }

        let had_activity = self.recent_activity.swap(false, Ordering::SeqCst) || had_activity;
        let update = self.store.update(had_activity);

        match update.outcome {
            SessionOutcome::Created => {
                *self.created_id.lock() = Some(update.session.id.clone());
            }
            SessionOutcome::Unchanged if force_store => {
                self.store.refresh_session();
            }
            _ => (),
        }

        Some(update.session)
    }

    /// Returns `true` if the current session was created by this tracker, rather than picked
    /// up from the medium.
    pub fn is_new_session(&self) -> bool {
        let current = self.store.get_current_session();
        let created = self.created_id.lock();
        matches!((current, created.as_ref()), (Some(s), Some(id)) if &s.id == id)
    }

    /// Marks that the user interacted with the page.
    pub fn note_activity(&self) {
        self.recent_activity.store(true, Ordering::SeqCst);
    }

    /// Stops tracking. The persisted session is left in place for other tabs.
    pub fn deinit(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl SessionIdSource for SessionTracker {
    fn session_id(&self) -> Option<SessionId> {
        SessionTracker::session_id(self)
    }

    fn record_activity(&self, had_activity: bool) {
        self.update_session_status(false, had_activity);
    }
}

impl fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTracker")
            .field("active", &self.active)
            .field("recent_activity", &self.recent_activity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rum_common::{ManualClock, MemoryStorage, UnixMillis};

    use super::*;
    use crate::{LocalStoragePersistence, SessionStoreConfig};

    fn tracker() -> (SessionTracker, ManualClock) {
        let clock = ManualClock::new(UnixMillis::from_millis(1_000_000));
        let store = SessionStore::new(
            Arc::new(LocalStoragePersistence::new(MemoryStorage::new())),
            Arc::new(clock.clone()),
            SessionStoreConfig::default(),
        );
        (SessionTracker::new(Arc::new(store)), clock)
    }

    #[test]
    fn test_session_created_on_start() {
        let (tracker, _) = tracker();
        assert!(tracker.store().get_current_session().is_some());
        assert!(tracker.is_new_session());
    }

    #[test]
    fn test_noted_activity_renews_on_next_read() {
        let (tracker, clock) = tracker();
        let before = tracker.store().get_current_session().unwrap();

        clock.advance(Duration::from_secs(10 * 60));
        tracker.note_activity();
        assert_eq!(tracker.session_id(), Some(before.id.clone()));

        let after = tracker.store().get_current_session().unwrap();
        assert!(after.expires_at > before.expires_at);

        // The flag is consumed by the first update.
        clock.advance(Duration::from_secs(10 * 60));
        tracker.session_id();
        assert_eq!(tracker.store().get_current_session().unwrap(), after);
    }

    #[test]
    fn test_session_id_rotates_after_expiry() {
        let (tracker, clock) = tracker();
        let first = tracker.session_id().unwrap();

        clock.advance(Duration::from_secs(16 * 60));
        let second = tracker.session_id().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_session_picked_up_from_other_tab() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(UnixMillis::from_millis(1_000_000));
        let new_store = || {
            Arc::new(SessionStore::new(
                Arc::new(LocalStoragePersistence::new(storage.clone())),
                Arc::new(clock.clone()),
                SessionStoreConfig::default(),
            ))
        };

        let first_tab = SessionTracker::new(new_store());
        let second_tab = SessionTracker::new(new_store());

        assert_eq!(first_tab.session_id(), second_tab.session_id());
        assert!(first_tab.is_new_session());
        assert!(!second_tab.is_new_session());
    }

    #[test]
    fn test_deinit() {
        let (tracker, _) = tracker();
        tracker.deinit();
        assert_eq!(tracker.session_id(), None);
        // The session stays persisted for other tabs.
        assert!(tracker.store().get_current_session().is_some());
    }
}

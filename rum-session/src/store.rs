use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use rum_common::{Clock, SessionId, Subscribers, SubscriptionId};
use rum_log::LogError;

use crate::persistence::SessionPersistence;
use crate::session::{SESSION_STORAGE_KEY, Session};

/// Lifetime settings of sessions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionStoreConfig {
    /// Time without activity after which a session expires.
    pub inactivity_timeout: Duration,
    /// Maximum lifetime of a session, regardless of activity.
    pub max_duration: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(15 * 60),
            max_duration: Duration::from_secs(4 * 60 * 60),
        }
    }
}

/// Notification sent to subscribers when the current session id changes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionChange {
    /// The id observed before the change, if any.
    pub previous: Option<SessionId>,
    /// The new current session.
    pub session: Session,
}

/// What [`SessionStore::update`] did to the session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionOutcome {
    /// There was no valid session, a new one was created.
    Created,
    /// A valid session was extended.
    Renewed,
    /// A valid session was returned as is.
    Unchanged,
}

/// The result of [`SessionStore::update`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionUpdate {
    /// The current session after the update.
    pub session: Session,
    /// What happened to the session.
    pub outcome: SessionOutcome,
}

#[derive(Debug, Default)]
struct StoreState {
    /// The last session id this store handed out or observed.
    last_seen: Option<SessionId>,
    /// A session whose write failed, used until the medium accepts writes again.
    unpersisted: Option<Session>,
}

/// Owns the persisted session record.
///
/// All reads and writes of the record go through the store. Within one store, read-modify-write
/// sequences are serialized. Across tabs the last write wins.
///
/// Subscribers are notified synchronously whenever the current session id changes, either
/// because this store created a session or because it observed one created elsewhere. The
/// notification happens before the method that caused it returns, and after the store released
/// its lock, so subscribers may call back into the store.
pub struct SessionStore {
    persistence: Arc<dyn SessionPersistence>,
    clock: Arc<dyn Clock>,
    config: SessionStoreConfig,
    state: Mutex<StoreState>,
    subscribers: Subscribers<SessionChange>,
}

impl SessionStore {
    /// Creates a store over the given persistence medium.
    pub fn new(
        persistence: Arc<dyn SessionPersistence>,
        clock: Arc<dyn Clock>,
        config: SessionStoreConfig,
    ) -> Self {
        Self {
            persistence,
            clock,
            config,
            state: Mutex::new(StoreState::default()),
            subscribers: Subscribers::new(),
        }
    }

    /// Returns the lifetime settings of this store.
    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    /// Returns the persistence medium of this store.
    pub fn persistence(&self) -> &Arc<dyn SessionPersistence> {
        &self.persistence
    }

    /// Registers a callback for session id changes.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Removes a callback registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Returns the current session, or `None` if there is no valid session.
    ///
    /// Expired and corrupt records are treated as absent.
    pub fn get_current_session(&self) -> Option<Session> {
        let (session, change) = {
            let mut state = self.state.lock();
            let session = self.read_valid(&mut state);
            let change = session.as_ref().and_then(|s| observe(&mut state, s));
            (session, change)
        };

        self.notify(change);
        session
    }

    /// Returns a valid session, creating or renewing it as necessary.
    ///
    /// Without a valid session, a new one is created. A valid session is extended by the
    /// inactivity timeout if `activity` is set, and returned unchanged otherwise.
    pub fn start_or_renew_session(&self, activity: bool) -> Session {
        self.update(activity).session
    }

    /// Like [`start_or_renew_session`](Self::start_or_renew_session), but also reports what
    /// happened to the session.
    pub fn update(&self, activity: bool) -> SessionUpdate {
        let (update, change) = {
            let mut state = self.state.lock();
            let now = self.clock.now();

            let update = match self.read_valid(&mut state) {
                None => {
                    let session = Session::new(now, self.config.inactivity_timeout);
                    rum_log::debug!("created session {}", session.id);
                    SessionUpdate {
                        session,
                        outcome: SessionOutcome::Created,
                    }
                }
                Some(mut session) if activity => {
                    session.renew(now, self.config.inactivity_timeout);
                    SessionUpdate {
                        session,
                        outcome: SessionOutcome::Renewed,
                    }
                }
                Some(session) => SessionUpdate {
                    session,
                    outcome: SessionOutcome::Unchanged,
                },
            };

            if update.outcome != SessionOutcome::Unchanged {
                self.write(&mut state, &update.session);
            }

            let change = observe(&mut state, &update.session);
            (update, change)
        };

        self.notify(change);
        update
    }

    /// Replaces the current session with a new one, regardless of its expiry.
    pub fn force_new_session(&self) -> Session {
        let (session, change) = {
            let mut state = self.state.lock();
            let session = Session::new(self.clock.now(), self.config.inactivity_timeout);
            rum_log::debug!("forced new session {}", session.id);

            self.write(&mut state, &session);
            let change = observe(&mut state, &session);
            (session, change)
        };

        self.notify(change);
        session
    }

    /// Writes the current session again without extending it.
    ///
    /// This refreshes the expiry of the medium itself, such as the cookie's `Max-Age`. Returns
    /// `None` if there is no valid session.
    pub fn refresh_session(&self) -> Option<Session> {
        let mut state = self.state.lock();
        let session = self.read_valid(&mut state)?;
        self.write(&mut state, &session);
        Some(session)
    }

    /// Deletes the persisted session record.
    pub fn clear_session(&self) {
        let mut state = self.state.lock();
        state.last_seen = None;
        state.unpersisted = None;
        self.persistence.remove(SESSION_STORAGE_KEY);
    }

    fn read_valid(&self, state: &mut StoreState) -> Option<Session> {
        let session = match self.persistence.read(SESSION_STORAGE_KEY) {
            Some(value) => match Session::decode(&value) {
                Ok(session) => Some(session),
                Err(error) => {
                    rum_log::warn!(
                        error = &error as &dyn std::error::Error,
                        "discarding corrupt session record"
                    );
                    None
                }
            },
            None => state.unpersisted.clone(),
        };

        let now = self.clock.now();
        session.filter(|session| !session.is_expired(now, self.config.max_duration))
    }

    fn write(&self, state: &mut StoreState, session: &Session) {
        let result = self.persistence.write(
            SESSION_STORAGE_KEY,
            &session.encode(),
            self.config.max_duration,
        );

        match result {
            Ok(()) => state.unpersisted = None,
            Err(error) => {
                rum_log::warn!("failed to persist session: {}", LogError(&error));
                state.unpersisted = Some(session.clone());
            }
        }
    }

    fn notify(&self, change: Option<SessionChange>) {
        if let Some(change) = change {
            rum_log::trace!(
                previous = ?change.previous,
                current = %change.session.id,
                "session changed"
            );
            self.subscribers.notify(&change);
        }
    }
}

/// Records `session` as the last seen session and returns a change if its id is new.
fn observe(state: &mut StoreState, session: &Session) -> Option<SessionChange> {
    if state.last_seen.as_ref() == Some(&session.id) {
        return None;
    }

    let previous = state.last_seen.replace(session.id.clone());
    Some(SessionChange {
        previous,
        session: session.clone(),
    })
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

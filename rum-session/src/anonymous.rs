use std::sync::Arc;
use std::time::Duration;

use rum_common::generate_id;
use rum_log::LogError;

use crate::persistence::SessionPersistence;

/// Key under which the anonymous user id is persisted.
pub const ANONYMOUS_ID_KEY: &str = "_rum_anonymous_id";

/// Lifetime of the anonymous user id cookie, the maximum browsers accept.
const ANONYMOUS_ID_MAX_AGE: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Persists a random user id that outlives sessions.
///
/// The id is stored in the same medium as the session record and is only created when user
/// tracking is enabled.
#[derive(Clone)]
pub struct AnonymousIdStore {
    persistence: Arc<dyn SessionPersistence>,
}

impl AnonymousIdStore {
    /// Creates a store over the given medium.
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Self {
        Self { persistence }
    }

    /// Returns the persisted anonymous id, creating it if it does not exist yet.
    pub fn get_or_create(&self) -> String {
        if let Some(id) = self.persistence.read(ANONYMOUS_ID_KEY) {
            if id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit()) {
                return id;
            }
            rum_log::warn!("discarding malformed anonymous id");
        }

        let id = generate_id(128);
        if let Err(error) = self
            .persistence
            .write(ANONYMOUS_ID_KEY, &id, ANONYMOUS_ID_MAX_AGE)
        {
            rum_log::warn!("failed to persist anonymous id: {}", LogError(&error));
        }
        id
    }

    /// Deletes the persisted anonymous id.
    pub fn forget(&self) {
        self.persistence.remove(ANONYMOUS_ID_KEY);
    }
}

impl std::fmt::Debug for AnonymousIdStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymousIdStore").finish_non_exhaustive()
    }
}

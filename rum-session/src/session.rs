use std::time::Duration;

use serde::{Deserialize, Serialize};

use rum_common::{SessionId, UnixMillis};

/// Key under which the session record is persisted.
pub const SESSION_STORAGE_KEY: &str = "_rum_sid";

/// An error decoding a persisted session record.
#[derive(Debug, thiserror::Error)]
pub enum SessionRecordError {
    /// The record is not valid percent-encoded UTF-8.
    #[error("session record is not url encoded")]
    Encoding(#[from] std::string::FromUtf8Error),
    /// The record is not a valid JSON session.
    #[error("session record is not valid json")]
    Json(#[from] serde_json::Error),
    /// The record expires before it starts.
    #[error("session record expires before it starts")]
    InvalidRange,
}

/// A bounded period of user activity.
///
/// The id never changes once created. Renewal only moves `expires_at`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The random session id.
    pub id: SessionId,
    /// Creation time of the session.
    pub start_time: UnixMillis,
    /// Time at which the session expires unless it is renewed.
    pub expires_at: UnixMillis,
}

impl Session {
    /// Creates a session with a fresh random id starting at `now`.
    pub fn new(now: UnixMillis, inactivity_timeout: Duration) -> Self {
        Self {
            id: SessionId::random(),
            start_time: now,
            expires_at: now + inactivity_timeout,
        }
    }

    /// Returns `true` if the session must no longer be used at `now`.
    ///
    /// A session expires at `expires_at`, or once it is older than `max_duration`, whichever
    /// happens first.
    pub fn is_expired(&self, now: UnixMillis, max_duration: Duration) -> bool {
        now >= self.expires_at || now >= self.start_time + max_duration
    }

    /// Extends the session by the inactivity timeout, keeping its id.
    pub fn renew(&mut self, now: UnixMillis, inactivity_timeout: Duration) {
        self.expires_at = now + inactivity_timeout;
    }

    /// Serializes the record into its persisted form, percent-encoded JSON.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and integers cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        urlencoding::encode(&json).into_owned()
    }

    /// Parses a persisted record.
    pub fn decode(value: &str) -> Result<Self, SessionRecordError> {
        let json = urlencoding::decode(value)?;
        let session: Self = serde_json::from_str(&json)?;

        if session.expires_at <= session.start_time {
            return Err(SessionRecordError::InvalidRange);
        }

        Ok(session)
    }
}

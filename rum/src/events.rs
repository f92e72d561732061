use rum_common::{Attributes, SessionId};

/// Notifications delivered to listeners registered with
/// [`Rum::add_event_listener`](crate::Rum::add_event_listener).
#[derive(Clone, Debug, PartialEq)]
pub enum RumEvent {
    /// A new session started.
    SessionChanged {
        /// Id of the new session.
        session_id: SessionId,
    },
    /// The global attributes changed.
    GlobalAttributesChanged {
        /// The effective global attributes after the change.
        attributes: Attributes,
    },
}

//! Session lifecycle of the rum pipeline.
//!
//! A session is a period of user activity identified by a random 128-bit id. It is persisted in
//! a cookie or in local storage so that all tabs of an origin share it, and it expires after a
//! period of inactivity or once it reaches its maximum duration.
//!
//! The [`SessionStore`] owns the persisted record. Everything else reads the current id through
//! a [`SessionIdSource`], usually the [`SessionTracker`], and subscribes to [`SessionChange`]
//! notifications.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rum_common::{MemoryStorage, SystemClock};
//! use rum_session::{LocalStoragePersistence, SessionStore, SessionStoreConfig};
//!
//! let store = SessionStore::new(
//!     Arc::new(LocalStoragePersistence::new(MemoryStorage::new())),
//!     Arc::new(SystemClock),
//!     SessionStoreConfig::default(),
//! );
//!
//! let session = store.start_or_renew_session(true);
//! assert_eq!(store.get_current_session(), Some(session));
//! ```
#![warn(missing_docs)]

mod anonymous;
mod persistence;
mod session;
mod store;
mod tracker;

pub use self::anonymous::*;
pub use self::persistence::*;
pub use self::session::*;
pub use self::store::*;
pub use self::tracker::*;

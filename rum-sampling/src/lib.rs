//! Sampling of rum telemetry.
//!
//! Sampling happens per session rather than per trace: the decision is derived from the session
//! id, so every span of a session shares it. With a uniformly random session id, the fraction of
//! sampled sessions converges to the configured ratio.
//!
//! # Example
//!
//! ```
//! use rum_common::SessionId;
//! use rum_sampling::is_session_sampled;
//!
//! let id = SessionId::parse("00000000000000000000000000000000").unwrap();
//! assert!(is_session_sampled(&id, 0.1));
//! assert!(!is_session_sampled(&id, 0.0));
//! ```
#![warn(missing_docs)]

mod activity;
mod sampler;
mod session;

pub use self::activity::*;
pub use self::sampler::*;
pub use self::session::*;

//! Real user monitoring for browser applications.
//!
//! This crate ties the pipeline together. [`Rum`] is the client the application initializes
//! once per page: it tracks the session in a cookie or local storage, samples spans per session,
//! stamps session and user context onto every span and exports spans as OTLP JSON. The
//! [`SessionRecorder`] records the session and exports the recording in chunks.
//!
//! The browser itself is abstracted by the [`BrowserContext`]: storage, page visibility, the
//! network transport and the capture mechanism are provided by the host.
#![warn(missing_docs)]

mod client;
mod context;
mod error;
mod events;
mod recorder;

pub use self::client::*;
pub use self::context::*;
pub use self::error::*;
pub use self::events::*;
pub use self::recorder::*;

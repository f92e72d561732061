//! Common utilities and primitives shared by the rum pipeline crates.
//!
//! Nothing in here knows about sessions, spans or export. The types model the handful of browser
//! capabilities the pipeline needs (a clock, a key/value storage area) and the values that flow
//! through it (attributes, resources, ids).

#![warn(missing_docs)]

pub mod constants;

mod attributes;
mod ids;
mod resource;
mod storage;
mod subscribers;
mod time;

pub use self::attributes::*;
pub use self::ids::*;
pub use self::resource::*;
pub use self::storage::*;
pub use self::subscribers::*;
pub use self::time::*;

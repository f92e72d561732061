//! Configuration for the rum telemetry pipeline.
//!
//! Options arrive as a loosely typed [`RumOptions`] object, usually deserialized from the JSON the
//! host page passes to `init`, and are resolved into a validated [`Config`]. Resolution applies
//! legacy option aliases and defaults in a fixed order: an explicit option wins over a migrated
//! legacy alias, which wins over the default.
#![warn(missing_docs)]

mod config;
mod options;

pub use self::config::*;
pub use self::options::*;

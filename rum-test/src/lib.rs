//! Helpers for testing the rum pipeline crates.
//!
//! In every test that logs, call [`setup`]. This will set up the logger so that all console
//! output is captured by the test runner. All logs emitted with [`rum_log`] will show up for test
//! failures or when run with `--nocapture`.
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     rum_test::setup();
//!
//!     rum_log::debug!("hello, world!");
//! }
//! ```

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `rum` crates and mutes all other
///    logs.
pub fn setup() {
    rum_log::init_test!();
}

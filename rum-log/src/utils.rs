use std::error::Error;
use std::fmt;

/// Crates of this workspace that receive the configured log level.
///
/// All other crates are capped at `WARN` unless `RUST_LOG` says otherwise.
#[cfg_attr(not(any(feature = "init", feature = "test")), allow(dead_code))]
pub(crate) const CRATE_NAMES: &[&str] = &[
    "rum",
    "rum_common",
    "rum_config",
    "rum_export",
    "rum_log",
    "rum_replays",
    "rum_sampling",
    "rum_session",
    "rum_spans",
    "rum_system",
];

/// Logs an error to the configured logger or `stderr` if not yet configured.
///
/// Prefer to use [`rum_log::error`](crate::error) over this function whenever possible. This
/// function is intended to be used during initialization, where the host application may not
/// have installed a subscriber yet.
#[allow(clippy::print_stderr)]
pub fn ensure_error<E: AsRef<dyn Error>>(error: E) {
    if tracing::event_enabled!(tracing::Level::ERROR) {
        tracing::error!("{}", LogError(error.as_ref()));
    } else {
        eprintln!("error: {}", LogError(error.as_ref()));
    }
}

/// A wrapper around an [`Error`] that prints its causes.
///
/// # Example
///
/// ```
/// use rum_log::LogError;
///
/// if let Err(error) = std::env::var("FOO") {
///     rum_log::error!("env failed: {}", LogError(&error));
/// }
/// ```
pub struct LogError<'a, E: Error + ?Sized>(pub &'a E);

impl<E: Error + ?Sized> fmt::Display for LogError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        let mut source = self.0.source();
        while let Some(s) = source {
            write!(f, "\n  caused by: {s}")?;
            source = s.source();
        }

        Ok(())
    }
}

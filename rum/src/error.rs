use rum_config::ConfigError;
use rum_replays::RecorderError;

/// An error initializing [`Rum`](crate::Rum).
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The context provides no storage for the configured persistence medium.
    #[error("not running in a browser document, no storage for session persistence")]
    NotInBrowser,
    /// The pipeline needs a tokio runtime to export telemetry.
    #[error("no async runtime available")]
    NoRuntime,
    /// `init` was called on an initialized instance.
    #[error("rum already initialized")]
    AlreadyInitialized,
    /// The options are invalid.
    #[error("invalid rum configuration")]
    Config(#[from] ConfigError),
}

/// An error starting a [`SessionRecorder`](crate::SessionRecorder).
#[derive(Debug, thiserror::Error)]
pub enum RecorderInitError {
    /// [`Rum`](crate::Rum) is not initialized.
    #[error("rum must be initialized before the session recorder")]
    NotInitialized,
    /// The recorder is already running.
    #[error("session recorder already initialized")]
    AlreadyInitialized,
    /// No collector endpoint is configured.
    #[error("session recorder could not determine endpoint")]
    MissingEndpoint,
    /// The current session is sampled out.
    #[error("session is not sampled")]
    NotSampled,
    /// The capture mechanism failed to start.
    #[error("failed to initialize recorder")]
    Recorder(#[from] RecorderError),
}

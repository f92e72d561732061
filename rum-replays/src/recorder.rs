use serde_json::Value;

use rum_common::SessionId;
use rum_config::RecorderType;

/// An error starting a [`Recorder`].
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The capture mechanism is not available in this browser.
    #[error("recorder is not supported: {0}")]
    Unsupported(String),
    /// The capture mechanism failed to start.
    #[error("failed to start recorder: {0}")]
    Start(String),
}

/// A single serialized recorder event.
#[derive(Clone, Debug, PartialEq)]
pub struct EmitContext {
    /// The recorder that produced the event.
    pub kind: RecorderType,
    /// Capture time in milliseconds since the UNIX epoch, possibly fractional.
    pub start_time: f64,
    /// The event payload.
    pub data: Value,
}

impl EmitContext {
    /// Creates an event.
    pub fn new(kind: RecorderType, start_time: f64, data: Value) -> Self {
        Self {
            kind,
            start_time,
            data,
        }
    }

    /// Returns the timestamp of the exported records.
    ///
    /// The splunk recorder reports whole milliseconds, rrweb keeps fractions.
    pub fn timestamp(&self) -> f64 {
        match self.kind {
            RecorderType::Splunk => self.start_time.floor(),
            RecorderType::Rrweb => self.start_time,
        }
    }
}

/// The capture mechanism of a session recording.
///
/// Implemented by the host. Captured events are passed to
/// [`RecorderPipeline::emit`](crate::RecorderPipeline::emit).
pub trait Recorder: Send {
    /// Starts capturing.
    fn start(&mut self) -> Result<(), RecorderError>;

    /// Stops capturing.
    fn stop(&mut self);

    /// Resumes capturing after [`stop`](Self::stop).
    fn resume(&mut self);

    /// Called when the session changed. The recorder should capture a new full snapshot.
    fn on_session_changed(&mut self);
}

/// The session as seen by the recording pipeline.
pub trait RecorderSession: Send + Sync {
    /// Returns the current session id.
    fn session_id(&self) -> Option<SessionId>;

    /// Reports recorder activity, which keeps session tracking up to date.
    fn on_external_span_created(&self);
}

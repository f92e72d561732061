//! Session recording pipeline.
//!
//! A [`Recorder`] captures the page and hands every serialized event to the
//! [`RecorderPipeline`]. The pipeline splits events into chunks small enough for a single
//! network request, numbers them and passes them on as log records to a
//! [`LogSink`](rum_export::LogSink), usually a batch processor.
//!
//! Recording is tied to the session. When the session changes, the counters restart and the
//! recorder is asked for a fresh snapshot. Events of a new session that arrive while the page is
//! hidden are dropped, as are events beyond [`MAX_RECORDING_LENGTH`] into a session.
#![warn(missing_docs)]

mod pipeline;
mod recorder;
mod visibility;

pub use self::pipeline::*;
pub use self::recorder::*;
pub use self::visibility::*;

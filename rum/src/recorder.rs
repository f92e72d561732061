use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use rum_common::constants::{ANONYMOUS_USER_ID, SDK_VERSION, SESSION_ID, SESSION_REPLAY};
use rum_common::Attributes;
use rum_export::{
    BatchConfig, BatchProcessor, FnResource, LogRecord, OtlpExporter, PersistentTransport,
    Transport,
};
use rum_replays::{
    DropReason, EmitContext, EmitOutcome, Recorder, RecorderPipeline, RecorderSession,
};
use rum_spans::Tracer;

use crate::client::{Rum, RumState};
use crate::error::RecorderInitError;

/// Name of the tracer emitting the recorder marker spans.
pub const RECORDER_TRACER_NAME: &str = "splunk.rr-web";

struct RecorderInner {
    recorder: Box<dyn Recorder>,
    pipeline: RecorderPipeline,
    active: bool,
}

/// Records the session and exports the recording as log records.
///
/// The recorder is started only for sampled sessions: it starts a `record init` span and gives up
/// if that span is not recording. [`stop`](Self::stop) and [`resume`](Self::resume) each emit a
/// zero-duration marker span when they change the recording state.
///
/// Events reach the recorder through [`emit`](Self::emit). The session is resolved and extended
/// outside the recorder lock, so session listeners may call back into the recorder. The capture
/// mechanism must not call [`emit`](Self::emit) from within [`Recorder::on_session_changed`].
pub struct SessionRecorder {
    inner: Mutex<RecorderInner>,
    session: Arc<dyn RecorderSession>,
    tracer: Tracer,
    processor: BatchProcessor<LogRecord>,
}

impl SessionRecorder {
    /// Starts recording for an initialized [`Rum`] client.
    pub fn start(rum: &Rum, recorder: Box<dyn Recorder>) -> Result<Arc<Self>, RecorderInitError> {
        let Some(state) = rum.state() else {
            rum_log::error!("rum must be initialized before session recorder");
            return Err(RecorderInitError::NotInitialized);
        };

        if state.recorder_running() {
            return Err(RecorderInitError::AlreadyInitialized);
        }

        let recorder = Arc::new(Self::start_with(&state, recorder)?);
        rum.set_session_recorder(Arc::clone(&recorder));
        Ok(recorder)
    }

    pub(crate) fn start_with(
        state: &RumState,
        mut recorder: Box<dyn Recorder>,
    ) -> Result<Self, RecorderInitError> {
        let config = &state.config;
        let recorder_type = config.recorder().recorder_type;

        state.resource.set(SESSION_REPLAY, recorder_type.as_str());
        rum_log::debug!(
            "{SESSION_REPLAY} resource attribute set to '{}'",
            recorder_type.as_str()
        );

        let tracer = state.provider.tracer(RECORDER_TRACER_NAME, SDK_VERSION);
        let mut span = tracer.start_span("record init");
        if !span.is_recording() {
            rum_log::debug!("session not sampled, not recording");
            return Err(RecorderInitError::NotSampled);
        }
        span.end();

        let Some(url) = config.log_export_url() else {
            rum_log::error!("session recorder could not determine endpoint");
            return Err(RecorderInitError::MissingEndpoint);
        };

        let transport = match &state.local_storage {
            Some(storage) if config.recorder().use_persistent_export_queue => {
                let persistent =
                    PersistentTransport::new(Arc::clone(&state.transport), Arc::clone(storage));
                tokio::spawn(persistent.resend_pending());
                Arc::new(persistent) as Arc<dyn Transport>
            }
            _ => Arc::clone(&state.transport),
        };

        let resource = state.resource.clone();
        let session = Arc::clone(&state.session);
        let anonymous = Arc::clone(&state.attributes);
        let exporter = OtlpExporter::<LogRecord>::new(
            url,
            config.export_headers(),
            transport,
            Arc::new(FnResource(move || {
                let mut attributes: Attributes = resource.snapshot();
                let session_id = session.session_id();
                attributes.insert(
                    SESSION_ID.to_owned(),
                    session_id.as_ref().map_or("", |id| id.as_str()).into(),
                );
                if let Some(anonymous_id) = anonymous.anonymous_id() {
                    attributes.insert(ANONYMOUS_USER_ID.to_owned(), anonymous_id.into());
                }
                attributes
            })),
        );

        let processor = BatchProcessor::start(BatchConfig::default(), exporter);
        let pipeline = RecorderPipeline::new(
            state.session.clone(),
            Arc::clone(&state.visibility),
            Arc::new(processor.clone()),
            Arc::clone(&state.clock),
        )
        .with_debug(config.debug());

        recorder.start()?;
        rum_log::debug!("session recorder started");

        Ok(Self {
            inner: Mutex::new(RecorderInner {
                recorder,
                pipeline,
                active: true,
            }),
            session: state.session.clone(),
            tracer,
            processor,
        })
    }

    /// Returns `true` until [`deinit`](Self::deinit) is called.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Returns `true` while recording is stopped.
    pub fn is_paused(&self) -> bool {
        self.inner.lock().pipeline.is_paused()
    }

    /// Hands a captured event to the recording pipeline.
    ///
    /// Returns `None` after [`deinit`](Self::deinit).
    pub fn emit(&self, context: EmitContext) -> Option<EmitOutcome> {
        {
            let inner = self.inner.lock();
            if !inner.active {
                return None;
            }
            if inner.pipeline.is_paused() {
                return Some(EmitOutcome::Dropped(DropReason::Paused));
            }
        }

        // Resolving the session may renew it and notify listeners.
        let current = self.session.session_id();

        let outcome = {
            let mut inner = self.inner.lock();
            if !inner.active {
                return None;
            }

            let RecorderInner {
                recorder, pipeline, ..
            } = &mut *inner;
            pipeline.emit_for_session(context, current, || recorder.on_session_changed())
        };

        if outcome.is_emitted() {
            self.session.on_external_span_created();
        }
        Some(outcome)
    }

    /// Stops recording. Events are dropped until [`resume`](Self::resume).
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if !inner.active || inner.pipeline.is_paused() {
            return;
        }

        inner.recorder.stop();
        inner.pipeline.pause();
        drop(inner);

        self.tracer.start_span("record stop").end();
    }

    /// Resumes recording after [`stop`](Self::stop).
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if !inner.active || !inner.pipeline.is_paused() {
            return;
        }

        inner.pipeline.resume();
        inner.recorder.resume();
        drop(inner);

        self.tracer.start_span("record resume").end();
    }

    /// Exports all pending recording chunks.
    pub async fn force_flush(&self) {
        self.processor.force_flush().await;
    }

    /// Stops the capture mechanism and flushes the remaining chunks.
    pub async fn deinit(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.active {
                return;
            }
            inner.recorder.stop();
            inner.active = false;
        }

        self.processor.shutdown().await;
        rum_log::debug!("session recorder stopped");
    }
}

impl fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionRecorder")
            .field("active", &inner.active)
            .field("pipeline", &inner.pipeline)
            .finish_non_exhaustive()
    }
}

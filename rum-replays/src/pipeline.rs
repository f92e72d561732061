use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use rum_common::{AttributeValue, Attributes, Clock, SessionId, UnixMillis};
use rum_export::{LogRecord, LogSink};

use crate::recorder::{EmitContext, RecorderSession};
use crate::visibility::PageVisibility;

/// Upper bound of the payload of a single log record.
pub const MAX_CHUNK_SIZE: usize = 950 * 1024;

/// Events captured later than this into a session are dropped.
pub const MAX_RECORDING_LENGTH: Duration = Duration::from_millis((4 * 60 + 1) * 60 * 1000);

/// Position of the record within the session, across all events.
pub const OFFSET_ATTRIBUTE: &str = "rr-web.offset";
/// Index of the event the record belongs to.
pub const EVENT_ATTRIBUTE: &str = "rr-web.event";
/// One-based index of the chunk within its event.
pub const CHUNK_ATTRIBUTE: &str = "rr-web.chunk";
/// Number of chunks of the event.
pub const TOTAL_CHUNKS_ATTRIBUTE: &str = "rr-web.total-chunks";

/// Why an event was not emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    /// Recording is paused.
    Paused,
    /// The session changed while the page is hidden.
    HiddenSessionChange,
    /// The event is beyond [`MAX_RECORDING_LENGTH`] into the session.
    RecordingTooLong,
}

/// The result of [`RecorderPipeline::emit`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmitOutcome {
    /// The event was split into chunks and handed to the sink.
    Emitted {
        /// Index of the event within the session.
        event: u64,
        /// Number of records the event was split into.
        chunks: usize,
    },
    /// The event was dropped.
    Dropped(DropReason),
}

impl EmitOutcome {
    /// Returns `true` if the event was handed to the sink.
    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Emitted { .. })
    }
}

/// Splits recorder events into numbered chunks and emits them as log records.
///
/// Counters are scoped to the session. The event counter increments once per emitted event, the
/// offset counter once per chunk. Both restart at 1 when the session changes.
pub struct RecorderPipeline {
    session: Arc<dyn RecorderSession>,
    visibility: Arc<dyn PageVisibility>,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    debug: bool,
    paused: bool,
    last_known_session: Option<SessionId>,
    session_start: UnixMillis,
    event_counter: u64,
    log_counter: u64,
}

impl RecorderPipeline {
    /// Creates a pipeline for the current session.
    pub fn new(
        session: Arc<dyn RecorderSession>,
        visibility: Arc<dyn PageVisibility>,
        sink: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let last_known_session = session.session_id();
        let session_start = clock.now();

        Self {
            session,
            visibility,
            sink,
            clock,
            debug: false,
            paused: false,
            last_known_session,
            session_start,
            event_counter: 1,
            log_counter: 1,
        }
    }

    /// Logs every emitted record at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Drops all events until [`resume`](Self::resume) is called.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Emits events again after [`pause`](Self::pause).
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Returns `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns the index the next emitted event will get.
    pub fn next_event(&self) -> u64 {
        self.event_counter
    }

    /// Returns the offset the next emitted record will get.
    pub fn next_offset(&self) -> u64 {
        self.log_counter
    }

    /// Returns the session the pipeline is currently recording.
    pub fn last_known_session(&self) -> Option<&SessionId> {
        self.last_known_session.as_ref()
    }

    /// Emits a recorder event.
    ///
    /// `on_session_changed` is invoked when the event is the first of a new session, after the
    /// counters were reset and before the event is emitted. Emitted events are reported to the
    /// session as activity.
    pub fn emit(
        &mut self,
        context: EmitContext,
        on_session_changed: impl FnOnce(),
    ) -> EmitOutcome {
        if self.paused {
            return EmitOutcome::Dropped(DropReason::Paused);
        }

        let current = self.session.session_id();
        let outcome = self.emit_for_session(context, current, on_session_changed);
        if outcome.is_emitted() {
            self.session.on_external_span_created();
        }
        outcome
    }

    /// Emits a recorder event for a session the caller already resolved.
    ///
    /// Unlike [`emit`](Self::emit), this never calls into the [`RecorderSession`]. The caller
    /// reports activity for emitted events, which lets it resolve the session and report activity
    /// without holding locks that session listeners might need.
    pub fn emit_for_session(
        &mut self,
        context: EmitContext,
        current: Option<SessionId>,
        on_session_changed: impl FnOnce(),
    ) -> EmitOutcome {
        if self.paused {
            return EmitOutcome::Dropped(DropReason::Paused);
        }

        if current != self.last_known_session {
            if self.visibility.is_hidden() {
                rum_log::trace!("dropping recorder event of new session while hidden");
                return EmitOutcome::Dropped(DropReason::HiddenSessionChange);
            }

            rum_log::debug!(
                previous = ?self.last_known_session,
                current = ?current,
                "session changed, restarting recording"
            );
            self.last_known_session = current;
            self.session_start = self.clock.now();
            self.event_counter = 1;
            self.log_counter = 1;
            on_session_changed();
        }

        let limit = self.session_start + MAX_RECORDING_LENGTH;
        if context.start_time > limit.as_millis() as f64 {
            return EmitOutcome::Dropped(DropReason::RecordingTooLong);
        }

        let timestamp = context.timestamp();
        let event = self.event_counter;
        self.event_counter += 1;

        // Serializing a JSON value into memory cannot fail.
        let body = Bytes::from(serde_json::to_vec(&context.data).unwrap_or_default());
        let total = body.len().div_ceil(MAX_CHUNK_SIZE);

        for index in 0..total {
            let start = index * MAX_CHUNK_SIZE;
            let end = (start + MAX_CHUNK_SIZE).min(body.len());

            let offset = self.log_counter;
            self.log_counter += 1;

            let attributes = Attributes::from([
                (OFFSET_ATTRIBUTE.to_owned(), AttributeValue::from(offset)),
                (EVENT_ATTRIBUTE.to_owned(), AttributeValue::from(event)),
                (CHUNK_ATTRIBUTE.to_owned(), AttributeValue::from(index as u64 + 1)),
                (TOTAL_CHUNKS_ATTRIBUTE.to_owned(), AttributeValue::from(total as u64)),
            ]);

            let record = LogRecord::new(timestamp, body.slice(start..end), attributes);
            if self.debug {
                rum_log::debug!(?record, "recorder log record");
            }
            self.sink.emit(record);
        }

        EmitOutcome::Emitted {
            event,
            chunks: total,
        }
    }
}

impl fmt::Debug for RecorderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderPipeline")
            .field("paused", &self.paused)
            .field("last_known_session", &self.last_known_session)
            .field("session_start", &self.session_start)
            .field("event_counter", &self.event_counter)
            .field("log_counter", &self.log_counter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use rum_common::ManualClock;
    use rum_config::RecorderType;
    use serde_json::json;

    use super::*;
    use crate::visibility::VisibilityState;

    const START: UnixMillis = UnixMillis::from_millis(1_700_000_000_000);

    #[derive(Default)]
    struct TestSession {
        id: Mutex<Option<SessionId>>,
        extended: AtomicUsize,
    }

    impl TestSession {
        fn set(&self, id: &str) {
            *self.id.lock() = Some(SessionId::parse(id).unwrap());
        }
    }

    impl RecorderSession for TestSession {
        fn session_id(&self) -> Option<SessionId> {
            self.id.lock().clone()
        }

        fn on_external_span_created(&self) {
            self.extended.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct TestSink(Mutex<Vec<LogRecord>>);

    impl TestSink {
        fn take(&self) -> Vec<LogRecord> {
            std::mem::take(&mut self.0.lock())
        }
    }

    impl LogSink for TestSink {
        fn emit(&self, record: LogRecord) {
            self.0.lock().push(record);
        }
    }

    struct Setup {
        session: Arc<TestSession>,
        visibility: VisibilityState,
        sink: Arc<TestSink>,
        clock: ManualClock,
        pipeline: RecorderPipeline,
    }

    fn setup() -> Setup {
        let session = Arc::new(TestSession::default());
        session.set("0123456789abcdef0123456789abcdef");
        let visibility = VisibilityState::new();
        let sink = Arc::new(TestSink::default());
        let clock = ManualClock::new(START);

        let pipeline = RecorderPipeline::new(
            session.clone(),
            Arc::new(visibility.clone()),
            sink.clone(),
            Arc::new(clock.clone()),
        );

        Setup {
            session,
            visibility,
            sink,
            clock,
            pipeline,
        }
    }

    fn event(start_time: f64) -> EmitContext {
        EmitContext::new(RecorderType::Rrweb, start_time, json!({"type": 3}))
    }

    fn int(record: &LogRecord, key: &str) -> i64 {
        record.attributes[key].as_i64().unwrap()
    }

    fn now() -> f64 {
        START.as_millis() as f64
    }

    #[test]
    fn test_small_event_is_one_chunk() {
        let mut s = setup();

        let outcome = s.pipeline.emit(event(now() + 0.5), || panic!("no session change"));
        assert_eq!(outcome, EmitOutcome::Emitted { event: 1, chunks: 1 });

        let records = s.sink.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, Bytes::from_static(br#"{"type":3}"#));
        assert_eq!(records[0].timestamp_ms, now() + 0.5);
        similar_asserts::assert_eq!(
            records[0].attributes,
            Attributes::from([
                (OFFSET_ATTRIBUTE.to_owned(), AttributeValue::from(1u64)),
                (EVENT_ATTRIBUTE.to_owned(), AttributeValue::from(1u64)),
                (CHUNK_ATTRIBUTE.to_owned(), AttributeValue::from(1u64)),
                (TOTAL_CHUNKS_ATTRIBUTE.to_owned(), AttributeValue::from(1u64)),
            ])
        );
        assert_eq!(s.session.extended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_large_event_is_chunked() {
        let mut s = setup();
        s.pipeline.emit(event(now()), || ());

        // Two and a half chunks worth of payload, including multi-byte characters.
        let text = "é".repeat(MAX_CHUNK_SIZE * 5 / 4);
        let context = EmitContext::new(RecorderType::Rrweb, now(), json!(text));
        let expected = serde_json::to_vec(&context.data).unwrap();

        let outcome = s.pipeline.emit(context, || ());
        assert_eq!(outcome, EmitOutcome::Emitted { event: 2, chunks: 3 });

        let records = s.sink.take().split_off(1);
        assert_eq!(records.len(), 3);

        let mut reassembled = Vec::new();
        for (i, record) in records.iter().enumerate() {
            assert!(record.body.len() <= MAX_CHUNK_SIZE);
            assert_eq!(int(record, CHUNK_ATTRIBUTE), i as i64 + 1);
            assert_eq!(int(record, TOTAL_CHUNKS_ATTRIBUTE), 3);
            assert_eq!(int(record, EVENT_ATTRIBUTE), 2);
            assert_eq!(int(record, OFFSET_ATTRIBUTE), i as i64 + 2);
            reassembled.extend_from_slice(&record.body);
        }
        assert_eq!(reassembled, expected);
        assert_eq!(s.pipeline.next_event(), 3);
        assert_eq!(s.pipeline.next_offset(), 5);
    }

    #[test]
    fn test_session_change_resets_counters() {
        let mut s = setup();
        s.pipeline.emit(event(now()), || ());
        s.pipeline.emit(event(now()), || ());
        s.sink.take();

        s.session.set("fedcba9876543210fedcba9876543210");
        s.clock.advance(Duration::from_secs(60));

        let mut changed = false;
        let outcome = s.pipeline.emit(event(now() + 60_000.0), || changed = true);
        assert!(changed);
        assert_eq!(outcome, EmitOutcome::Emitted { event: 1, chunks: 1 });

        let records = s.sink.take();
        assert_eq!(int(&records[0], OFFSET_ATTRIBUTE), 1);
        assert_eq!(int(&records[0], EVENT_ATTRIBUTE), 1);
        assert_eq!(
            s.pipeline.last_known_session().map(SessionId::as_str),
            Some("fedcba9876543210fedcba9876543210")
        );
        // Every emitted event counts as activity once.
        assert_eq!(s.session.extended.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_session_change_while_hidden_is_dropped() {
        let mut s = setup();
        s.pipeline.emit(event(now()), || ());

        s.visibility.set_hidden(true);
        s.session.set("fedcba9876543210fedcba9876543210");

        let outcome = s.pipeline.emit(event(now()), || panic!("must not notify"));
        assert_eq!(outcome, EmitOutcome::Dropped(DropReason::HiddenSessionChange));
        assert_eq!(s.sink.take().len(), 1);
        assert_eq!(s.pipeline.next_event(), 2);

        // Once visible again, the new session starts recording.
        s.visibility.set_hidden(false);
        let outcome = s.pipeline.emit(event(now()), || ());
        assert_eq!(outcome, EmitOutcome::Emitted { event: 1, chunks: 1 });
    }

    #[test]
    fn test_hidden_without_session_change_emits() {
        let mut s = setup();
        s.visibility.set_hidden(true);

        let outcome = s.pipeline.emit(event(now()), || ());
        assert_eq!(outcome, EmitOutcome::Emitted { event: 1, chunks: 1 });
    }

    #[test]
    fn test_max_recording_length() {
        let mut s = setup();
        let limit = now() + MAX_RECORDING_LENGTH.as_millis() as f64;

        assert_eq!(
            s.pipeline.emit(event(limit), || ()),
            EmitOutcome::Emitted { event: 1, chunks: 1 }
        );
        assert_eq!(
            s.pipeline.emit(event(limit + 1.0), || ()),
            EmitOutcome::Dropped(DropReason::RecordingTooLong)
        );
        // Dropped events do not consume an index.
        assert_eq!(s.pipeline.next_event(), 2);
    }

    #[test]
    fn test_emit_for_session_leaves_session_alone() {
        let mut s = setup();
        let other = SessionId::parse("fedcba9876543210fedcba9876543210").unwrap();

        let mut changed = false;
        let outcome = s
            .pipeline
            .emit_for_session(event(now()), Some(other.clone()), || changed = true);
        assert!(changed);
        assert!(outcome.is_emitted());
        assert_eq!(s.pipeline.last_known_session(), Some(&other));
        assert_eq!(s.session.extended.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_events_are_not_activity() {
        let mut s = setup();
        let limit = now() + MAX_RECORDING_LENGTH.as_millis() as f64;

        let outcome = s.pipeline.emit(event(limit + 1.0), || ());
        assert!(!outcome.is_emitted());
        assert_eq!(s.session.extended.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_paused_drops_everything() {
        let mut s = setup();

        s.pipeline.pause();
        assert!(s.pipeline.is_paused());
        assert_eq!(
            s.pipeline.emit(event(now()), || ()),
            EmitOutcome::Dropped(DropReason::Paused)
        );
        assert!(s.sink.take().is_empty());
        assert_eq!(s.session.extended.load(Ordering::SeqCst), 0);

        s.pipeline.resume();
        assert_eq!(
            s.pipeline.emit(event(now()), || ()),
            EmitOutcome::Emitted { event: 1, chunks: 1 }
        );
    }

    #[test]
    fn test_splunk_timestamps_are_floored() {
        let mut s = setup();
        let context = EmitContext::new(RecorderType::Splunk, now() + 0.75, json!({}));

        s.pipeline.emit(context, || ());
        assert_eq!(s.sink.take()[0].timestamp_ms, now());
    }

    #[test]
    fn test_debug_logging() {
        rum_test::setup();

        let s = setup();
        let mut pipeline = RecorderPipeline::new(
            s.session.clone(),
            Arc::new(s.visibility.clone()),
            s.sink.clone(),
            Arc::new(s.clock.clone()),
        )
        .with_debug(true);

        pipeline.emit(event(now()), || ());
        assert_eq!(s.sink.take().len(), 1);
    }
}

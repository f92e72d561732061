use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use rum_common::constants::{
    APPLICATION_NAME, BROWSER_INSTANCE_ID, RUM_VERSION, SCRIPT_INSTANCE, SDK_NAME, SDK_VERSION,
    TELEMETRY_SDK_LANGUAGE, TELEMETRY_SDK_NAME, TELEMETRY_SDK_VERSION, USER_AGENT,
};
use rum_common::{
    Attributes, Clock, KeyValueStorage, Resource, SessionId, Subscribers, SubscriptionId,
    generate_id,
};
use rum_config::{Config, PersistenceMode, RumOptions, UserTrackingMode};
use rum_export::{BatchConfig, OtlpExporter, Transport};
use rum_replays::{PageVisibility, RecorderSession};
use rum_sampling::{ActivitySampler, AlwaysOnSampler, SessionBasedSampler};
use rum_session::{
    AnonymousIdStore, CookiePersistence, LocalStoragePersistence, SessionPersistence,
    SessionStore, SessionStoreConfig, SessionTracker,
};
use rum_spans::{
    BatchSpanProcessor, LoggingSpanProcessor, SpanAttributesProcessor, SpanData, Tracer,
    TracerProvider,
};

use crate::context::BrowserContext;
use crate::error::InitError;
use crate::events::RumEvent;
use crate::recorder::SessionRecorder;

/// Language reported in `telemetry.sdk.language`.
const SDK_LANGUAGE: &str = "webjs";

/// The session as seen by recorders and other external span sources.
pub(crate) struct RumSession {
    tracker: Arc<SessionTracker>,
    all_spans_extend_session: bool,
}

impl RecorderSession for RumSession {
    fn session_id(&self) -> Option<SessionId> {
        self.tracker.session_id()
    }

    fn on_external_span_created(&self) {
        self.tracker
            .update_session_status(false, self.all_spans_extend_session);
    }
}

/// Everything created by a successful [`Rum::init`].
pub(crate) struct RumState {
    pub(crate) config: Config,
    pub(crate) resource: Resource,
    pub(crate) provider: TracerProvider,
    pub(crate) session: Arc<RumSession>,
    pub(crate) attributes: Arc<SpanAttributesProcessor>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) local_storage: Option<Arc<dyn KeyValueStorage>>,
    pub(crate) visibility: Arc<dyn PageVisibility>,
    pub(crate) clock: Arc<dyn Clock>,
    store: Arc<SessionStore>,
    anonymous_ids: AnonymousIdStore,
    user_tracking_mode: Mutex<UserTrackingMode>,
    session_subscription: SubscriptionId,
    recorder: Mutex<Option<Arc<SessionRecorder>>>,
}

impl RumState {
    pub(crate) fn tracker(&self) -> &Arc<SessionTracker> {
        &self.session.tracker
    }

    pub(crate) fn recorder_running(&self) -> bool {
        self.recorder
            .lock()
            .as_ref()
            .is_some_and(|recorder| recorder.is_active())
    }

    pub(crate) fn anonymous_id(&self) -> Option<String> {
        match *self.user_tracking_mode.lock() {
            UserTrackingMode::AnonymousTracking => Some(self.anonymous_ids.get_or_create()),
            UserTrackingMode::NoTracking => None,
        }
    }
}

fn resource_attributes(config: &Config, context: &BrowserContext) -> Attributes {
    let mut attributes = Attributes::from([
        (TELEMETRY_SDK_LANGUAGE.to_owned(), SDK_LANGUAGE.into()),
        (TELEMETRY_SDK_NAME.to_owned(), SDK_NAME.into()),
        (TELEMETRY_SDK_VERSION.to_owned(), SDK_VERSION.into()),
        (RUM_VERSION.to_owned(), SDK_VERSION.into()),
        (SCRIPT_INSTANCE.to_owned(), generate_id(64).into()),
        (APPLICATION_NAME.to_owned(), config.application_name().into()),
    ]);

    if let Some(ref user_agent) = context.user_agent {
        attributes.insert(USER_AGENT.to_owned(), user_agent.as_str().into());
    }

    if let Some(ref id) = context.browser_instance_id {
        attributes.insert(BROWSER_INSTANCE_ID.to_owned(), id.as_str().into());
    }

    attributes
}

fn session_persistence(
    config: &Config,
    context: &BrowserContext,
) -> Result<Arc<dyn SessionPersistence>, InitError> {
    match config.persistence() {
        PersistenceMode::Cookie => {
            let cookies = context.cookies.clone().ok_or(InitError::NotInBrowser)?;
            let domain = config.cookie_domain().map(str::to_owned);
            Ok(Arc::new(CookiePersistence::new(cookies, domain)))
        }
        PersistenceMode::LocalStorage => {
            let storage = context.local_storage.clone().ok_or(InitError::NotInBrowser)?;
            Ok(Arc::new(LocalStoragePersistence::new(storage)))
        }
    }
}

/// The real user monitoring client.
///
/// An instance starts uninitialized. [`init`](Self::init) sets up session tracking, sampling,
/// the span pipeline and, if enabled, session recording. All other methods are safe to call at
/// any time and are no-ops or return empty values while the client is not initialized.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use rum::{BrowserContext, Rum};
/// use rum_config::RumOptions;
/// use rum_export::MemoryTransport;
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let options: RumOptions = serde_json::from_value(serde_json::json!({
///     "endpoint": "https://rum.example.com",
///     "rumAccessToken": "token",
///     "applicationName": "shop",
/// }))
/// .unwrap();
///
/// let rum = Rum::new();
/// rum.init(options, BrowserContext::in_memory(Arc::new(MemoryTransport::new())))
///     .unwrap();
///
/// assert!(rum.get_session_id().is_some());
/// rum.deinit().await;
/// # });
/// ```
pub struct Rum {
    /// Serializes `init` calls. Listeners may call back into the client during `init`, so the
    /// state lock is only taken once the pipeline is ready.
    init_lock: Mutex<()>,
    state: RwLock<Option<Arc<RumState>>>,
    events: Arc<Subscribers<RumEvent>>,
}

impl Rum {
    /// Creates an uninitialized client.
    pub fn new() -> Self {
        Self {
            init_lock: Mutex::new(()),
            state: RwLock::new(None),
            events: Arc::new(Subscribers::new()),
        }
    }

    /// Initializes the client.
    ///
    /// Must be called within a tokio runtime. Fails if the options are invalid, if the context
    /// lacks the storage for the configured persistence, or if the client is already
    /// initialized. Configuration errors that are not fatal are logged and initialization is
    /// aborted without side effects.
    pub fn init(&self, options: RumOptions, mut context: BrowserContext) -> Result<(), InitError> {
        let _guard = self.init_lock.lock();
        if self.is_initialized() {
            rum_log::warn!("rum already initialized");
            return Err(InitError::AlreadyInitialized);
        }

        let config = match Config::from_options(options) {
            Ok(config) => config,
            Err(error) if !error.is_fatal() => {
                rum_log::error!(
                    error = &error as &dyn std::error::Error,
                    "rum initialization aborted"
                );
                return Err(error.into());
            }
            Err(error) => return Err(error.into()),
        };

        rum_log::init(&config.log_config());

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(InitError::NoRuntime);
        }

        let persistence = session_persistence(&config, &context)?;
        let resource = Resource::new(resource_attributes(&config, &context));

        let store = Arc::new(SessionStore::new(
            Arc::clone(&persistence),
            Arc::clone(&context.clock),
            SessionStoreConfig {
                inactivity_timeout: config.inactivity_timeout(),
                max_duration: config.max_session_duration(),
            },
        ));

        let events = Arc::clone(&self.events);
        let session_subscription = store.subscribe(move |change| {
            events.notify(&RumEvent::SessionChanged {
                session_id: change.session.id.clone(),
            });
        });

        let tracker = Arc::new(SessionTracker::new(Arc::clone(&store)));
        let anonymous_ids = AnonymousIdStore::new(persistence);
        let user_tracking_mode = config.user_tracking_mode();

        let mut attributes =
            SpanAttributesProcessor::new(config.static_span_attributes(), tracker.clone())
                .with_anonymous_ids(anonymous_ids.clone());
        if let Some(location) = context.location.clone() {
            attributes = attributes.with_location(location);
        }
        attributes.set_anonymous_tracking(matches!(
            user_tracking_mode,
            UserTrackingMode::AnonymousTracking
        ));

        let events = Arc::clone(&self.events);
        attributes.subscribe(move |attributes| {
            events.notify(&RumEvent::GlobalAttributesChanged {
                attributes: attributes.clone(),
            });
        });
        let attributes = Arc::new(attributes);

        let all_spans_extend_session = config.all_spans_extend_session();
        let mut builder = TracerProvider::builder()
            .with_resource(resource.clone())
            .with_clock(Arc::clone(&context.clock))
            .with_processor(Arc::clone(&attributes));

        builder = match config.sampler_ratio() {
            Some(ratio) => builder.with_sampler(ActivitySampler::new(
                SessionBasedSampler::new(ratio, tracker.clone()),
                tracker.clone(),
                all_spans_extend_session,
            )),
            None => builder.with_sampler(ActivitySampler::new(
                AlwaysOnSampler,
                tracker.clone(),
                all_spans_extend_session,
            )),
        };

        if let Some(url) = config.trace_export_url() {
            let exporter = OtlpExporter::<SpanData>::new(
                url,
                config.export_headers(),
                Arc::clone(&context.transport),
                Arc::new(resource.clone()),
            );
            let batch = BatchConfig {
                max_export_batch_size: config.max_export_batch_size(),
                scheduled_delay: config.scheduled_delay(),
            };
            builder = builder.with_processor(BatchSpanProcessor::new(batch, exporter));
        }

        if config.debug() {
            builder = builder.with_processor(LoggingSpanProcessor);
        }

        let state = Arc::new(RumState {
            resource,
            provider: builder.build(),
            session: Arc::new(RumSession {
                tracker,
                all_spans_extend_session,
            }),
            attributes,
            transport: Arc::clone(&context.transport),
            local_storage: context.local_storage.clone(),
            visibility: Arc::clone(&context.visibility),
            clock: Arc::clone(&context.clock),
            store,
            anonymous_ids,
            user_tracking_mode: Mutex::new(user_tracking_mode),
            session_subscription,
            recorder: Mutex::new(None),
            config,
        });

        if state.config.recorder().enabled {
            match context.recorder.take() {
                Some(recorder) => match SessionRecorder::start_with(&state, recorder) {
                    Ok(recorder) => *state.recorder.lock() = Some(Arc::new(recorder)),
                    Err(error) => rum_log::error!(
                        error = &error as &dyn std::error::Error,
                        "session recorder not started"
                    ),
                },
                None => rum_log::warn!("session recording enabled, but no recorder available"),
            }
        }

        *self.state.write() = Some(state);
        rum_log::info!("rum initialized");
        Ok(())
    }

    pub(crate) fn state(&self) -> Option<Arc<RumState>> {
        self.state.read().clone()
    }

    /// Returns `true` after a successful [`init`](Self::init).
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Shuts the client down.
    ///
    /// Stops session tracking and recording, flushes and shuts down the span pipeline and
    /// forgets the anonymous user id. Listeners are removed. The client can be initialized
    /// again afterwards.
    pub async fn deinit(&self) {
        let Some(state) = self.state.write().take() else {
            return;
        };

        let recorder = state.recorder.lock().take();
        if let Some(recorder) = recorder {
            recorder.deinit().await;
        }

        state.store.unsubscribe(state.session_subscription);
        state.tracker().deinit();
        state.provider.shutdown().await;
        state.anonymous_ids.forget();
        self.events.clear();

        rum_log::info!("rum deinitialized");
    }

    /// Returns the current session id.
    ///
    /// This brings the session up to date, so an expired session is replaced by a new one.
    pub fn get_session_id(&self) -> Option<SessionId> {
        self.state()?.tracker().session_id()
    }

    /// Returns `true` if the current session was started by this page.
    pub fn is_new_session_id(&self) -> bool {
        self.state()
            .is_some_and(|state| state.tracker().is_new_session())
    }

    /// Returns the anonymous user id while anonymous tracking is on.
    pub fn get_anonymous_id(&self) -> Option<String> {
        self.state()?.anonymous_id()
    }

    /// Switches between anonymous tracking and no tracking.
    pub fn set_user_tracking_mode(&self, mode: UserTrackingMode) {
        if let Some(state) = self.state() {
            *state.user_tracking_mode.lock() = mode;
            state
                .attributes
                .set_anonymous_tracking(mode == UserTrackingMode::AnonymousTracking);
        }
    }

    /// Merges attributes into the global attributes of all spans started from now on.
    ///
    /// `None` removes all attributes set at runtime. Listeners receive
    /// [`RumEvent::GlobalAttributesChanged`].
    pub fn set_global_attributes(&self, attributes: Option<Attributes>) {
        if let Some(state) = self.state() {
            state.attributes.set_global_attributes(attributes);
        }
    }

    /// Returns the effective global attributes.
    pub fn get_global_attributes(&self) -> Attributes {
        self.state()
            .map(|state| state.attributes.get_global_attributes())
            .unwrap_or_default()
    }

    /// Registers a listener for [`RumEvent`]s.
    pub fn add_event_listener<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RumEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Removes a listener.
    pub fn remove_event_listener(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Reports a span created outside of the tracer, such as recorder activity.
    ///
    /// Such spans extend the session only when every span counts as activity, otherwise the
    /// session status is merely refreshed.
    pub fn on_external_span_created(&self) {
        if let Some(state) = self.state() {
            state.session.on_external_span_created();
        }
    }

    /// Handles a change of page visibility. Pending telemetry is flushed when the page becomes
    /// hidden.
    pub async fn on_visibility_change(&self, hidden: bool) {
        if !hidden {
            return;
        }

        let Some(state) = self.state() else {
            return;
        };

        state.provider.force_flush().await;
        let recorder = state.recorder.lock().clone();
        if let Some(recorder) = recorder {
            recorder.force_flush().await;
        }
    }

    /// Returns a tracer for the given instrumentation.
    pub fn tracer(&self, name: &str, version: &str) -> Option<Tracer> {
        Some(self.state()?.provider.tracer(name, version))
    }

    /// Returns the resource of this page instance.
    pub fn resource(&self) -> Option<Resource> {
        Some(self.state()?.resource.clone())
    }

    /// Returns the session recorder started during [`init`](Self::init) or later through
    /// [`SessionRecorder::start`].
    pub fn session_recorder(&self) -> Option<Arc<SessionRecorder>> {
        self.state()?.recorder.lock().clone()
    }

    pub(crate) fn set_session_recorder(&self, recorder: Arc<SessionRecorder>) {
        if let Some(state) = self.state() {
            *state.recorder.lock() = Some(recorder);
        }
    }
}

impl Default for Rum {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Rum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rum")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

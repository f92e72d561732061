use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rum_common::{AttributeValue, Attributes};
use rum_log::{Level, LogConfig};
use url::Url;

use crate::options::{RecorderType, RumOptions, UserTrackingMode};

/// Default name of the instrumented application.
pub const DEFAULT_APPLICATION_NAME: &str = "unknown-browser-app";

/// Default maximum number of spans in an export batch.
pub const DEFAULT_BUFFER_SIZE: usize = 50;

/// Default maximum delay of a span before it is exported, in milliseconds.
///
/// A tradeoff between batching and losing spans when the page closes before they are sent.
pub const DEFAULT_BUFFER_TIMEOUT_MS: u64 = 4_000;

/// Default session inactivity timeout, in milliseconds.
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 15 * 60 * 1000;

/// Default maximum session duration, in milliseconds.
pub const DEFAULT_MAX_SESSION_DURATION_MS: u64 = 4 * 60 * 60 * 1000;

/// Defines the source of a config error.
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a single option.
    Field(&'static str),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    source: ConfigErrorSource,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            kind,
            source: ConfigErrorSource::None,
            cause: None,
        }
    }

    #[inline]
    fn wrap<E>(cause: E, kind: ConfigErrorKind) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            source: ConfigErrorSource::None,
            cause: Some(Box::new(cause)),
        }
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::Field(name);
        self
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = ConfigErrorSource::File(path.as_ref().to_path_buf());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    /// Returns `true` if initialization must fail loudly on this error.
    ///
    /// Errors that are not fatal are logged and initialization is aborted without an error
    /// reaching the host page.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, ConfigErrorKind::InvalidPersistence)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => self.kind.fmt(f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::Field(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Parsing JSON failed.
    #[error("could not parse json config")]
    BadJson,
    /// No collector endpoint was configured.
    #[error("an endpoint is required, e.g. {{endpoint: 'https://something'}}")]
    MissingEndpoint,
    /// The collector endpoint does not use https.
    #[error("not using https is unsafe, use allowInsecureBeacon to force it")]
    InsecureEndpoint,
    /// The persistence mode is neither `cookie` nor `localStorage`.
    #[error(r#"invalid persistence, expected "cookie" or "localStorage""#)]
    InvalidPersistence,
    /// The sampler ratio is outside of `[0, 1]`.
    #[error("invalid sampler ratio, expected a number between 0 and 1")]
    InvalidSampleRatio,
    /// A config value is invalid.
    #[error("invalid config value")]
    InvalidValue,
}

/// The medium in which session state is persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PersistenceMode {
    /// A first-party cookie, shared across subdomains when a cookie domain is configured.
    #[default]
    Cookie,
    /// The origin's local storage.
    LocalStorage,
}

impl PersistenceMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "cookie" => Ok(Self::Cookie),
            "localStorage" => Ok(Self::LocalStorage),
            _ => Err(ConfigError::new(ConfigErrorKind::InvalidPersistence).field("persistence")),
        }
    }
}

/// Resolved session recorder configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RecorderConfig {
    /// Starts the recorder after initialization.
    pub enabled: bool,
    /// The recorder flavour.
    pub recorder_type: RecorderType,
    /// Stages exported recordings in local storage until they are sent.
    pub use_persistent_export_queue: bool,
}

/// Applies a legacy alias.
///
/// The alias is used when the current option is missing or still has its default value.
fn migrate(
    current: Option<String>,
    legacy: Option<String>,
    default: Option<&str>,
) -> Option<String> {
    match (current, legacy) {
        (Some(current), Some(legacy)) if Some(current.as_str()) == default => Some(legacy),
        (Some(current), _) => Some(current),
        (None, legacy) => legacy,
    }
}

/// Validated configuration of the rum pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    endpoint: Option<String>,
    rum_access_token: Option<String>,
    application_name: String,
    deployment_environment: Option<String>,
    version: Option<String>,
    global_attributes: Attributes,
    persistence: PersistenceMode,
    cookie_domain: Option<String>,
    debug: bool,
    max_export_batch_size: usize,
    scheduled_delay: Duration,
    user_tracking_mode: UserTrackingMode,
    sampler_ratio: Option<f64>,
    all_spans_extend_session: bool,
    inactivity_timeout: Duration,
    max_session_duration: Duration,
    recorder: RecorderConfig,
}

impl Config {
    /// Validates the given options and applies defaults.
    pub fn from_options(options: RumOptions) -> Result<Self, ConfigError> {
        let RumOptions {
            endpoint,
            beacon_endpoint,
            beacon_url,
            rum_access_token,
            rum_auth,
            application_name,
            app,
            deployment_environment,
            environment,
            version,
            global_attributes,
            persistence,
            cookie_domain,
            allow_insecure_beacon,
            debug,
            buffer_size,
            buffer_timeout,
            user,
            tracer,
            all_spans_extend_session,
            session,
            session_recorder,
        } = options;

        let beacon_endpoint = migrate(beacon_endpoint, beacon_url, None);
        let rum_access_token = migrate(rum_access_token, rum_auth, None);
        let deployment_environment = migrate(deployment_environment, environment, None);
        let application_name = migrate(application_name, app, Some(DEFAULT_APPLICATION_NAME))
            .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_owned());

        let endpoint = endpoint
            .or(beacon_endpoint)
            .filter(|endpoint| !endpoint.is_empty());

        if !debug {
            let Some(ref endpoint) = endpoint else {
                return Err(ConfigError::new(ConfigErrorKind::MissingEndpoint));
            };

            let url = Url::parse(endpoint).map_err(|e| {
                ConfigError::wrap(e, ConfigErrorKind::InvalidValue).field("endpoint")
            })?;

            if url.scheme() != "https" && !allow_insecure_beacon {
                return Err(ConfigError::new(ConfigErrorKind::InsecureEndpoint).field("endpoint"));
            }

            if rum_access_token.is_none() {
                rum_log::warn!("rumAccessToken will be required in the future");
            }
        }

        let persistence = match persistence.as_deref() {
            None => PersistenceMode::default(),
            Some(value) => PersistenceMode::parse(value)?,
        };

        let sampler_ratio = tracer.sampler.and_then(|sampler| sampler.ratio);
        if let Some(ratio) = sampler_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::new(ConfigErrorKind::InvalidSampleRatio)
                    .field("tracer.sampler.ratio"));
            }
        }

        let max_export_batch_size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        if max_export_batch_size == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("bufferSize"));
        }

        let inactivity_timeout = session
            .inactivity_timeout_ms
            .unwrap_or(DEFAULT_INACTIVITY_TIMEOUT_MS);
        if inactivity_timeout == 0 {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue)
                .field("session.inactivityTimeoutMs"));
        }

        let recorder_type = session_recorder.recorder.unwrap_or_default();
        let recorder = RecorderConfig {
            enabled: session_recorder.enabled,
            recorder_type,
            use_persistent_export_queue: session_recorder
                .use_persistent_export_queue
                .unwrap_or(recorder_type == RecorderType::Splunk),
        };

        Ok(Self {
            endpoint,
            rum_access_token,
            application_name,
            deployment_environment,
            version,
            global_attributes,
            persistence,
            cookie_domain,
            debug,
            max_export_batch_size,
            scheduled_delay: Duration::from_millis(
                buffer_timeout.unwrap_or(DEFAULT_BUFFER_TIMEOUT_MS),
            ),
            user_tracking_mode: user.tracking_mode.unwrap_or_default(),
            sampler_ratio,
            all_spans_extend_session,
            inactivity_timeout: Duration::from_millis(inactivity_timeout),
            max_session_duration: Duration::from_millis(
                session
                    .max_duration_ms
                    .unwrap_or(DEFAULT_MAX_SESSION_DURATION_MS),
            ),
            recorder,
        })
    }

    /// Parses the options from a JSON value and validates them.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let options = serde_json::from_value(value)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson))?;
        Self::from_options(options)
    }

    /// Loads the options from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, all other files as YAML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let f = fs::File::open(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;
        let reader = io::BufReader::new(f);

        let options: RumOptions = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_reader(reader)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadJson).file(path))?,
            _ => serde_yaml::from_reader(reader)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(path))?,
        };

        Self::from_options(options).map_err(|e| e.file(path))
    }

    /// Returns the collector base URL.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the URL that span batches are sent to.
    pub fn trace_export_url(&self) -> Option<String> {
        self.endpoint().map(|endpoint| format!("{endpoint}/v1/traces"))
    }

    /// Returns the URL that recorder log batches are sent to.
    pub fn log_export_url(&self) -> Option<String> {
        self.endpoint().map(|endpoint| format!("{endpoint}/v1/logs"))
    }

    /// Returns the headers sent with every export request.
    pub fn export_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(ref token) = self.rum_access_token {
            headers.insert("Authorization".to_owned(), token.clone());
        }
        headers
    }

    /// Returns the access token.
    pub fn rum_access_token(&self) -> Option<&str> {
        self.rum_access_token.as_deref()
    }

    /// Returns the name of the instrumented application.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Returns the deployment environment.
    pub fn deployment_environment(&self) -> Option<&str> {
        self.deployment_environment.as_deref()
    }

    /// Returns the version of the instrumented application.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the static attributes stamped onto every span.
    ///
    /// These are the environment and version attributes, overridden by the configured global
    /// attributes of the same name.
    pub fn static_span_attributes(&self) -> Attributes {
        use rum_common::constants::{APP_VERSION, DEPLOYMENT_ENVIRONMENT, ENVIRONMENT};

        let mut attributes = Attributes::new();

        if let Some(ref environment) = self.deployment_environment {
            let value = AttributeValue::from(environment.as_str());
            attributes.insert(ENVIRONMENT.to_owned(), value.clone());
            attributes.insert(DEPLOYMENT_ENVIRONMENT.to_owned(), value);
        }

        if let Some(ref version) = self.version {
            attributes.insert(APP_VERSION.to_owned(), version.as_str().into());
        }

        attributes.extend(
            self.global_attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        attributes
    }

    /// Returns the medium in which session state is persisted.
    pub fn persistence(&self) -> PersistenceMode {
        self.persistence
    }

    /// Returns the domain attribute of the session cookie.
    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    /// Returns `true` if debug mode is enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the logging configuration derived from the debug flag.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: if self.debug { Level::Debug } else { Level::Warn },
            ..Default::default()
        }
    }

    /// Returns the maximum number of spans in an export batch.
    pub fn max_export_batch_size(&self) -> usize {
        self.max_export_batch_size
    }

    /// Returns the maximum delay between the first span of a batch and its export.
    pub fn scheduled_delay(&self) -> Duration {
        self.scheduled_delay
    }

    /// Returns the initial user tracking mode.
    pub fn user_tracking_mode(&self) -> UserTrackingMode {
        self.user_tracking_mode
    }

    /// Returns the ratio of the session-based sampler, if sampling is configured.
    pub fn sampler_ratio(&self) -> Option<f64> {
        self.sampler_ratio
    }

    /// Returns `true` if every span start counts as session activity.
    pub fn all_spans_extend_session(&self) -> bool {
        self.all_spans_extend_session
    }

    /// Returns the session inactivity timeout.
    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Returns the hard limit of a session's lifetime.
    pub fn max_session_duration(&self) -> Duration {
        self.max_session_duration
    }

    /// Returns the session recorder configuration.
    pub fn recorder(&self) -> &RecorderConfig {
        &self.recorder
    }
}

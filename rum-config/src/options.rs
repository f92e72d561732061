use serde::{Deserialize, Serialize};

use rum_common::Attributes;

/// Controls whether an anonymous user id is attached to telemetry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UserTrackingMode {
    /// No user id is generated or attached.
    #[default]
    NoTracking,
    /// A random id is persisted and attached as `user.anonymous_id`.
    AnonymousTracking,
}

/// The flavour of session replay recorder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderType {
    /// The rrweb recorder, emitting fractional millisecond timestamps.
    #[default]
    Rrweb,
    /// The splunk recorder, emitting whole millisecond timestamps.
    Splunk,
}

impl RecorderType {
    /// Returns the value of the `kloudmate.sessionReplay` resource attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rrweb => "rrweb",
            Self::Splunk => "splunk",
        }
    }
}

/// User options.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserOptions {
    /// See [`UserTrackingMode`].
    pub tracking_mode: Option<UserTrackingMode>,
}

/// Options of the session-based sampler.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplerOptions {
    /// Fraction of sessions to sample in `[0, 1]`.
    pub ratio: Option<f64>,
}

/// Tracer options.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerOptions {
    /// Session-based sampling. Without a sampler every span is sampled.
    pub sampler: Option<SamplerOptions>,
}

/// Session lifetime options.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Time without activity after which a session expires.
    pub inactivity_timeout_ms: Option<u64>,
    /// Hard limit of a session's lifetime, regardless of activity.
    pub max_duration_ms: Option<u64>,
}

/// Session recorder options.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderOptions {
    /// Starts the recorder after initialization.
    pub enabled: bool,
    /// The recorder flavour.
    pub recorder: Option<RecorderType>,
    /// Stages exported recordings in local storage until they are sent.
    pub use_persistent_export_queue: Option<bool>,
}

/// The raw options passed to `init`.
///
/// Every field is optional. Use [`Config::from_options`](crate::Config::from_options) to
/// validate the options and apply defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RumOptions {
    /// Base URL of the collector.
    pub endpoint: Option<String>,
    /// Alternative collector URL, used when `endpoint` is not set.
    pub beacon_endpoint: Option<String>,
    /// Legacy name of `beaconEndpoint`.
    pub beacon_url: Option<String>,
    /// Value of the `Authorization` header sent with every export.
    pub rum_access_token: Option<String>,
    /// Legacy name of `rumAccessToken`.
    pub rum_auth: Option<String>,
    /// Name of the instrumented application.
    pub application_name: Option<String>,
    /// Legacy name of `applicationName`.
    pub app: Option<String>,
    /// Deployment environment, such as `production`.
    pub deployment_environment: Option<String>,
    /// Legacy name of `deploymentEnvironment`.
    pub environment: Option<String>,
    /// Version of the instrumented application.
    pub version: Option<String>,
    /// Attributes added to every span.
    pub global_attributes: Attributes,
    /// Either `cookie` or `localStorage`.
    pub persistence: Option<String>,
    /// Domain attribute of the session cookie.
    pub cookie_domain: Option<String>,
    /// Allows non-https collector URLs.
    pub allow_insecure_beacon: bool,
    /// Enables debug logging and relaxes endpoint validation.
    pub debug: bool,
    /// Maximum number of spans per export batch.
    pub buffer_size: Option<usize>,
    /// Maximum time in milliseconds a span waits before it is exported.
    pub buffer_timeout: Option<u64>,
    /// User tracking options.
    pub user: UserOptions,
    /// Tracer options.
    pub tracer: TracerOptions,
    /// Counts every span start as user activity that extends the session.
    #[serde(alias = "_experimental_allSpansExtendSession")]
    pub all_spans_extend_session: bool,
    /// Session lifetime options.
    pub session: SessionOptions,
    /// Session recorder options.
    pub session_recorder: RecorderOptions,
}

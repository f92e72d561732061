//! Well-known attribute keys and SDK identification.

/// Name of the SDK as reported in `telemetry.sdk.name`.
pub const SDK_NAME: &str = "@kloudmate/otel-web";

/// Version of the SDK as reported in `telemetry.sdk.version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resource attribute carrying the SDK name.
pub const TELEMETRY_SDK_NAME: &str = "telemetry.sdk.name";

/// Resource attribute carrying the SDK version.
pub const TELEMETRY_SDK_VERSION: &str = "telemetry.sdk.version";

/// Resource attribute carrying the SDK language.
pub const TELEMETRY_SDK_LANGUAGE: &str = "telemetry.sdk.language";

/// Resource attribute carrying the RUM library version.
pub const RUM_VERSION: &str = "kloudmate.rumVersion";

/// Resource attribute identifying one initialization of the library.
pub const SCRIPT_INSTANCE: &str = "kloudmate.scriptInstance";

/// Span and resource attribute carrying the current session id.
pub const SESSION_ID: &str = "kloudmate.rumSessionId";

/// Resource attribute naming the active session replay flavour.
pub const SESSION_REPLAY: &str = "kloudmate.sessionReplay";

/// Span attribute carrying the anonymous user id.
pub const ANONYMOUS_USER_ID: &str = "user.anonymous_id";

/// Resource attribute carrying the application name.
pub const APPLICATION_NAME: &str = "app";

/// Resource attribute carrying the user agent.
pub const USER_AGENT: &str = "userAgent";

/// Resource attribute carrying the browser instance id, if the host provides one.
pub const BROWSER_INSTANCE_ID: &str = "browser.instance.id";

/// Span attribute carrying the deployment environment.
pub const ENVIRONMENT: &str = "environment";

/// Span attribute carrying the deployment environment, semantic convention spelling.
pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

/// Span attribute carrying the application version.
pub const APP_VERSION: &str = "app.version";

/// Span attribute carrying the page location.
pub const LOCATION_HREF: &str = "location.href";

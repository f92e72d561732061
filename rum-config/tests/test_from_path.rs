use std::io::Write;

use rum_config::{Config, ConfigErrorKind, PersistenceMode, UserTrackingMode};

#[test]
fn test_load_yaml() {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(
        file,
        r#"
endpoint: https://rum.example.com
rumAccessToken: token
persistence: localStorage
user:
  trackingMode: anonymousTracking
session:
  inactivityTimeoutMs: 60000
"#
    )
    .unwrap();

    let config = Config::from_path(file.path()).unwrap();
    assert_eq!(config.persistence(), PersistenceMode::LocalStorage);
    assert_eq!(
        config.user_tracking_mode(),
        UserTrackingMode::AnonymousTracking
    );
    assert_eq!(config.inactivity_timeout().as_millis(), 60_000);
}

#[test]
fn test_load_json() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"endpoint": "https://rum.example.com"}}"#).unwrap();

    let config = Config::from_path(file.path()).unwrap();
    assert_eq!(config.endpoint(), Some("https://rum.example.com"));
}

#[test]
fn test_bad_yaml_mentions_file() {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(file, "endpoint: [unclosed").unwrap();

    let error = Config::from_path(file.path()).unwrap_err();
    assert_eq!(error.kind(), ConfigErrorKind::BadYaml);
    assert!(error.to_string().contains("(file "));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let error = Config::from_path(dir.path().join("missing.yml")).unwrap_err();
    assert_eq!(error.kind(), ConfigErrorKind::CouldNotOpenFile);
}

//! Integration tests for the logging helpers

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, redact_query, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.filter.is_none());
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_oauth_material_is_redacted() {
    for field in ["access_token", "refresh_token", "client_secret", "Authorization"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{field}");
    }
}

#[test]
fn test_twitch_callback_fragment_is_redacted() {
    let fragment = "#access_token=73d0f8mkabpbmjp921asv2jaidwxn&scope=chat%3Aread&state=c3ab8aa6&token_type=bearer";
    let redacted = redact_query(fragment);

    assert!(!redacted.contains("73d0f8mkabpbmjp921asv2jaidwxn"));
    assert!(!redacted.contains("c3ab8aa6"));
    assert!(redacted.contains("scope=chat%3Aread"));
}

#[test]
fn test_bare_path_is_untouched() {
    assert_eq!(redact_query("users/follows"), "users/follows");
}

#[test]
fn test_spotify_callback_query_is_redacted() {
    let url = "http://localhost:8080/callback?code=NApCCgBkWtQ&state=34fFs29kd09";
    assert_eq!(
        redact_query(url),
        "http://localhost:8080/callback?code=[REDACTED]&state=[REDACTED]"
    );
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Trace)
        .with_filter("provider_twitch=trace")
        .with_span_events(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Trace);
    assert_eq!(config.filter.as_deref(), Some("provider_twitch=trace"));
    assert!(config.span_events);
}

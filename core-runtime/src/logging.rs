//! # Logging
//!
//! `tracing` setup for the overlay core. [`init_logging`] installs one global
//! subscriber made of:
//! - an `EnvFilter` scoped to the workspace crates (`RUST_LOG` wins when set
//!   and no explicit filter was configured)
//! - a fmt layer in the chosen [`LogFormat`]
//! - a mirror layer that hands every surviving event to the host's
//!   [`LoggerSink`], with OAuth material masked
//!
//! ```ignore
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```
//!
//! Tokens never reach a log line: field names that look like credentials are
//! replaced by `[REDACTED]`, and `url`-like fields have their query and
//! fragment parameters masked with [`redact_query`].

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates whose events are shown at the configured level by default.
const WORKSPACE_TARGETS: &[&str] = &[
    "overlay_core",
    "core_runtime",
    "core_auth",
    "core_service",
    "provider_twitch",
    "provider_spotify",
    "bridge_desktop",
];

/// Chatty dependencies, capped at `warn`.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls"];

/// Substrings of field or parameter names whose values are never logged.
const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "secret",
    "password",
    "authorization",
    "bearer",
    "api_key",
    "code",
    "state",
];

/// Field names holding URLs; their parameters go through [`redact_query`].
const URL_FIELDS: &[&str] = &["url", "uri", "redirect", "callback"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured.
    Pretty,
    /// One JSON object per event.
    Json,
    /// One line per event.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Mask credentials and emails before events reach the sink.
    pub redact_pii: bool,
    /// Full `EnvFilter` directive string; replaces the workspace defaults.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span enter/exit in the `Pretty` format and span context in `Json`.
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_pii_redaction(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enable: bool) -> Self {
        self.span_events = enable;
        self
    }
}

/// Install the global subscriber. Call once at startup.
///
/// # Errors
///
/// [`Error::Config`] for an unparsable filter, or when a global subscriber
/// is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let mirror = SinkMirrorLayer {
        sink: config.logger_sink.clone(),
        redact: config.redact_pii,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(mirror)
        .with(fmt_layer(&config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn fmt_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    match config.format {
        LogFormat::Pretty => layer
            .pretty()
            .with_span_events(if config.span_events {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.span_events)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
    }
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Some(custom) = &config.filter {
        return EnvFilter::try_new(custom)
            .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", custom, e)));
    }

    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }

    EnvFilter::try_new(default_directives(config.level))
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

fn default_directives(level: LogLevel) -> String {
    let level = level_directive(level);
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Forwards events to the host [`LoggerSink`].
struct SinkMirrorLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl<S> Layer<S> for SinkMirrorLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector {
            redact: self.redact,
            message: None,
            fields: HashMap::new(),
        };
        event.record(&mut fields);

        let mut entry = LogEntry::new(
            level,
            metadata.target(),
            fields.message.unwrap_or_else(|| metadata.name().to_string()),
        );
        entry.fields = fields.fields;
        entry.span = ctx.lookup_current().map(|span| span.name().to_string());

        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.log(entry).await {
                        eprintln!("log sink rejected entry: {}", err);
                    }
                });
            }
            Err(_) => {
                if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("log sink rejected entry: {}", err);
                }
            }
        }
    }
}

struct FieldCollector {
    redact: bool,
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }

        let value = if !self.redact {
            value
        } else if is_url_field(name) {
            redact_query(&value)
        } else {
            redact_if_sensitive(name, &value)
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

fn log_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::ERROR => LogLevel::Error,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::TRACE => LogLevel::Trace,
    }
}

fn is_sensitive(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|s| name.contains(s))
}

fn is_url_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    URL_FIELDS.iter().any(|s| name.contains(s))
}

/// Mask `value` when `field_name` names a credential; keep only the first
/// character of an email address.
///
/// ```
/// use core_runtime::logging::redact_if_sensitive;
///
/// assert_eq!(redact_if_sensitive("refresh_token", "AQD..."), "[REDACTED]");
/// assert_eq!(redact_if_sensitive("email", "dev@twitch.tv"), "d***@[REDACTED]");
/// assert_eq!(redact_if_sensitive("provider", "twitch"), "twitch");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    if is_sensitive(field_name) {
        return "[REDACTED]".to_string();
    }
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            format!("{}***@[REDACTED]", &local[..local.chars().next().map_or(0, char::len_utf8)])
        }
        _ => value.to_string(),
    }
}

/// Mask sensitive parameters in a URL or a raw callback parameter string.
///
/// Everything after the first `?` or `#` is treated as `key=value` pairs.
///
/// ```
/// use core_runtime::logging::redact_query;
///
/// assert_eq!(
///     redact_query("https://x.test/cb#access_token=abc&scope=chat%3Aread"),
///     "https://x.test/cb#access_token=[REDACTED]&scope=chat%3Aread"
/// );
/// ```
pub fn redact_query(url: &str) -> String {
    let Some(split_at) = url.find(['?', '#']) else {
        return if url.contains('=') {
            redact_pairs(url)
        } else {
            url.to_string()
        };
    };
    let (prefix, query) = url.split_at(split_at + 1);
    format!("{}{}", prefix, redact_pairs(query))
}

fn redact_pairs(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive(key) => format!("{}=[REDACTED]", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

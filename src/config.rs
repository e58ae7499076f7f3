//! Server configuration.
//!
//! A [`Config`] is built once at startup and shared (behind an `Arc`) with
//! every request. It can be assembled in code with the fluent setters or
//! loaded from TOML:
//!
//! ```toml
//! external           = true
//! request_id_headers = ["x-request-id", "request-id"]
//! max_body_size      = 65536
//! ```
//!
//! Fields missing from the file keep their defaults.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::HeaderName;
use serde::Deserialize;
use thiserror::Error;

/// Default body ceiling: 1 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default header consulted for an inbound correlation ID.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "request-id";

// ── Metrics ───────────────────────────────────────────────────────────────────

/// A single measurement handed to a [`Metrics`] sink.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub tags: Vec<(String, String)>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value, tags: Vec::new() }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// Destination for metrics emitted by handlers through
/// [`Request::metric`](crate::Request::metric).
///
/// portico forwards every call verbatim. Aggregation, naming conventions and
/// export belong to the implementation.
pub trait Metrics: Send + Sync + 'static {
    fn metric(&self, metric: Metric);
}

/// A sink that drops everything. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn metric(&self, _metric: Metric) {}
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Per-server settings consulted by every [`Request`](crate::Request).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The service is reachable by untrusted clients. Inbound correlation
    /// headers are hashed and salted instead of being trusted verbatim.
    pub external: bool,

    /// Header names checked, in order, for an inbound correlation ID.
    pub request_id_headers: Vec<String>,

    /// Body ceiling in bytes. A body that reaches this size is rejected.
    pub max_body_size: usize,

    #[serde(skip, default = "noop_metrics")]
    pub metrics: Arc<dyn Metrics>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }

    /// Replaces the candidate correlation headers. Names are matched
    /// case-insensitively.
    pub fn request_id_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_id_headers = names
            .into_iter()
            .map(|name| name.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn metrics(mut self, sink: impl Metrics) -> Self {
        self.metrics = Arc::new(sink);
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(source)?;
        config.request_id_headers = config
            .request_id_headers
            .into_iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid("max_body_size must be greater than zero".into()));
        }
        if self.request_id_headers.is_empty() {
            return Err(ConfigError::Invalid("request_id_headers must not be empty".into()));
        }
        for name in &self.request_id_headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::Invalid(format!("invalid header name `{name}`")));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            external: false,
            request_id_headers: vec![DEFAULT_REQUEST_ID_HEADER.to_owned()],
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            metrics: noop_metrics(),
        }
    }
}

fn noop_metrics() -> Arc<dyn Metrics> {
    Arc::new(NoopMetrics)
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("external", &self.external)
            .field("request_id_headers", &self.request_id_headers)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

/// Failure to load a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.external);
        assert_eq!(config.request_id_headers, ["request-id"]);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_and_lowercases_headers() {
        let config = Config::from_toml(
            r#"
            external = true
            request_id_headers = ["X-Request-ID", "Request-Id"]
            max_body_size = 512
            "#,
        )
        .unwrap();

        assert!(config.external);
        assert_eq!(config.request_id_headers, ["x-request-id", "request-id"]);
        assert_eq!(config.max_body_size, 512);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml("external = true").unwrap();
        assert_eq!(config.request_id_headers, ["request-id"]);
        assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn rejects_zero_ceiling() {
        let err = Config::from_toml("max_body_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_header_name() {
        let err = Config::new().request_id_headers(["bad header"]).validate().unwrap_err();
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portico.toml");
        std::fs::write(&path, "external = true\nmax_body_size = 2048\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.external);
        assert_eq!(config.max_body_size, 2048);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
    }

    #[test]
    fn loaded_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portico.toml");
        std::fs::write(&path, "request_id_headers = []\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(Config::from_toml("external = "), Err(ConfigError::Parse(_))));
    }
}

use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Iris";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local analysis backend, reachable under both the loopback hostname and its
/// numeric literal (some resolvers map `localhost` to `::1` only).
pub const DEFAULT_ENDPOINTS: &[&str] = &["http://localhost:5000", "http://127.0.0.1:5000"];

/// Comma-separated endpoint override.
pub const ENDPOINTS_ENV: &str = "IRIS_ENDPOINTS";

/// Path appended to every endpoint base URL.
pub const ANALYZE_PATH: &str = "/analyze";

/// Multipart field carrying the image bytes.
pub const UPLOAD_FIELD: &str = "image";

/// Element ids the result region may carry, in lookup order.
pub const RESULT_REGION_IDS: &[&str] = &["results", "diagnostic-result", "result"];

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "iris_lib=debug,iris_analyze=debug,warn"
    } else {
        "iris_lib=info,iris_analyze=info,warn"
    }
}

/// Debug builds log more verbosely.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one analysis endpoint is required")]
    NoEndpoints,

    #[error("Invalid analysis endpoint '{0}': expected an absolute http(s) URL")]
    InvalidEndpoint(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

// ═══════════════════════════════════════════════════════════
// Client configuration
// ═══════════════════════════════════════════════════════════

/// Ordered list of analysis service base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    endpoints: Vec<String>,
    system_proxy: bool,
}

impl ClientConfig {
    /// Validate and normalize an endpoint list. Order is preserved.
    pub fn new<I, S>(endpoints: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for raw in endpoints {
            let trimmed = raw.as_ref().trim().trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            let url = reqwest::Url::parse(trimmed)
                .map_err(|_| ConfigError::InvalidEndpoint(trimmed.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidEndpoint(trimmed.to_string()));
            }
            normalized.push(trimmed.to_string());
        }

        if normalized.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self {
            endpoints: normalized,
            system_proxy: true,
        })
    }

    /// Endpoints from `IRIS_ENDPOINTS`, or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(ENDPOINTS_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Self::new(raw.split(',')),
            _ => Ok(Self::default()),
        }
    }

    /// Connect directly, ignoring `HTTP_PROXY`-style environment settings.
    pub fn without_system_proxy(mut self) -> Self {
        self.system_proxy = false;
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn uses_system_proxy(&self) -> bool {
        self.system_proxy
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            system_proxy: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Choreography configuration
// ═══════════════════════════════════════════════════════════

/// Timing and lookup policy for bringing a fresh result into view.
///
/// The defaults give a search window of roughly 0.9s (15 polls at 60ms)
/// followed by a 700ms eased scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoreographyConfig {
    /// Element ids tried in order on every poll.
    pub candidate_ids: Vec<String>,
    /// Polls before giving up on the element or its images.
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Delay between the result becoming available and the first poll cycle.
    pub start_delay: Duration,
    pub scroll_duration: Duration,
    /// Animation frame period.
    pub frame_interval: Duration,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            candidate_ids: RESULT_REGION_IDS.iter().map(|id| id.to_string()).collect(),
            max_attempts: 15,
            poll_interval: Duration::from_millis(60),
            start_delay: Duration::from_millis(50),
            scroll_duration: Duration::from_millis(700),
            frame_interval: Duration::from_millis(16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_try_hostname_first() {
        let config = ClientConfig::default();
        assert_eq!(
            config.endpoints(),
            ["http://localhost:5000", "http://127.0.0.1:5000"]
        );
    }

    #[test]
    fn endpoints_trim_trailing_slash_and_keep_order() {
        let config =
            ClientConfig::new(["http://b.local:9000/", " http://a.local:9000 "]).unwrap();
        assert_eq!(config.endpoints(), ["http://b.local:9000", "http://a.local:9000"]);
    }

    #[test]
    fn blank_entries_are_skipped() {
        let config = ClientConfig::new("http://a.local,, ,".split(',')).unwrap();
        assert_eq!(config.endpoints(), ["http://a.local"]);
    }

    #[test]
    fn empty_endpoint_list_rejected() {
        let err = ClientConfig::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, ConfigError::NoEndpoints);
    }

    #[test]
    fn non_http_endpoint_rejected() {
        let err = ClientConfig::new(["ftp://a.local"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));

        let err = ClientConfig::new(["localhost:5000/path"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn choreography_defaults() {
        let config = ChoreographyConfig::default();
        assert_eq!(config.candidate_ids, ["results", "diagnostic-result", "result"]);
        assert_eq!(config.max_attempts, 15);
        assert_eq!(config.poll_interval, Duration::from_millis(60));
        assert_eq!(config.scroll_duration, Duration::from_millis(700));
        assert_eq!(config.start_delay, Duration::from_millis(50));
    }

    #[test]
    fn app_name_is_iris() {
        assert_eq!(APP_NAME, "Iris");
    }
}

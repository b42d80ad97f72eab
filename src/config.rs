use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::error::{Error, Result};

/// Cal-Adapt raster series catalog.
pub const SERIES_URL: &str = "http://api.cal-adapt.org/api/series/";
/// GBIF occurrence search endpoint.
pub const OCCURRENCE_URL: &str = "http://api.gbif.org/v1/occurrence/search";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Series catalog URL, typically `http://api.cal-adapt.org/api/series/`.
    pub series_url: String,
    /// Occurrence search URL, typically `http://api.gbif.org/v1/occurrence/search`.
    pub occurrence_url: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Per-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            series_url: SERIES_URL.to_string(),
            occurrence_url: OCCURRENCE_URL.to_string(),
            user_agent: format!("caladapt-gbif/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_series_url(mut self, url: impl Into<String>) -> Self {
        self.series_url = url.into();
        self
    }

    pub fn with_occurrence_url(mut self, url: impl Into<String>) -> Self {
        self.occurrence_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn build_http(&self) -> Result<HttpClient> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .unwrap_or(HeaderValue::from_static("caladapt-gbif")),
        );

        let mut builder = HttpClient::builder().default_headers(default_headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_hosts() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.series_url, SERIES_URL);
        assert_eq!(cfg.occurrence_url, OCCURRENCE_URL);
        assert!(cfg.user_agent.starts_with("caladapt-gbif/"));
        assert!(cfg.timeout.is_none());
    }

    #[test]
    fn builders_override_fields() {
        let cfg = ClientConfig::default()
            .with_series_url("http://localhost:9/api/series/")
            .with_occurrence_url("http://localhost:9/v1/occurrence/search")
            .with_user_agent("tests")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(cfg.series_url, "http://localhost:9/api/series/");
        assert_eq!(cfg.occurrence_url, "http://localhost:9/v1/occurrence/search");
        assert_eq!(cfg.user_agent, "tests");
        assert_eq!(cfg.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn invalid_user_agent_still_builds() {
        let cfg = ClientConfig::default().with_user_agent("bad\nagent");
        assert!(cfg.build_http().is_ok());
    }
}

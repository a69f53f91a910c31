//! Analysis client configuration.

use std::time::Duration;

/// Default analysis service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Default request timeout. The service decodes and scores the whole track,
/// so this is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest response body read from the service. Success bodies carry the
/// rendered image, so this leaves room for a large one.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for [`AnalysisClient`](super::AnalysisClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the analysis service (without the `/analyze` path).
    pub endpoint: String,
    /// Total time allowed for one request, including upload and response.
    pub timeout: Duration,
    /// Responses with a larger body are rejected without being buffered.
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Full URL of the analyze route.
    pub fn analyze_url(&self) -> String {
        format!("{}/analyze", self.endpoint.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_url_trims_trailing_slash() {
        let config = ClientConfig::default().with_endpoint("http://mood.local:9000/");
        assert_eq!(config.analyze_url(), "http://mood.local:9000/analyze");

        let config = ClientConfig::default();
        assert_eq!(config.analyze_url(), "http://localhost:8000/analyze");
    }
}

//! Client for the remote emotion analysis service.
//!
//! Uploads one audio file per call and maps every way the exchange can go
//! wrong into an [`AnalysisError`] carrying a user-visible message.

mod config;
mod response;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{AnalysisResult, SelectedFile};

pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT};
pub use response::UNKNOWN_ERROR;

/// Message shown for failures that have no more specific explanation.
pub const GENERIC_FAILURE: &str = "Failed to analyze audio";

/// Content type sent when the file has no usable MIME hint.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Errors that can occur while analyzing a file.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The request never produced a response (unreachable, timeout, aborted body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered 2xx but the body wasn't a complete result.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        match self {
            AnalysisError::Transport(_) | AnalysisError::MalformedResponse(_) => GENERIC_FAILURE,
            AnalysisError::Service { message, .. } => message,
        }
    }
}

/// Outcome of one analysis call.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Success(AnalysisResult),
    Failure(AnalysisError),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }
}

impl From<Result<AnalysisResult, AnalysisError>> for AnalysisOutcome {
    fn from(result: Result<AnalysisResult, AnalysisError>) -> Self {
        match result {
            Ok(result) => AnalysisOutcome::Success(result),
            Err(e) => AnalysisOutcome::Failure(e),
        }
    }
}

/// Something that can analyze an audio file.
///
/// The orchestrator only depends on this trait, so the HTTP client can be
/// swapped for another transport or a test double.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one file. Never fails outright; failures are part of the outcome.
    async fn submit(&self, file: SelectedFile) -> AnalysisOutcome;
}

/// HTTP client for the analysis service.
///
/// Holds no per-call state; concurrent calls are independent.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    config: ClientConfig,
    client: Client,
}

impl AnalysisClient {
    /// Create a new analysis client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("moodtrack/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload the file and parse the service's answer. One attempt, no retries.
    pub async fn analyze(&self, file: SelectedFile) -> Result<AnalysisResult, AnalysisError> {
        let url = self.config.analyze_url();
        info!(
            "Submitting {} ({} bytes) to {}",
            file.name(),
            file.len(),
            url
        );

        let form = build_form(file)?;
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = resp.status();
        debug!("Analysis service responded with HTTP {}", status);

        let body = read_body(resp, self.config.max_response_bytes).await?;

        if !status.is_success() {
            return Err(AnalysisError::Service {
                status: status.as_u16(),
                message: response::error_message(&body),
            });
        }

        response::parse_result(&body).map_err(AnalysisError::MalformedResponse)
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn submit(&self, file: SelectedFile) -> AnalysisOutcome {
        let name = file.name().to_string();
        let result = self.analyze(file).await;
        match &result {
            Ok(r) => info!(
                "Analysis of {} complete: {} ({:.1}%)",
                name, r.primary_emotion.name, r.primary_emotion.percentage
            ),
            Err(e) => warn!("Analysis of {} failed: {}", name, e),
        }
        result.into()
    }
}

/// Read the response body, giving up once it grows past `limit` bytes.
async fn read_body(mut resp: Response, limit: usize) -> Result<Vec<u8>, AnalysisError> {
    let too_large = || {
        AnalysisError::MalformedResponse(format!("response body exceeds {} bytes", limit))
    };

    if resp.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| AnalysisError::Transport(e.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Build the multipart body: a single `file` field with the raw bytes.
fn build_form(file: SelectedFile) -> Result<Form, AnalysisError> {
    let mime = file
        .mime_type()
        .filter(|m| m.parse::<mime_guess::Mime>().is_ok())
        .unwrap_or(FALLBACK_MIME)
        .to_string();
    let name = file.name().to_string();

    let part = Part::bytes(file.into_content())
        .file_name(name)
        .mime_str(&mime)
        .map_err(|e| AnalysisError::Transport(e.to_string()))?;

    Ok(Form::new().part("file", part))
}

//! Speech-synthesis endpoint trait and its HTTP implementation.
//!
//! [`HttpSpeechEndpoint`] POSTs `{"inputs": "<text>"}` with a bearer token to
//! the configured URL and hands back the raw status and body.  Deciding what
//! counts as success, and whether to retry, is left to the
//! [`Narrator`](crate::narrate::Narrator).

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Credential, NarratorConfig};

// ---------------------------------------------------------------------------
// NarrateError
// ---------------------------------------------------------------------------

/// Errors from the narration stage.
///
/// Only [`NarrateError::EmptyInput`] ever reaches a caller of
/// [`Narrator::narrate`](crate::narrate::Narrator::narrate); transport and
/// I/O failures are logged and reported as `Ok(false)`.
#[derive(Debug, Error)]
pub enum NarrateError {
    /// The story was empty after trimming.
    #[error("story text is empty")]
    EmptyInput,

    /// HTTP transport or connection error.
    #[error("speech request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("speech request timed out")]
    Timeout,

    /// The synthesized audio could not be written.
    #[error("cannot write audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NarrateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NarrateError::Timeout
        } else {
            NarrateError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechResponse
// ---------------------------------------------------------------------------

/// Status code and raw body of one synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl SpeechResponse {
    /// Only `200 OK` counts; any other code, including other 2xx, is a
    /// failed attempt.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Body as lossy UTF-8, for logging error payloads.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// SpeechEndpoint trait
// ---------------------------------------------------------------------------

/// One remote text-to-speech call.
///
/// `Err` means no HTTP response was obtained at all.
#[async_trait]
pub trait SpeechEndpoint: Send + Sync {
    async fn submit(&self, text: &str) -> Result<SpeechResponse, NarrateError>;
}

// ---------------------------------------------------------------------------
// HttpSpeechEndpoint
// ---------------------------------------------------------------------------

/// Calls a Hugging Face style inference endpoint over HTTPS.
pub struct HttpSpeechEndpoint {
    client: reqwest::Client,
    url: String,
    credential: Credential,
}

impl HttpSpeechEndpoint {
    /// Build the endpoint from config and the startup-resolved credential.
    ///
    /// A timeout is only set when `config.timeout_secs` is present.
    pub fn from_config(config: &NarratorConfig, credential: Credential) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.endpoint_url.clone(),
            credential,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SpeechEndpoint for HttpSpeechEndpoint {
    async fn submit(&self, text: &str) -> Result<SpeechResponse, NarrateError> {
        let body = serde_json::json!({ "inputs": text });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.credential.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        log::debug!(
            "narrator: {} answered {status} ({} bytes)",
            self.url,
            body.len()
        );

        Ok(SpeechResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

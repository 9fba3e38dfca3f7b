//! The narration stage: story text in, audio file out, boolean back.
//!
//! ```text
//! Validate ──▶ AttemptFull ──200──▶ Success (file written, true)
//!                  │
//!                  └─non-200─▶ AttemptTruncated ──200──▶ Success
//!                                     │
//!                                     └─non-200─▶ Fail (false)
//! ```
//!
//! Everything past validation is "never throw": transport errors, non-200
//! responses and write failures are logged and become `Ok(false)`.

use std::path::Path;
use std::sync::Arc;

use crate::narrate::endpoint::{NarrateError, SpeechEndpoint, SpeechResponse};
use crate::narrate::policy::RetryPolicy;

/// Drives a [`SpeechEndpoint`] through a [`RetryPolicy`].
#[derive(Clone)]
pub struct Narrator {
    endpoint: Arc<dyn SpeechEndpoint>,
    policy: RetryPolicy,
}

impl Narrator {
    pub fn new(endpoint: Arc<dyn SpeechEndpoint>, policy: RetryPolicy) -> Self {
        Self { endpoint, policy }
    }

    /// Synthesize `story` and write the audio to `output`.
    ///
    /// # Errors
    ///
    /// Only [`NarrateError::EmptyInput`], raised before any network call when
    /// `story` is blank.  Every other failure is `Ok(false)`.
    pub async fn narrate(&self, story: &str, output: &Path) -> Result<bool, NarrateError> {
        let story = story.trim();
        if story.is_empty() {
            return Err(NarrateError::EmptyInput);
        }

        let mut last_failure: Option<SpeechResponse> = None;
        for attempt in self.policy.attempts() {
            let payload = attempt.payload(story);
            log::debug!(
                "narrator: {} attempt ({} chars)",
                attempt.label(),
                payload.chars().count()
            );

            let response = match self.endpoint.submit(&payload).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("narrator: error generating audio: {e}");
                    return Ok(false);
                }
            };

            if response.is_success() {
                return Ok(write_audio(output, &response.body));
            }

            log::warn!(
                "narrator: {} attempt failed with status {}",
                attempt.label(),
                response.status
            );
            last_failure = Some(response);
        }

        if let Some(response) = last_failure {
            log::error!(
                "narrator: audio generation failed with status code {}; response content: {}",
                response.status,
                response.body_text()
            );
        }
        Ok(false)
    }
}

fn write_audio(output: &Path, bytes: &[u8]) -> bool {
    match std::fs::write(output, bytes) {
        Ok(()) => {
            log::info!("narrator: audio saved successfully to {}", output.display());
            true
        }
        Err(e) => {
            log::error!("narrator: {}", NarrateError::Io(e));
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Bearer credential for the speech-synthesis endpoint.
//!
//! The token is resolved once at startup.  Lookup order:
//!
//! 1. `HUGGINGFACE_API_TOKEN` in the process environment (a `.env` file is
//!    loaded into the environment by `main` beforehand).
//! 2. `narrator.api_token` in `settings.toml`.
//!
//! An absent or blank token is a startup error, never a first-use error.

use thiserror::Error;

use super::NarratorConfig;

/// Environment variable holding the speech-synthesis token.
pub const TOKEN_ENV_VAR: &str = "HUGGINGFACE_API_TOKEN";

/// Errors raised while resolving the credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("please set the HUGGINGFACE_API_TOKEN environment variable (or narrator.api_token)")]
    Missing,
}

/// A non-empty bearer token.  `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap an explicit token, rejecting blank values.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Missing);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolve from the environment, then from config.
    pub fn resolve(config: &NarratorConfig) -> Result<Self, CredentialError> {
        Self::resolve_with(std::env::var(TOKEN_ENV_VAR).ok(), config)
    }

    fn resolve_with(
        env_token: Option<String>,
        config: &NarratorConfig,
    ) -> Result<Self, CredentialError> {
        env_token
            .and_then(|t| Self::new(t).ok())
            .or_else(|| config.api_token.clone().and_then(|t| Self::new(t).ok()))
            .ok_or(CredentialError::Missing)
    }

    /// The raw token, for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

//! Narration stage: story text → remote speech synthesis → audio file.
//!
//! * [`Narrator`]: validates the story and runs the [`RetryPolicy`].
//! * [`SpeechEndpoint`] / [`HttpSpeechEndpoint`]: one POST of
//!   `{"inputs": text}` with a bearer token.
//! * [`RetryPolicy`] / [`Attempt`]: full text, then the first 150
//!   characters, stop on first success.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use image_to_story::config::{AppConfig, Credential};
//! use image_to_story::narrate::{HttpSpeechEndpoint, Narrator, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let credential = Credential::resolve(&config.narrator).expect("token");
//!     let endpoint = HttpSpeechEndpoint::from_config(&config.narrator, credential);
//!     let narrator = Narrator::new(Arc::new(endpoint), RetryPolicy::default());
//!
//!     let ok = narrator
//!         .narrate("Once upon a time...", Path::new("model_result.flac"))
//!         .await
//!         .unwrap();
//!     println!("audio written: {ok}");
//! }
//! ```

pub mod endpoint;
pub mod narrator;
pub mod policy;

pub use endpoint::{HttpSpeechEndpoint, NarrateError, SpeechEndpoint, SpeechResponse};
pub use narrator::Narrator;
pub use policy::{Attempt, RetryPolicy, DEFAULT_TRUNCATE_CHARS};

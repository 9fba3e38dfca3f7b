//! `StoryWriter` trait and the candle-backed Qwen2 implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::qwen2;
use thiserror::Error;
use tokenizers::Tokenizer;

use crate::config::StoryWriterConfig;
use crate::hub;
use crate::story::sampling::{sample_tokens, CausalLm};

// ---------------------------------------------------------------------------
// StoryError
// ---------------------------------------------------------------------------

/// Errors that can occur while writing a story.
///
/// The pipeline never surfaces these; [`FallbackStoryWriter`] turns every one
/// of them into an empty story.
///
/// [`FallbackStoryWriter`]: crate::story::FallbackStoryWriter
#[derive(Debug, Clone, Error)]
pub enum StoryError {
    /// The prompt was empty or whitespace.
    #[error("story prompt is empty")]
    EmptyPrompt,

    /// Tokenizer encode/decode failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// The forward pass or sampler failed.
    #[error("text generation failed: {0}")]
    Generation(String),

    /// Weights, config or tokenizer could not be fetched or loaded.
    #[error("story model could not be loaded: {0}")]
    ModelLoad(String),
}

impl From<candle_core::Error> for StoryError {
    fn from(e: candle_core::Error) -> Self {
        StoryError::Generation(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// StoryWriter trait
// ---------------------------------------------------------------------------

/// Extends a prompt (the caption) into a story of at most `max_new_tokens`
/// generated tokens.
///
/// The returned text starts with the prompt itself.
pub trait StoryWriter: Send + Sync {
    fn write(&self, prompt: &str, max_new_tokens: usize) -> Result<String, StoryError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn StoryWriter>) {}
};

// ---------------------------------------------------------------------------
// Qwen2 causal LM
// ---------------------------------------------------------------------------

struct Qwen2Lm {
    model: qwen2::ModelForCausalLM,
    device: Device,
}

impl CausalLm for Qwen2Lm {
    fn next_token_logits(
        &mut self,
        input_ids: &Tensor,
        seqlen_offset: usize,
    ) -> candle_core::Result<Tensor> {
        self.model
            .forward(input_ids, seqlen_offset)?
            .squeeze(0)?
            .squeeze(0)?
            .to_dtype(DType::F32)
    }

    fn clear_kv_cache(&mut self) {
        self.model.clear_kv_cache();
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

// ---------------------------------------------------------------------------
// CandleStoryWriter
// ---------------------------------------------------------------------------

/// Production story writer backed by a Qwen2 base model.
pub struct CandleStoryWriter {
    lm: Mutex<Qwen2Lm>,
    tokenizer: Tokenizer,
    eos_token: Option<u32>,
    seed: Option<u64>,
}

impl std::fmt::Debug for CandleStoryWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleStoryWriter")
            .field("eos_token", &self.eos_token)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl CandleStoryWriter {
    /// Download (or reuse cached) weights and build the model.
    pub fn load(
        config: &StoryWriterConfig,
        cache_dir: &Path,
        device: &Device,
        dtype: DType,
    ) -> Result<Self, StoryError> {
        let files = hub::fetch_files(
            cache_dir,
            &config.model_id,
            &config.revision,
            &["config.json", "tokenizer.json", "model.safetensors"],
        )
        .map_err(|e| StoryError::ModelLoad(e.to_string()))?;

        let model_config: qwen2::Config = std::fs::read(&files[0])
            .map_err(|e| StoryError::ModelLoad(e.to_string()))
            .and_then(|raw| {
                serde_json::from_slice(&raw).map_err(|e| StoryError::ModelLoad(e.to_string()))
            })?;
        let tokenizer =
            Tokenizer::from_file(&files[1]).map_err(|e| StoryError::ModelLoad(e.to_string()))?;
        let eos_token = tokenizer.token_to_id("<|endoftext|>");

        // SAFETY: the safetensors file is owned by the hub cache and not
        // modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files[2..], dtype, device) }
            .map_err(|e| StoryError::ModelLoad(e.to_string()))?;
        let model = qwen2::ModelForCausalLM::new(&model_config, vb)
            .map_err(|e| StoryError::ModelLoad(e.to_string()))?;

        log::info!(
            "story writer: loaded {}@{} (eos={eos_token:?})",
            config.model_id,
            config.revision
        );

        Ok(Self {
            lm: Mutex::new(Qwen2Lm {
                model,
                device: device.clone(),
            }),
            tokenizer,
            eos_token,
            seed: config.seed,
        })
    }
}

impl StoryWriter for CandleStoryWriter {
    fn write(&self, prompt: &str, max_new_tokens: usize) -> Result<String, StoryError> {
        if prompt.trim().is_empty() {
            return Err(StoryError::EmptyPrompt);
        }

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| StoryError::Tokenizer(e.to_string()))?;
        let seed = self.seed.unwrap_or_else(fresh_seed);

        let generated = {
            let mut lm = self
                .lm
                .lock()
                .map_err(|e| StoryError::Generation(format!("model lock poisoned: {e}")))?;
            sample_tokens(
                &mut *lm,
                encoding.get_ids(),
                max_new_tokens,
                seed,
                self.eos_token,
            )?
        };

        let continuation = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| StoryError::Tokenizer(e.to_string()))?;

        log::debug!(
            "story writer: {} new tokens (seed={seed})",
            generated.len()
        );
        Ok(format!("{prompt}{continuation}"))
    }
}

fn fresh_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(299_792_458)
}

// ---------------------------------------------------------------------------
// MockStoryWriter (test-only)
// ---------------------------------------------------------------------------

/// Test double: appends a fixed continuation, or fails, and counts calls.
#[cfg(test)]
pub struct MockStoryWriter {
    response: Result<String, StoryError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockStoryWriter {
    /// Returns `prompt + continuation`.
    pub fn continuing(continuation: impl Into<String>) -> Self {
        Self {
            response: Ok(continuation.into()),
            calls: Default::default(),
        }
    }

    /// Always returns `Err(error)`.
    pub fn err(error: StoryError) -> Self {
        Self {
            response: Err(error),
            calls: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl StoryWriter for MockStoryWriter {
    fn write(&self, prompt: &str, _max_new_tokens: usize) -> Result<String, StoryError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if prompt.trim().is_empty() {
            return Err(StoryError::EmptyPrompt);
        }
        self.response
            .clone()
            .map(|continuation| format!("{prompt}{continuation}"))
    }
}

//! Core captioning trait and implementations.
//!
//! [`Captioner`] is the interface used by the pipeline.  It is object-safe and
//! `Send + Sync` so it can be held behind an `Arc<dyn Captioner>`.
//!
//! [`BlipCaptioner`] is the production implementation wrapping a candle BLIP
//! model.  [`MockCaptioner`] (test-only) returns a pre-configured response
//! and counts its calls.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::blip;
use thiserror::Error;
use tokenizers::Tokenizer;

use crate::caption::preprocess::load_image;
use crate::config::CaptionerConfig;
use crate::hub;

// ---------------------------------------------------------------------------
// CaptionError
// ---------------------------------------------------------------------------

/// Errors from the captioning stage.  None of them is retried.
#[derive(Debug, Clone, Error)]
pub enum CaptionError {
    /// The input image path does not exist.
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The image could not be decoded, or the model failed or produced
    /// nothing.
    #[error("caption generation failed: {0}")]
    GenerationFailed(String),

    /// Weights or tokenizer could not be fetched or loaded.
    #[error("captioning model could not be loaded: {0}")]
    ModelLoad(String),
}

// ---------------------------------------------------------------------------
// Captioner trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for image captioning.
///
/// # Contract
///
/// Implementations receive a path that has already been checked to exist and
/// return one descriptive caption.  Callers treat an empty caption as
/// [`CaptionError::GenerationFailed`].
pub trait Captioner: Send + Sync {
    /// Describe the image at `image_path`.
    fn caption(&self, image_path: &Path) -> Result<String, CaptionError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Captioner>) {}
};

// ---------------------------------------------------------------------------
// BlipCaptioner
// ---------------------------------------------------------------------------

/// BERT `[DEC]` token that starts every BLIP caption.
const DECODER_START_TOKEN_ID: u32 = 30522;
/// BERT `[SEP]` token that ends it.
const SEP_TOKEN_ID: u32 = 102;

/// Production captioner backed by BLIP (`blip-image-captioning-large`).
///
/// The text decoder keeps a KV cache, so the model sits behind a `Mutex` and
/// the cache is reset before every caption.
pub struct BlipCaptioner {
    model: Mutex<blip::BlipForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    max_tokens: usize,
}

impl std::fmt::Debug for BlipCaptioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipCaptioner")
            .field("device", &self.device)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl BlipCaptioner {
    /// Download (or reuse cached) weights and build the model.
    ///
    /// BLIP is loaded in `F32` regardless of the device's preferred dtype.
    /// The tokenizer always comes from the repository's `main` branch.
    pub fn load(
        config: &CaptionerConfig,
        cache_dir: &Path,
        device: &Device,
    ) -> Result<Self, CaptionError> {
        let weights = hub::fetch_files(
            cache_dir,
            &config.model_id,
            &config.revision,
            &["model.safetensors"],
        )
        .map_err(|e| CaptionError::ModelLoad(e.to_string()))?;
        let tokenizer_file =
            hub::fetch_files(cache_dir, &config.model_id, "main", &["tokenizer.json"])
                .map_err(|e| CaptionError::ModelLoad(e.to_string()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_file[0])
            .map_err(|e| CaptionError::ModelLoad(e.to_string()))?;

        let blip_config = blip::Config::image_captioning_large();
        // SAFETY: the safetensors file is owned by the hub cache and not
        // modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weights, DType::F32, device) }
            .map_err(|e| CaptionError::ModelLoad(e.to_string()))?;
        let model = blip::BlipForConditionalGeneration::new(&blip_config, vb)
            .map_err(|e| CaptionError::ModelLoad(e.to_string()))?;

        log::info!("captioner: loaded {}@{}", config.model_id, config.revision);

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device: device.clone(),
            max_tokens: config.max_caption_tokens,
        })
    }

    fn generate(&self, image_path: &Path) -> candle_core::Result<String> {
        let image = load_image(image_path, &self.device)?;

        let mut model = self
            .model
            .lock()
            .map_err(|e| candle_core::Error::Msg(format!("captioner lock poisoned: {e}")))?;
        model.reset_kv_cache();

        let image_embeds = image.unsqueeze(0)?.apply(model.vision_model())?;

        let mut logits_processor = LogitsProcessor::from_sampling(0, Sampling::ArgMax);
        let mut token_ids = vec![DECODER_START_TOKEN_ID];
        for index in 0..self.max_tokens {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = model.text_decoder().forward(&input_ids, &image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let token = logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }

        self.tokenizer
            .decode(&token_ids[1..], true)
            .map_err(|e| candle_core::Error::Msg(e.to_string()))
    }
}

impl Captioner for BlipCaptioner {
    fn caption(&self, image_path: &Path) -> Result<String, CaptionError> {
        let caption = self
            .generate(image_path)
            .map_err(|e| CaptionError::GenerationFailed(e.to_string()))?;
        Ok(caption.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// MockCaptioner (test-only)
// ---------------------------------------------------------------------------

/// Test double returning a fixed response and counting calls.
#[cfg(test)]
pub struct MockCaptioner {
    response: Result<String, CaptionError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCaptioner {
    /// Always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            calls: Default::default(),
        }
    }

    /// Always returns `Err(error)`.
    pub fn err(error: CaptionError) -> Self {
        Self {
            response: Err(error),
            calls: Default::default(),
        }
    }

    /// Number of `caption` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Captioner for MockCaptioner {
    fn caption(&self, _image_path: &Path) -> Result<String, CaptionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ok_returns_configured_text() {
        let captioner = MockCaptioner::ok("a forest with tall trees");
        let caption = captioner.caption(Path::new("forest.jpg")).unwrap();
        assert_eq!(caption, "a forest with tall trees");
        assert_eq!(captioner.calls(), 1);
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let captioner = MockCaptioner::err(CaptionError::GenerationFailed("corrupt".into()));
        let err = captioner.caption(Path::new("forest.jpg")).unwrap_err();
        assert!(matches!(err, CaptionError::GenerationFailed(_)));
    }

    #[test]
    fn box_dyn_captioner_compiles() {
        let captioner: Box<dyn Captioner> = Box::new(MockCaptioner::ok("ok"));
        let _ = captioner.caption(Path::new("x.png"));
    }

    #[test]
    fn not_found_display_contains_path() {
        let e = CaptionError::NotFound(PathBuf::from("/tmp/missing.jpg"));
        assert!(e.to_string().contains("/tmp/missing.jpg"));
    }

    #[test]
    fn generation_failed_display_contains_cause() {
        let e = CaptionError::GenerationFailed("bad header".into());
        assert_eq!(e.to_string(), "caption generation failed: bad header");
    }
}

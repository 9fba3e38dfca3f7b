//! Token-level sampling loop shared by every causal language model.
//!
//! The loop is generic over [`CausalLm`] so it runs the same way against a
//! real transformer and against a fixed-logits stub in tests.

use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::utils::apply_repeat_penalty;

/// Softmax temperature used for every story.
pub const TEMPERATURE: f64 = 0.7;
/// Nucleus-sampling threshold.
pub const TOP_P: f64 = 0.9;
/// Penalty applied to tokens already present in the recent context.
pub const REPEAT_PENALTY: f32 = 1.2;
/// How many trailing tokens the repetition penalty looks at.
pub const REPEAT_LAST_N: usize = 64;

/// A decoder-only model with a KV cache.
pub trait CausalLm: Send {
    /// Run `input_ids` (`[1, seq]`) starting at `seqlen_offset` and return
    /// the logits of the last position as a 1-D `F32` tensor.
    fn next_token_logits(
        &mut self,
        input_ids: &Tensor,
        seqlen_offset: usize,
    ) -> candle_core::Result<Tensor>;

    /// Forget all cached keys/values.
    fn clear_kv_cache(&mut self);

    fn device(&self) -> &Device;
}

/// Sample up to `max_new_tokens` continuation tokens after `prompt`.
///
/// Stops early at `eos` (which is not included in the result).  The KV cache
/// is cleared first, so consecutive calls are independent; the same `seed`
/// and prompt always give the same tokens.
pub fn sample_tokens(
    model: &mut dyn CausalLm,
    prompt: &[u32],
    max_new_tokens: usize,
    seed: u64,
    eos: Option<u32>,
) -> candle_core::Result<Vec<u32>> {
    if prompt.is_empty() {
        candle_core::bail!("cannot sample from an empty prompt");
    }

    model.clear_kv_cache();
    let mut logits_processor = LogitsProcessor::from_sampling(
        seed,
        Sampling::TopP {
            p: TOP_P,
            temperature: TEMPERATURE,
        },
    );

    let mut tokens = prompt.to_vec();
    let mut generated = Vec::with_capacity(max_new_tokens);
    for index in 0..max_new_tokens {
        let context_size = if index > 0 { 1 } else { tokens.len() };
        let start_pos = tokens.len().saturating_sub(context_size);
        let input = Tensor::new(&tokens[start_pos..], model.device())?.unsqueeze(0)?;
        let logits = model.next_token_logits(&input, start_pos)?;

        let start_at = tokens.len().saturating_sub(REPEAT_LAST_N);
        let logits = apply_repeat_penalty(&logits, REPEAT_PENALTY, &tokens[start_at..])?;

        let next_token = logits_processor.sample(&logits)?;
        if Some(next_token) == eos {
            break;
        }
        tokens.push(next_token);
        generated.push(next_token);
    }

    Ok(generated)
}

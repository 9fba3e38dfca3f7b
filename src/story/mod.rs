//! Story-writing stage: extends a caption into a short story.
//!
//! * [`StoryWriter`]: trait implemented by every text-generation backend.
//! * [`CandleStoryWriter`]: Qwen2 base model run with candle.
//! * [`FallbackStoryWriter`]: never fails; degrades to an empty story.
//! * [`sampling`]: the shared token sampling loop and its fixed policy
//!   (temperature 0.7, top-p 0.9, repetition penalty 1.2).

pub mod fallback;
pub mod sampling;
pub mod writer;

/// Default length budget, in generated tokens.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 500;

pub use fallback::FallbackStoryWriter;
pub use sampling::{sample_tokens, CausalLm, REPEAT_PENALTY, TEMPERATURE, TOP_P};
pub use writer::{CandleStoryWriter, StoryError, StoryWriter};

#[cfg(test)]
pub use writer::MockStoryWriter;

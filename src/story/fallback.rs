//! Fallback story writer: wraps any [`StoryWriter`] and degrades to an empty
//! story on error.
//!
//! When story generation fails for any reason (empty prompt, tokenizer,
//! forward pass, a panicking backend) [`FallbackStoryWriter::write`] logs a
//! warning and returns `""`.  Callers branch on the empty story instead of
//! intercepting an error; this is the opposite of the captioning stage,
//! which always raises.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::story::writer::StoryWriter;

/// A wrapper around any [`StoryWriter`] whose `write` cannot fail.
#[derive(Clone)]
pub struct FallbackStoryWriter {
    inner: Arc<dyn StoryWriter>,
}

impl FallbackStoryWriter {
    /// Wrap `inner` with fallback behaviour.
    pub fn new(inner: Arc<dyn StoryWriter>) -> Self {
        Self { inner }
    }

    /// Write a story for `caption`; returns `""` if anything goes wrong.
    pub fn write(&self, caption: &str, max_new_tokens: usize) -> String {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.inner.write(caption, max_new_tokens)
        }));
        match outcome {
            Ok(Ok(story)) => story,
            Ok(Err(e)) => {
                log::warn!("story writer failed ({e}); returning empty story");
                String::new()
            }
            Err(_) => {
                log::warn!("story writer panicked; returning empty story");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::writer::{MockStoryWriter, StoryError};

    struct Panics;

    impl StoryWriter for Panics {
        fn write(&self, _prompt: &str, _max: usize) -> Result<String, StoryError> {
            panic!("backend exploded");
        }
    }

    #[test]
    fn passes_through_success() {
        let writer = FallbackStoryWriter::new(Arc::new(MockStoryWriter::continuing(
            " where an old owl kept watch.",
        )));
        assert_eq!(
            writer.write("a forest with tall trees", 500),
            "a forest with tall trees where an old owl kept watch."
        );
    }

    #[test]
    fn returns_empty_on_generation_error() {
        let writer = FallbackStoryWriter::new(Arc::new(MockStoryWriter::err(
            StoryError::Generation("oom".into()),
        )));
        assert_eq!(writer.write("a forest", 500), "");
    }

    #[test]
    fn returns_empty_on_tokenizer_error() {
        let writer = FallbackStoryWriter::new(Arc::new(MockStoryWriter::err(
            StoryError::Tokenizer("bad merges".into()),
        )));
        assert_eq!(writer.write("a forest", 500), "");
    }

    #[test]
    fn empty_caption_yields_empty_story() {
        let writer = FallbackStoryWriter::new(Arc::new(MockStoryWriter::continuing("x")));
        assert_eq!(writer.write("", 500), "");
    }

    #[test]
    fn panicking_backend_yields_empty_story() {
        let writer = FallbackStoryWriter::new(Arc::new(Panics));
        assert_eq!(writer.write("a forest", 500), "");
    }
}

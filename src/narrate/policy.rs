//! Attempt policy for speech synthesis: which texts to submit, in order.
//!
//! The default policy submits the full story once and, if the endpoint
//! refuses it, its first 150 characters once more.  The narrator stops at the
//! first successful attempt.

use std::borrow::Cow;

/// Character budget of the truncated retry.
pub const DEFAULT_TRUNCATE_CHARS: usize = 150;

/// What text a single attempt submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The whole story.
    Full,
    /// The first `max_chars` characters (Unicode scalar values) of the story.
    Truncated { max_chars: usize },
}

impl Attempt {
    /// The payload text for `story`.
    pub fn payload<'a>(&self, story: &'a str) -> Cow<'a, str> {
        match *self {
            Attempt::Full => Cow::Borrowed(story),
            Attempt::Truncated { max_chars } => match story.char_indices().nth(max_chars) {
                Some((byte_idx, _)) => Cow::Borrowed(&story[..byte_idx]),
                None => Cow::Borrowed(story),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attempt::Full => "full",
            Attempt::Truncated { .. } => "truncated",
        }
    }
}

/// Ordered list of attempts, stop on first success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: Vec<Attempt>,
}

impl RetryPolicy {
    /// Full text, then one truncated retry of `max_chars` characters.
    pub fn full_then_truncated(max_chars: usize) -> Self {
        Self {
            attempts: vec![Attempt::Full, Attempt::Truncated { max_chars }],
        }
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::full_then_truncated(DEFAULT_TRUNCATE_CHARS)
    }
}

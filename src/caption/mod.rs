//! Image captioning stage.
//!
//! ```text
//! image path ──▶ load_image (384×384, CLIP-normalised)
//!            ──▶ BLIP vision tower ──▶ text decoder (greedy) ──▶ caption
//! ```
//!
//! The pipeline checks that the path exists before any [`Captioner`] is
//! called; see [`crate::pipeline::InferenceContext::image_to_text`].

pub mod engine;
pub mod preprocess;

pub use engine::{BlipCaptioner, CaptionError, Captioner};
pub use preprocess::{load_image, IMAGE_SIZE};

#[cfg(test)]
pub use engine::MockCaptioner;

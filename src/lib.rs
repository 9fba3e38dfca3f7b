//! Image-to-story: caption an image, extend the caption into a story and
//! narrate the story through a remote speech-synthesis endpoint.

pub mod app;
pub mod caption;
pub mod config;
pub mod hub;
pub mod narrate;
pub mod pipeline;
pub mod story;
pub mod upload;

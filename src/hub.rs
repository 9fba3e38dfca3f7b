//! Model-file download and device selection shared by the local models.
//!
//! Weights come from the Hugging Face hub through the synchronous `hf-hub`
//! client, cached under [`AppPaths::models_dir`](crate::config::AppPaths).

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};

/// Pick the inference device and matching dtype.
///
/// With the `cuda` feature the first GPU is used when present; everything
/// else runs on the CPU in `F32`.
pub fn select_device() -> (Device, DType) {
    #[cfg(feature = "cuda")]
    {
        match Device::cuda_if_available(0) {
            Ok(device) if device.is_cuda() => return (device, DType::BF16),
            Ok(_) => log::warn!("CUDA not available, defaulting to CPU"),
            Err(e) => log::warn!("CUDA not available, defaulting to CPU: {e}"),
        }
    }

    (Device::Cpu, DType::F32)
}

/// Fetch `files` from `model_id@revision`, returning local paths in the same
/// order.
pub fn fetch_files(
    cache_dir: &Path,
    model_id: &str,
    revision: &str,
    files: &[&str],
) -> Result<Vec<PathBuf>, hf_hub::api::sync::ApiError> {
    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir.to_path_buf())
        .with_progress(false)
        .build()?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    files
        .iter()
        .map(|name| {
            log::debug!("hub: fetching {model_id}@{revision}/{name}");
            repo.get(name)
        })
        .collect()
}

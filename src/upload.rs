//! Upload/download collaborator around the pipeline.
//!
//! The pipeline only ever sees filesystem paths.  This module owns the files
//! behind those paths:
//!
//! * [`StagedImage`] copies an uploaded image (a path or dropped bytes) into a
//!   named temp file that is removed on drop.
//! * [`AudioScratch`] is a temp directory the narrator writes into; the audio
//!   is read back into memory and the directory removed on drop.
//! * [`export_audio`] writes in-memory audio to the user's download folder.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;

/// Errors raised while staging uploads or handling the produced audio.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The image the user picked does not exist.
    #[error("image not found: {0}")]
    Missing(PathBuf),

    /// Copying the upload into a temp file failed.
    #[error("cannot stage upload: {0}")]
    Stage(std::io::Error),

    /// The narrator reported success but no audio file can be read.
    #[error("cannot read generated audio: {0}")]
    ReadAudio(std::io::Error),

    /// The narrator wrote a zero-byte file.
    #[error("Audio file is empty")]
    EmptyAudio,

    /// Writing the downloaded copy failed.
    #[error("cannot export audio: {0}")]
    Export(std::io::Error),
}

// ---------------------------------------------------------------------------
// StagedImage
// ---------------------------------------------------------------------------

/// An uploaded image held in a temp file for the duration of one run.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    /// Stage a copy of the file at `source`.
    pub fn from_path(source: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => UploadError::Missing(source.to_path_buf()),
            _ => UploadError::Stage(e),
        })?;
        let suffix = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| ".jpg".to_string());
        Self::from_bytes(&bytes, &suffix)
    }

    /// Stage raw bytes (drag-and-drop without a backing path).
    ///
    /// `suffix` only names the temp file; the captioner sniffs the real
    /// format from the content.
    pub fn from_bytes(bytes: &[u8], suffix: &str) -> Result<Self, UploadError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(suffix)
            .tempfile()
            .map_err(UploadError::Stage)?;
        file.write_all(bytes).map_err(UploadError::Stage)?;
        file.flush().map_err(UploadError::Stage)?;
        log::debug!(
            "upload: staged {} bytes at {}",
            bytes.len(),
            file.path().display()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// ---------------------------------------------------------------------------
// AudioScratch
// ---------------------------------------------------------------------------

/// Temp directory holding the narrator's output file for one run.
#[derive(Debug)]
pub struct AudioScratch {
    dir: TempDir,
    file_name: String,
}

impl AudioScratch {
    /// `file_name` is the name the narrator writes, e.g. `model_result.flac`.
    pub fn new(file_name: &str) -> Result<Self, UploadError> {
        let dir = tempfile::Builder::new()
            .prefix("narration-")
            .tempdir()
            .map_err(UploadError::Stage)?;
        Ok(Self {
            dir,
            file_name: file_name.to_string(),
        })
    }

    /// Where the narrator should write its audio.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join(&self.file_name)
    }

    /// Read the narrator's output back into memory.
    ///
    /// A zero-byte file is reported as [`UploadError::EmptyAudio`].
    pub fn read_audio(&self) -> Result<Vec<u8>, UploadError> {
        let bytes = std::fs::read(self.path()).map_err(UploadError::ReadAudio)?;
        if bytes.is_empty() {
            return Err(UploadError::EmptyAudio);
        }
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write `audio` to `dir/file_name`, creating `dir` if needed.
///
/// An existing file of the same name is overwritten.
pub fn export_audio(audio: &[u8], dir: &Path, file_name: &str) -> Result<PathBuf, UploadError> {
    if audio.is_empty() {
        return Err(UploadError::EmptyAudio);
    }
    std::fs::create_dir_all(dir).map_err(UploadError::Export)?;
    let target = dir.join(file_name);
    std::fs::write(&target, audio).map_err(UploadError::Export)?;
    log::info!("upload: audio exported to {}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn staged_copy_matches_source_and_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("forest.png");
        std::fs::write(&source, b"not really a png").unwrap();

        let staged = StagedImage::from_path(&source).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert_ne!(staged_path, source);
        assert_eq!(std::fs::read(&staged_path).unwrap(), b"not really a png");
        assert_eq!(staged_path.extension().unwrap(), "png");

        drop(staged);
        assert!(!staged_path.exists());
        assert!(source.exists());
    }

    #[test]
    fn missing_source_is_reported_as_missing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("nope.jpg");
        match StagedImage::from_path(&source) {
            Err(UploadError::Missing(p)) => assert_eq!(p, source),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn source_without_extension_gets_jpg_suffix() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("upload");
        std::fs::write(&source, [0u8; 4]).unwrap();
        let staged = StagedImage::from_path(&source).unwrap();
        assert_eq!(staged.path().extension().unwrap(), "jpg");
    }

    #[test]
    fn scratch_reads_written_audio_and_cleans_up() {
        let scratch = AudioScratch::new("model_result.flac").unwrap();
        let out = scratch.path();
        assert_eq!(out.file_name().unwrap(), "model_result.flac");

        std::fs::write(&out, b"fLaC\0\0").unwrap();
        assert_eq!(scratch.read_audio().unwrap(), b"fLaC\0\0");

        drop(scratch);
        assert!(!out.exists());
    }

    #[test]
    fn scratch_without_audio_is_read_error() {
        let scratch = AudioScratch::new("model_result.flac").unwrap();
        assert!(matches!(
            scratch.read_audio(),
            Err(UploadError::ReadAudio(_))
        ));
    }

    #[test]
    fn zero_byte_audio_is_empty_audio() {
        let scratch = AudioScratch::new("model_result.flac").unwrap();
        std::fs::write(scratch.path(), b"").unwrap();
        let err = scratch.read_audio().unwrap_err();
        assert!(matches!(err, UploadError::EmptyAudio));
        assert_eq!(err.to_string(), "Audio file is empty");
    }

    #[test]
    fn export_creates_directory_and_overwrites() {
        let dir = tempdir().unwrap();
        let downloads = dir.path().join("Downloads");

        let first = export_audio(b"one", &downloads, "story_narration.flac").unwrap();
        let second = export_audio(b"two", &downloads, "story_narration.flac").unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn export_refuses_empty_audio() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            export_audio(b"", dir.path(), "x.flac"),
            Err(UploadError::EmptyAudio)
        ));
    }
}

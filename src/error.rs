//! Error taxonomy shared by every synthesis stage.
//!
//! Backend- and codec-specific failures are flattened into these variants at
//! their stage boundary, so nothing from `ort`, `hound` or the ffmpeg
//! subprocess leaks past the pipeline.

use std::path::PathBuf;

/// Every way a synthesis request (or store/backend start-up) can fail.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// Input text is empty or whitespace-only.
    #[error("Input text cannot be empty")]
    EmptyInput,

    /// `response_format` is not one of the encodable containers.
    #[error("Unsupported response format '{0}'. Supported: wav, mp3, ogg, flac, aac, pcm")]
    UnsupportedFormat(String),

    /// Speed multiplier is zero, negative or not finite.
    #[error("Speed must be a positive number, got {0}")]
    InvalidSpeed(f32),

    /// Neither the requested voice nor the default voice is loaded.
    #[error("Unknown voice '{requested}' and default voice '{default}' is not loaded")]
    UnknownVoice { requested: String, default: String },

    /// A voicepack tensor cannot be reduced to a single 256-wide style vector.
    #[error("Invalid voicepack shape {shape:?}: trailing dimension must be {expected}")]
    InvalidVoicepackShape { shape: Vec<usize>, expected: usize },

    /// A voicepack file exists but could not be read or parsed.
    #[error("Failed to load voicepack {}: {reason}", path.display())]
    VoicepackLoad { path: PathBuf, reason: String },

    /// Model artifact is missing on disk.
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Model artifact exists but could not be turned into a usable backend.
    #[error("Failed to load model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// Backend inference failed (runtime error, shape mismatch, empty output).
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Inference did not finish within the configured bound.
    #[error("Inference timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Backend produced audio that is not a 1-D waveform.
    #[error("Unexpected audio shape {0:?}: expected a 1-D waveform")]
    UnexpectedAudioShape(Vec<usize>),

    /// Container encoding failed; carries the codec diagnostic.
    #[error("Failed to encode {format}: {message}")]
    Encoding { format: String, message: String },

    /// Voicepack directory or catalog does not exist.
    #[error("Voicepack directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Voicepack directory contains no loadable voicepack.
    #[error("No voicepacks found in {}", .0.display())]
    NoVoicepacks(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type TtsResult<T> = Result<T, TtsError>;

impl TtsError {
    /// Build an [`TtsError::Inference`] from anything printable.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// `true` for failures caused by the request itself (HTTP 400 family).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::UnsupportedFormat(_) | Self::InvalidSpeed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TtsError::UnsupportedFormat("webm".into());
        assert!(err.to_string().contains("'webm'"));

        let err = TtsError::Timeout { secs: 30 };
        assert_eq!(err.to_string(), "Inference timed out after 30s");

        let err = TtsError::InvalidVoicepackShape { shape: vec![2, 128], expected: 256 };
        assert_eq!(
            err.to_string(),
            "Invalid voicepack shape [2, 128]: trailing dimension must be 256"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(TtsError::EmptyInput.is_client_error());
        assert!(TtsError::InvalidSpeed(0.0).is_client_error());
        assert!(TtsError::UnsupportedFormat("webm".into()).is_client_error());
        assert!(!TtsError::inference("boom").is_client_error());
        assert!(!TtsError::Timeout { secs: 1 }.is_client_error());
    }
}

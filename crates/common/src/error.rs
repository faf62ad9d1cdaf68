//! Central error types for the playback core (thiserror-based).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::LoadToken;
use crate::types::MediaTime;

/// Playback error taxonomy.
///
/// `ProbeFailed` and `BackendUnavailable` are fallback-eligible and handled
/// inside the engine. See [`PlaybackError::is_terminal`] for the ones that
/// end a load.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackError {
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Secondary backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Accurate seek to {target} timed out after {timeout_ms} ms")]
    SeekTimeout { target: MediaTime, timeout_ms: u64 },

    #[error("Engine not ready")]
    NotReady,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PlaybackError {
    /// Errors the engine recovers from by switching path instead of surfacing.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::ProbeFailed(_) | Self::BackendUnavailable(_))
    }

    /// Errors that end the current load.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::InstallFailed(_) | Self::DecodeFailure(_)
        )
    }
}

/// A terminal error tagged with the load it originated under.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error} (load {token})")]
pub struct TaggedError {
    pub token: LoadToken,
    pub error: PlaybackError,
}

impl TaggedError {
    pub fn new(token: LoadToken, error: PlaybackError) -> Self {
        Self { token, error }
    }
}

/// Container scanning errors.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Unsupported container format")]
    UnsupportedContainer,

    #[error("Invalid box/element at offset {offset}: {reason}")]
    InvalidStructure { offset: u64, reason: String },

    #[error("Truncated data: expected {expected} bytes, got {got}")]
    TruncatedData { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for playback commands.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_reason_is_verbatim() {
        let err = PlaybackError::InstallFailed("download of ffmpeg returned HTTP 404".into());
        assert_eq!(
            err.to_string(),
            "Install failed: download of ffmpeg returned HTTP 404"
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn fallback_classification() {
        assert!(PlaybackError::ProbeFailed("bad header".into()).is_fallback_eligible());
        assert!(PlaybackError::BackendUnavailable("libmpv".into()).is_fallback_eligible());
        assert!(!PlaybackError::NotReady.is_terminal());
    }

    #[test]
    fn tagged_error_display() {
        let tagged = TaggedError::new(LoadToken(3), PlaybackError::DecodeFailure("eof".into()));
        assert_eq!(tagged.to_string(), "Decode failure: eof (load #3)");
    }
}

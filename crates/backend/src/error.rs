//! libmpv client errors.

use thiserror::Error;

/// Errors from loading or driving the libmpv client API.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("libmpv not found: {0}")]
    LibraryNotFound(String),

    #[error("Required symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("libmpv client API {found:#x} is older than required {required:#x}")]
    ApiVersion { required: u64, found: u64 },

    #[error("mpv_create returned null")]
    CreateFailed,

    #[error("{call} failed: {message} ({code})")]
    Api {
        call: &'static str,
        code: i32,
        message: String,
    },

    #[error("String argument contains a NUL byte: {0:?}")]
    InvalidString(String),

    #[error("Render context unavailable: {0}")]
    Render(String),
}

impl CoreError {
    pub fn is_missing_library(&self) -> bool {
        matches!(self, Self::LibraryNotFound(_) | Self::SymbolNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = CoreError::Api {
            call: "mpv_command",
            code: -12,
            message: "invalid parameter".into(),
        };
        assert_eq!(err.to_string(), "mpv_command failed: invalid parameter (-12)");
        assert!(!err.is_missing_library());
        assert!(CoreError::LibraryNotFound("x".into()).is_missing_library());
    }
}

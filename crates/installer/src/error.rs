//! Installer step failures.
//!
//! The `Display` text is what the collaborator sees: the engine surfaces it
//! verbatim as `PlaybackError::InstallFailed(reason)`.

use std::path::PathBuf;
use thiserror::Error;
use vl_common::Architecture;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("registry lookup for {package} failed: {reason}")]
    Registry { package: String, reason: String },

    #[error("no compatible {architecture} bundle for {package}")]
    NoCompatibleBundle {
        package: String,
        architecture: Architecture,
    },

    #[error("token request for {package} failed: {reason}")]
    Token { package: String, reason: String },

    #[error("download of {package} returned HTTP {status}")]
    Http { package: String, status: u16 },

    #[error("download of {package} was empty")]
    EmptyBody { package: String },

    #[error("checksum mismatch for {package}: expected {expected}, got {actual}")]
    Checksum {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("extracting {package} failed: {reason}")]
    Extract { package: String, reason: String },

    #[error("relinking {} failed: {reason}", path.display())]
    Relink { path: PathBuf, reason: String },

    #[error("{} is not loadable: {reason}", path.display())]
    Verify { path: PathBuf, reason: String },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

//! Load verification.
//!
//! File presence proves nothing about a relinked library: a missing
//! dependency only shows up when the dynamic loader resolves it. An install
//! counts only if the library loads and exports the client API entry point.

use std::path::Path;

use libloading::Library;
use tracing::{debug, warn};

use crate::error::InstallError;

/// Symbol that must resolve in a usable library.
pub const REQUIRED_SYMBOL: &str = "mpv_client_api_version";

pub trait LibraryVerifier: Send + Sync {
    fn verify(&self, path: &Path) -> Result<(), InstallError>;
}

/// Loads the library by absolute path with `libloading`.
///
/// Dependencies resolve through the install names and run paths written by
/// the relinker; the process environment is never touched.
#[derive(Debug, Default)]
pub struct DylibVerifier;

impl LibraryVerifier for DylibVerifier {
    fn verify(&self, path: &Path) -> Result<(), InstallError> {
        if !path.is_file() {
            return Err(InstallError::Verify {
                path: path.to_path_buf(),
                reason: "file missing".into(),
            });
        }

        // SAFETY: the library came out of a checksummed bundle; its
        // initializers only set up libmpv internals.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            warn!(path = %path.display(), error = %e, "Library failed to load");
            InstallError::Verify {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        // SAFETY: signature matches `unsigned long mpv_client_api_version(void)`.
        let version = unsafe {
            let symbol = lib
                .get::<unsafe extern "C" fn() -> std::os::raw::c_ulong>(b"mpv_client_api_version\0")
                .map_err(|e| InstallError::Verify {
                    path: path.to_path_buf(),
                    reason: format!("{REQUIRED_SYMBOL}: {e}"),
                })?;
            symbol()
        };
        debug!(path = %path.display(), api_version = version, "Library verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_fails() {
        let path = std::env::temp_dir().join("vl_verify_missing.dylib");
        let err = DylibVerifier.verify(&path).unwrap_err();
        assert!(matches!(err, InstallError::Verify { .. }));
    }

    #[test]
    fn non_library_fails_to_load() {
        let path = std::env::temp_dir().join(format!("vl_verify_garbage_{}.so", std::process::id()));
        std::fs::write(&path, b"not a shared object").unwrap();
        let err = DylibVerifier.verify(&path).unwrap_err();
        assert!(err.to_string().contains("is not loadable"));
        let _ = std::fs::remove_file(&path);
    }
}

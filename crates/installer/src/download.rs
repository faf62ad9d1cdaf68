//! Streaming bundle download with checksum and cancellation.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::InstallError;
use crate::registry::BundleManifest;
use crate::transport::Transport;

const CHUNK_SIZE: usize = 64 * 1024;

/// A bundle written to staging.
#[derive(Clone, Debug)]
pub struct DownloadedBundle {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Download `bundle` to `dest`.
///
/// Fails on non-2xx status, on an empty body, and on a checksum mismatch
/// when `verify_checksum` is set and the manifest carries one. `cancel` is
/// polled between chunks. `on_progress(received, total)` is called after
/// every chunk. A failed download leaves no file behind.
pub fn download_bundle(
    transport: &dyn Transport,
    bundle: &BundleManifest,
    bearer: Option<&str>,
    dest: &Path,
    verify_checksum: bool,
    cancel: &AtomicBool,
    on_progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<DownloadedBundle, InstallError> {
    let result = stream_to_file(
        transport,
        bundle,
        bearer,
        dest,
        verify_checksum,
        cancel,
        on_progress,
    );
    if result.is_err() {
        let _ = std::fs::remove_file(dest);
    }
    result
}

fn stream_to_file(
    transport: &dyn Transport,
    bundle: &BundleManifest,
    bearer: Option<&str>,
    dest: &Path,
    verify_checksum: bool,
    cancel: &AtomicBool,
    on_progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<DownloadedBundle, InstallError> {
    let mut response = transport.get(&bundle.url, bearer)?;
    if !response.is_success() {
        return Err(InstallError::Http {
            package: bundle.name.clone(),
            status: response.status,
        });
    }
    if response.content_length == Some(0) {
        return Err(InstallError::EmptyBody {
            package: bundle.name.clone(),
        });
    }

    let total = response.content_length;
    let mut file = File::create(dest).map_err(|e| InstallError::io(dest, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received = 0u64;

    loop {
        if cancel.load(Ordering::Acquire) {
            return Err(InstallError::Cancelled);
        }
        let n = response
            .body
            .read(&mut buf)
            .map_err(|e| InstallError::Transport {
                url: bundle.url.clone(),
                reason: e.to_string(),
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .map_err(|e| InstallError::io(dest, e))?;
        received += n as u64;
        on_progress(received, total);
    }
    file.flush().map_err(|e| InstallError::io(dest, e))?;

    if received == 0 {
        return Err(InstallError::EmptyBody {
            package: bundle.name.clone(),
        });
    }

    let actual = hex(&hasher.finalize());
    if verify_checksum {
        if let Some(expected) = &bundle.sha256 {
            if !expected.eq_ignore_ascii_case(&actual) {
                return Err(InstallError::Checksum {
                    package: bundle.name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        } else {
            debug!(package = %bundle.name, "Manifest has no checksum");
        }
    }

    info!(package = %bundle.name, bytes = received, "Downloaded bundle");
    Ok(DownloadedBundle {
        name: bundle.name.clone(),
        path: dest.to_path_buf(),
        bytes: received,
        sha256: actual,
    })
}

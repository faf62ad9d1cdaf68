//! Capability detection: can the system decoder play this source?
//!
//! Fast path: the extension deny-list, no I/O. Slow path: read the container
//! header of a local file and check every video track codec. Remote sources
//! skip the slow path. Anything the scanner cannot name is assumed playable,
//! but a header that fails to parse sends the load to the secondary backend.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use url::Url;
use vl_common::{CapabilityConfig, DemuxError, LoadToken, VideoCodec};

pub const REASON_COMPATIBLE: &str = "compatible";
pub const REASON_UNRECOGNIZED_CODEC: &str = "compatible:unrecognized-codec";
pub const REASON_UNRECOGNIZED_CONTAINER: &str = "compatible:unrecognized-container";
pub const REASON_REMOTE: &str = "compatible:remote";
pub const REASON_PROBE_FAILED: &str = "probe-failed";

/// Host decode capability. Pluggable so hardware detection can replace
/// the configured lists.
pub trait CodecCapabilities: Send + Sync {
    /// `ext` is lowercase, without the dot.
    fn extension_denied(&self, ext: &str) -> bool;

    fn codec_supported(&self, codec: &VideoCodec) -> bool;
}

/// Capabilities from fixed deny-lists.
#[derive(Clone, Debug)]
pub struct DenyListCapabilities {
    extensions: HashSet<String>,
    codecs: HashSet<VideoCodec>,
    host_supports_av1: bool,
}

impl DenyListCapabilities {
    pub fn from_config(config: &CapabilityConfig) -> Self {
        Self {
            extensions: config
                .denied_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            codecs: config
                .denied_codecs
                .iter()
                .map(|c| VideoCodec::from_reason_name(c))
                .collect(),
            host_supports_av1: config.host_supports_av1,
        }
    }
}

impl Default for DenyListCapabilities {
    fn default() -> Self {
        Self::from_config(&CapabilityConfig::default())
    }
}

impl CodecCapabilities for DenyListCapabilities {
    fn extension_denied(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }

    fn codec_supported(&self, codec: &VideoCodec) -> bool {
        if *codec == VideoCodec::Av1 && !self.host_supports_av1 {
            return false;
        }
        !self.codecs.contains(codec)
    }
}

/// Result of a probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub can_use_primary: bool,
    /// Machine-stable reason (`extension:mkv`, `codec:vp9`, `probe-failed`, ...).
    pub reason: String,
}

impl ProbeOutcome {
    pub fn primary(reason: impl Into<String>) -> Self {
        Self {
            can_use_primary: true,
            reason: reason.into(),
        }
    }

    pub fn secondary(reason: impl Into<String>) -> Self {
        Self {
            can_use_primary: false,
            reason: reason.into(),
        }
    }

    pub fn is_probe_failure(&self) -> bool {
        self.reason == REASON_PROBE_FAILED
    }
}

/// Where a URL points.
#[derive(Clone, Debug, PartialEq, Eq)]
enum SourceLocation {
    Local(PathBuf),
    Remote(String),
}

fn locate(url: &str) -> SourceLocation {
    match Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "file" => match parsed.to_file_path() {
            Ok(path) => SourceLocation::Local(path),
            Err(()) => SourceLocation::Local(PathBuf::from(parsed.path())),
        },
        // Single-letter schemes are Windows drive letters.
        Ok(parsed) if parsed.scheme().len() > 1 => SourceLocation::Remote(parsed.path().to_string()),
        _ => SourceLocation::Local(PathBuf::from(url)),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Decide synchronously. Performs file I/O on the slow path.
pub fn probe(url: &str, capabilities: &dyn CodecCapabilities) -> ProbeOutcome {
    let location = locate(url);
    let ext = match &location {
        SourceLocation::Local(path) => extension_of(path),
        SourceLocation::Remote(path) => extension_of(Path::new(path)),
    };

    if let Some(ext) = ext {
        if capabilities.extension_denied(&ext) {
            debug!(url = %url, ext = %ext, "Extension denied for system decoder");
            return ProbeOutcome::secondary(format!("extension:{ext}"));
        }
    }

    let path = match location {
        SourceLocation::Local(path) => path,
        SourceLocation::Remote(_) => return ProbeOutcome::primary(REASON_REMOTE),
    };

    let scan = match vl_demux::scan_file(&path) {
        Ok(scan) => scan,
        Err(DemuxError::UnsupportedContainer) => {
            return ProbeOutcome::primary(REASON_UNRECOGNIZED_CONTAINER);
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Container probe failed");
            return ProbeOutcome::secondary(REASON_PROBE_FAILED);
        }
    };

    let mut unrecognized = false;
    for codec in &scan.video_codecs {
        if !codec.is_recognized() {
            unrecognized = true;
            continue;
        }
        if !capabilities.codec_supported(codec) {
            return ProbeOutcome::secondary(format!("codec:{}", codec.reason_name()));
        }
    }

    if unrecognized {
        ProbeOutcome::primary(REASON_UNRECOGNIZED_CODEC)
    } else {
        ProbeOutcome::primary(REASON_COMPATIBLE)
    }
}

/// Probe on a background thread and hand the outcome to `on_done` there.
pub fn probe_async<F>(
    url: &str,
    token: LoadToken,
    capabilities: Arc<dyn CodecCapabilities>,
    on_done: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce(LoadToken, ProbeOutcome) + Send + 'static,
{
    let url = url.to_string();
    thread::Builder::new()
        .name(format!("vl-probe-{}", token.0))
        .spawn(move || {
            let outcome = probe(&url, capabilities.as_ref());
            info!(
                url = %url,
                token = %token,
                can_use_primary = outcome.can_use_primary,
                reason = %outcome.reason,
                "Probe finished"
            );
            on_done(token, outcome);
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut buf = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(fourcc);
        buf.extend_from_slice(payload);
        buf
    }

    /// Minimal MP4: ftyp + moov/trak/mdia/{hdlr, minf/stbl/stsd}.
    fn mp4_with_entry(entry: &[u8; 4]) -> Vec<u8> {
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"vide");
        hdlr.extend_from_slice(&[0u8; 12]);
        let mut stsd = vec![0, 0, 0, 0, 0, 0, 0, 1];
        stsd.extend(make_box(entry, &[0u8; 8]));
        let stbl = make_box(b"stbl", &make_box(b"stsd", &stsd));
        let minf = make_box(b"minf", &stbl);
        let mut mdia_payload = make_box(b"hdlr", &hdlr);
        mdia_payload.extend(minf);
        let trak = make_box(b"trak", &make_box(b"mdia", &mdia_payload));
        let mut file = make_box(b"ftyp", b"isom\0\0\0\0");
        file.extend(make_box(b"moov", &trak));
        file
    }

    fn write_temp(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extension_fast_path() {
        let caps = DenyListCapabilities::default();
        let outcome = probe("/does/not/exist/clip.WebM", &caps);
        assert_eq!(outcome, ProbeOutcome::secondary("extension:webm"));
    }

    #[test]
    fn vp9_in_mp4_is_denied_by_codec() {
        let path = write_temp("vl_probe_vp9.mp4", &mp4_with_entry(b"vp09"));
        let caps = DenyListCapabilities::default();
        let outcome = probe(path.to_str().unwrap(), &caps);
        assert!(!outcome.can_use_primary);
        assert_eq!(outcome.reason, "codec:vp9");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn h264_in_mp4_is_compatible() {
        let path = write_temp("vl_probe_h264.mp4", &mp4_with_entry(b"avc1"));
        let url = Url::from_file_path(&path).unwrap();
        let outcome = probe(url.as_str(), &DenyListCapabilities::default());
        assert_eq!(outcome, ProbeOutcome::primary(REASON_COMPATIBLE));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unrecognized_codec_is_assumed_compatible() {
        let path = write_temp("vl_probe_zzzz.mov", &mp4_with_entry(b"zzzz"));
        let outcome = probe(path.to_str().unwrap(), &DenyListCapabilities::default());
        assert_eq!(outcome, ProbeOutcome::primary(REASON_UNRECOGNIZED_CODEC));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn av1_follows_host_support() {
        let path = write_temp("vl_probe_av1.mp4", &mp4_with_entry(b"av01"));
        let url = path.to_str().unwrap();

        let outcome = probe(url, &DenyListCapabilities::default());
        assert_eq!(outcome.reason, "codec:av1");

        let config = CapabilityConfig {
            host_supports_av1: true,
            ..CapabilityConfig::default()
        };
        let outcome = probe(url, &DenyListCapabilities::from_config(&config));
        assert!(outcome.can_use_primary);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_header_reports_probe_failed() {
        // moov and its trak claim more bytes than the file holds
        let mut bytes = make_box(b"ftyp", b"isom\0\0\0\0");
        bytes.extend_from_slice(&200u32.to_be_bytes());
        bytes.extend_from_slice(b"moov");
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"trak");
        let path = write_temp("vl_probe_corrupt.mp4", &bytes);
        let outcome = probe(path.to_str().unwrap(), &DenyListCapabilities::default());
        assert!(!outcome.can_use_primary);
        assert!(outcome.is_probe_failure());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn remote_urls_skip_the_slow_path() {
        let caps = DenyListCapabilities::default();
        assert_eq!(
            probe("https://cdn.example.com/ref/clip.mp4?sig=1", &caps),
            ProbeOutcome::primary(REASON_REMOTE)
        );
        assert_eq!(
            probe("https://cdn.example.com/ref/clip.mkv", &caps).reason,
            "extension:mkv"
        );
    }

    #[test]
    fn async_probe_reports_token() {
        let (tx, rx) = crossbeam::channel::bounded(1);
        let caps: Arc<dyn CodecCapabilities> = Arc::new(DenyListCapabilities::default());
        let handle = probe_async("movie.avi", LoadToken(7), caps, move |token, outcome| {
            let _ = tx.send((token, outcome));
        })
        .unwrap();
        handle.join().unwrap();
        let (token, outcome) = rx.recv().unwrap();
        assert_eq!(token, LoadToken(7));
        assert_eq!(outcome.reason, "extension:avi");
    }
}

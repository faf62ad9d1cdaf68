//! Install job bookkeeping.

use std::sync::Arc;

use vl_common::{Architecture, InstallProgress, InstallStatus};

/// Receives every progress report, terminal ones included. Called from the
/// install thread.
pub type ProgressSink = Arc<dyn Fn(InstallProgress) + Send + Sync>;

// Fraction checkpoints across the job.
pub(crate) const FRACTION_MANIFESTS: f32 = 0.1;
pub(crate) const FRACTION_DOWNLOADED: f32 = 0.7;
pub(crate) const FRACTION_EXTRACTED: f32 = 0.8;
pub(crate) const FRACTION_RELINKED: f32 = 0.9;
pub(crate) const FRACTION_VERIFYING: f32 = 0.95;

/// State of the most recent job for one architecture.
#[derive(Clone, Debug, PartialEq)]
pub struct InstallJob {
    pub architecture: Architecture,
    /// Package first, then its direct dependencies. Empty until manifests
    /// have been fetched.
    pub required_libraries: Vec<String>,
    pub fraction: f32,
    pub status: InstallStatus,
}

impl InstallJob {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            required_libraries: Vec::new(),
            fraction: 0.0,
            status: InstallStatus::Pending,
        }
    }

    pub fn progress(&self) -> InstallProgress {
        InstallProgress::new(self.architecture, self.status.clone(), self.fraction)
    }

    /// Move to `status`. The fraction never goes backwards within a job.
    pub fn advance(&mut self, status: InstallStatus, fraction: f32) {
        self.status = status;
        self.fraction = fraction.clamp(0.0, 1.0).max(self.fraction);
    }

    pub fn fail(&mut self, reason: String) {
        self.status = InstallStatus::Failed(reason);
    }

    pub fn is_installed(&self) -> bool {
        self.status == InstallStatus::Installed
    }
}

/// Fraction for `received` of `total` bytes of bundle `index` of `count`.
pub(crate) fn download_fraction(index: usize, count: usize, received: u64, total: Option<u64>) -> f32 {
    if count == 0 {
        return FRACTION_DOWNLOADED;
    }
    let within = match total {
        Some(total) if total > 0 => (received as f64 / total as f64).min(1.0),
        _ => 0.0,
    };
    let done = (index as f64 + within) / count as f64;
    FRACTION_MANIFESTS + (FRACTION_DOWNLOADED - FRACTION_MANIFESTS) * done as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_is_monotonic() {
        let mut job = InstallJob::new(Architecture::Arm64);
        job.advance(InstallStatus::Downloading, 0.5);
        job.advance(InstallStatus::Downloading, 0.3);
        assert_eq!(job.fraction, 0.5);
        job.fail("download of mpv returned HTTP 500".into());
        assert_eq!(job.progress().fraction, 0.5);
        assert!(job.progress().status.is_terminal());
    }

    #[test]
    fn download_fraction_spans_the_download_window() {
        assert_eq!(download_fraction(0, 2, 0, Some(100)), FRACTION_MANIFESTS);
        let half = download_fraction(0, 2, 100, Some(100));
        assert!((half - 0.4).abs() < 1e-6);
        let end = download_fraction(1, 2, 100, Some(100));
        assert!((end - FRACTION_DOWNLOADED).abs() < 1e-6);
        // unknown length only counts finished bundles
        assert_eq!(download_fraction(1, 2, 50, None), half);
    }
}

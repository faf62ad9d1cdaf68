//! Backend selection.
//!
//! This is the only module that looks at which backend is which. The engine
//! asks it what to do after a probe or a failure and gets back a plain
//! decision; everything else talks to `dyn PlaybackBackend`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use vl_backend::{BackendFactory, PlaybackBackend, ProbeOutcome};
use vl_common::{Architecture, BackendKind, PlaybackError, PlaybackResult};
use vl_installer::{LibraryInstaller, ProgressSink};

/// Where a load goes next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Primary,
    Secondary(PathBuf),
    /// Secondary needed but not installed: run the installer first.
    Acquire(Architecture),
    Fail(PlaybackError),
}

pub struct BackendSelector {
    factory: Box<dyn BackendFactory>,
    installer: Arc<dyn LibraryInstaller>,
    architecture: Option<Architecture>,
}

impl BackendSelector {
    pub fn new(
        factory: Box<dyn BackendFactory>,
        installer: Arc<dyn LibraryInstaller>,
        architecture: Option<Architecture>,
    ) -> Self {
        Self {
            factory,
            installer,
            architecture,
        }
    }

    pub fn architecture(&self) -> Option<Architecture> {
        self.architecture
    }

    /// Route for a fresh probe result.
    pub fn after_probe(&self, outcome: &ProbeOutcome) -> Route {
        if outcome.can_use_primary {
            debug!(reason = %outcome.reason, "Primary backend can decode source");
            Route::Primary
        } else {
            info!(reason = %outcome.reason, "Source needs the secondary backend");
            self.secondary_route(&outcome.reason)
        }
    }

    /// Route after `kind` failed before the item became ready.
    ///
    /// A primary failure is fallback-eligible. A secondary failure ends the
    /// load, except that a missing library goes to the installer once.
    pub fn after_failure(
        &self,
        kind: BackendKind,
        error: &PlaybackError,
        acquired_this_load: bool,
    ) -> Route {
        match kind {
            BackendKind::Primary => {
                info!(error = %error, "Primary backend failed before ready, falling back");
                self.secondary_route(&error.to_string())
            }
            BackendKind::Secondary => match error {
                PlaybackError::BackendUnavailable(_) if !acquired_this_load => {
                    match self.architecture {
                        Some(arch) => Route::Acquire(arch),
                        None => Route::Fail(unsupported_arch()),
                    }
                }
                PlaybackError::UnsupportedFormat(_) => Route::Fail(error.clone()),
                other => Route::Fail(PlaybackError::UnsupportedFormat(other.to_string())),
            },
        }
    }

    fn secondary_route(&self, reason: &str) -> Route {
        let Some(arch) = self.architecture else {
            debug!(reason = %reason, "No secondary decoder for this host");
            return Route::Fail(unsupported_arch());
        };
        if self.installer.is_installed(arch) {
            Route::Secondary(self.installer.library_path(arch))
        } else {
            Route::Acquire(arch)
        }
    }

    /// Route once the installer reports success.
    pub fn after_install(&self, arch: Architecture) -> Route {
        Route::Secondary(self.installer.library_path(arch))
    }

    pub fn build(&self, route: &Route) -> PlaybackResult<Box<dyn PlaybackBackend>> {
        match route {
            Route::Primary => self.factory.primary(),
            Route::Secondary(library) => self.factory.secondary(library),
            Route::Acquire(_) | Route::Fail(_) => Err(PlaybackError::InvalidArgument(
                "route does not name a backend".into(),
            )),
        }
    }

    pub fn start_install(&self, arch: Architecture, progress: ProgressSink) {
        self.installer.ensure_installed_async(arch, progress);
    }

    pub fn cancel_install(&self, arch: Architecture) {
        self.installer.cancel(arch);
    }
}

fn unsupported_arch() -> PlaybackError {
    PlaybackError::UnsupportedFormat(format!(
        "no secondary decoder available for {}",
        std::env::consts::ARCH
    ))
}

//! The install job runner.
//!
//! One [`Installer`] instance owns the install root. Jobs are keyed by
//! architecture and serialized by a per-architecture lock, so the staging
//! directory for an architecture has a single writer. A job either ends
//! `Installed` with a library that loads, or `Failed` with nothing
//! promoted and staging cleaned.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};
use vl_common::{Architecture, InstallProgress, InstallStatus, InstallerConfig};

use crate::download::download_bundle;
use crate::error::InstallError;
use crate::extract::{collect_libraries, extract_bundle, flatten_libraries};
use crate::job::{
    download_fraction, InstallJob, ProgressSink, FRACTION_DOWNLOADED, FRACTION_EXTRACTED,
    FRACTION_MANIFESTS, FRACTION_RELINKED, FRACTION_VERIFYING,
};
use crate::registry::{fetch_manifest, BundleManifest};
use crate::relink::{platform_relinker, relink_all, Relinker};
use crate::token::fetch_token;
use crate::transport::{ReqwestTransport, Transport};
use crate::verify::{DylibVerifier, LibraryVerifier};

/// What the engine needs from an installer.
pub trait LibraryInstaller: Send + Sync {
    /// Where the library lives once installed.
    fn library_path(&self, arch: Architecture) -> PathBuf;

    /// Whether the installed library loads right now.
    fn is_installed(&self, arch: Architecture) -> bool;

    /// Run (or join) the install job for `arch` off the calling thread.
    /// `progress` always receives a terminal report.
    fn ensure_installed_async(&self, arch: Architecture, progress: ProgressSink);

    /// Abort the running or next job for `arch`. It ends `Failed("cancelled")`.
    fn cancel(&self, arch: Architecture);
}

struct Inner {
    config: InstallerConfig,
    transport: Box<dyn Transport>,
    relinker: Box<dyn Relinker>,
    verifier: Box<dyn LibraryVerifier>,
    locks: Mutex<HashMap<Architecture, Arc<Mutex<()>>>>,
    cancel_flags: Mutex<HashMap<Architecture, Arc<AtomicBool>>>,
    jobs: Mutex<HashMap<Architecture, InstallJob>>,
}

/// Cloneable handle; clones share locks, cache and cancel flags.
#[derive(Clone)]
pub struct Installer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("install_root", &self.inner.config.install_root)
            .field("package", &self.inner.config.package)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Installer with the real HTTP client, the host relinker and a
    /// `libloading` verifier.
    pub fn new(config: InstallerConfig) -> Result<Self, InstallError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_parts(
            config,
            Box::new(transport),
            platform_relinker(),
            Box::new(DylibVerifier),
        ))
    }

    pub fn with_parts(
        config: InstallerConfig,
        transport: Box<dyn Transport>,
        relinker: Box<dyn Relinker>,
        verifier: Box<dyn LibraryVerifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                relinker,
                verifier,
                locks: Mutex::new(HashMap::new()),
                cancel_flags: Mutex::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.inner.config
    }

    /// `<install_root>/<arch>`
    pub fn arch_root(&self, arch: Architecture) -> PathBuf {
        self.inner.config.install_root.join(arch.as_str())
    }

    /// `<install_root>/<arch>/lib`
    pub fn lib_dir(&self, arch: Architecture) -> PathBuf {
        self.arch_root(arch).join("lib")
    }

    /// `<install_root>/staging/<arch>`
    pub fn staging_dir(&self, arch: Architecture) -> PathBuf {
        self.inner
            .config
            .install_root
            .join("staging")
            .join(arch.as_str())
    }

    /// Snapshot of the last job for `arch`.
    pub fn status(&self, arch: Architecture) -> Option<InstallJob> {
        self.inner.jobs.lock().get(&arch).cloned()
    }

    fn arch_lock(&self, arch: Architecture) -> Arc<Mutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(arch)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn cancel_flag(&self, arch: Architecture) -> Arc<AtomicBool> {
        self.inner
            .cancel_flags
            .lock()
            .entry(arch)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    fn publish(&self, job: &InstallJob, progress: &dyn Fn(InstallProgress)) {
        self.inner.jobs.lock().insert(job.architecture, job.clone());
        progress(job.progress());
    }

    /// Install the library for `arch`, blocking until the job ends.
    ///
    /// Re-running after success is a no-op once the library still loads.
    /// After a failure the job starts over from the registry query.
    ///
    /// A [`LibraryInstaller::cancel`] issued before the job gets to run
    /// still applies to it. The job consumes the request when it ends, so
    /// a later call starts clean.
    pub fn ensure_installed(
        &self,
        arch: Architecture,
        progress: &dyn Fn(InstallProgress),
    ) -> Result<PathBuf, InstallError> {
        let lock = self.arch_lock(arch);
        let _guard = lock.lock();

        let cancel = self.cancel_flag(arch);
        let result = self.install_locked(arch, &cancel, progress);
        cancel.store(false, Ordering::Release);
        result
    }

    fn install_locked(
        &self,
        arch: Architecture,
        cancel: &AtomicBool,
        progress: &dyn Fn(InstallProgress),
    ) -> Result<PathBuf, InstallError> {
        let library = self.library_path(arch);
        if self.inner.verifier.verify(&library).is_ok() {
            let mut job = self
                .status(arch)
                .filter(InstallJob::is_installed)
                .unwrap_or_else(|| InstallJob::new(arch));
            job.advance(InstallStatus::Installed, 1.0);
            self.publish(&job, progress);
            return Ok(library);
        }

        info!(arch = %arch, package = %self.inner.config.package, "Install started");
        let mut job = InstallJob::new(arch);
        self.publish(&job, progress);

        match self.run_job(&mut job, cancel, progress) {
            Ok(()) => {
                job.advance(InstallStatus::Installed, 1.0);
                self.publish(&job, progress);
                let _ = fs::remove_dir_all(self.staging_dir(arch));
                info!(arch = %arch, path = %library.display(), "Install finished");
                Ok(library)
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!(arch = %arch, "Install cancelled");
                } else {
                    error!(arch = %arch, error = %e, "Install failed");
                }
                self.discard_partial(arch);
                job.fail(e.to_string());
                self.publish(&job, progress);
                Err(e)
            }
        }
    }

    fn discard_partial(&self, arch: Architecture) {
        for dir in [self.staging_dir(arch), self.lib_dir(arch)] {
            if let Err(e) = fs::remove_dir_all(&dir) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %dir.display(), error = %e, "Could not clean up");
                }
            }
        }
    }

    fn run_job(
        &self,
        job: &mut InstallJob,
        cancel: &AtomicBool,
        progress: &dyn Fn(InstallProgress),
    ) -> Result<(), InstallError> {
        let arch = job.architecture;
        let config = &self.inner.config;
        let transport = self.inner.transport.as_ref();
        let check_cancel = || {
            if cancel.load(Ordering::Acquire) {
                Err(InstallError::Cancelled)
            } else {
                Ok(())
            }
        };

        check_cancel()?;
        let staging = self.staging_dir(arch);
        reset_dir(&staging)?;

        // ─── Registry ───
        let root = fetch_manifest(
            transport,
            &config.registry_url,
            &config.package,
            arch,
            &config.os_tags,
        )?;
        let mut bundles = vec![root.clone()];
        for dep in &root.dependencies {
            check_cancel()?;
            bundles.push(fetch_manifest(
                transport,
                &config.registry_url,
                dep,
                arch,
                &config.os_tags,
            )?);
        }
        job.required_libraries = bundles.iter().map(|b| b.name.clone()).collect();
        info!(
            arch = %arch,
            libraries = ?job.required_libraries,
            "Resolved bundle manifests"
        );
        job.advance(InstallStatus::Downloading, FRACTION_MANIFESTS);
        self.publish(job, progress);

        // ─── Download ───
        let count = bundles.len();
        let mut archives = Vec::with_capacity(count);
        for (index, bundle) in bundles.iter().enumerate() {
            check_cancel()?;
            let token = fetch_token(transport, config, &bundle.name)?;
            let dest = staging.join(format!("{}.tar.gz", bundle.name));
            let downloaded = download_bundle(
                transport,
                bundle,
                Some(&token),
                &dest,
                config.verify_checksums,
                cancel,
                &mut |received, total| {
                    let fraction = download_fraction(index, count, received, total);
                    if fraction > job.fraction + 0.01 {
                        job.advance(InstallStatus::Downloading, fraction);
                        self.publish(job, progress);
                    }
                },
            )?;
            archives.push((bundle, downloaded.path));
        }
        job.advance(InstallStatus::Downloading, FRACTION_DOWNLOADED);
        self.publish(job, progress);

        // ─── Extract ───
        check_cancel()?;
        job.advance(InstallStatus::Extracting, FRACTION_DOWNLOADED);
        self.publish(job, progress);
        let staged_lib = staging.join("lib");
        let mut staged = Vec::new();
        for (bundle, archive) in &archives {
            check_cancel()?;
            staged.extend(self.extract_one(bundle, archive, &staging, &staged_lib)?);
        }
        job.advance(InstallStatus::Extracting, FRACTION_EXTRACTED);
        self.publish(job, progress);

        // ─── Relink ───
        check_cancel()?;
        job.advance(InstallStatus::Relinking, FRACTION_EXTRACTED);
        self.publish(job, progress);
        let lib_dir = self.lib_dir(arch);
        relink_all(self.inner.relinker.as_ref(), &staged, &lib_dir)?;
        job.advance(InstallStatus::Relinking, FRACTION_RELINKED);
        self.publish(job, progress);

        // ─── Promote + verify ───
        check_cancel()?;
        self.promote(&staged_lib, &lib_dir)?;
        job.advance(InstallStatus::Verifying, FRACTION_VERIFYING);
        self.publish(job, progress);
        self.inner.verifier.verify(&self.library_path(arch))
    }

    fn extract_one(
        &self,
        bundle: &BundleManifest,
        archive: &Path,
        staging: &Path,
        staged_lib: &Path,
    ) -> Result<Vec<PathBuf>, InstallError> {
        let out = staging.join(&bundle.name);
        extract_bundle(&bundle.name, archive, &out)?;
        let libraries = collect_libraries(&out)?;
        if libraries.is_empty() {
            warn!(package = %bundle.name, "Bundle contains no shared libraries");
        }
        flatten_libraries(&libraries, staged_lib)
    }

    /// Replace `<arch>/lib` with the staged directory.
    fn promote(&self, staged_lib: &Path, lib_dir: &Path) -> Result<(), InstallError> {
        if lib_dir.exists() {
            fs::remove_dir_all(lib_dir).map_err(|e| InstallError::io(lib_dir, e))?;
        }
        if let Some(parent) = lib_dir.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
        }
        fs::rename(staged_lib, lib_dir).map_err(|e| InstallError::io(staged_lib, e))?;
        info!(path = %lib_dir.display(), "Promoted staged libraries");
        Ok(())
    }
}

fn reset_dir(dir: &Path) -> Result<(), InstallError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(dir, e)),
    }
    fs::create_dir_all(dir).map_err(|e| InstallError::io(dir, e))
}

impl LibraryInstaller for Installer {
    fn library_path(&self, arch: Architecture) -> PathBuf {
        self.lib_dir(arch).join(&self.inner.config.library_file)
    }

    fn is_installed(&self, arch: Architecture) -> bool {
        self.inner.verifier.verify(&self.library_path(arch)).is_ok()
    }

    fn ensure_installed_async(&self, arch: Architecture, progress: ProgressSink) {
        let installer = self.clone();
        let sink = progress.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("vl-install-{arch}"))
            .spawn(move || {
                let _ = installer.ensure_installed(arch, &*sink);
            });
        if let Err(e) = spawned {
            error!(arch = %arch, error = %e, "Could not start install thread");
            progress(InstallProgress::new(
                arch,
                InstallStatus::Failed(format!("could not start install thread: {e}")),
                0.0,
            ));
        }
    }

    fn cancel(&self, arch: Architecture) {
        info!(arch = %arch, "Install cancel requested");
        self.cancel_flag(arch).store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relink::Patchelf;
    use crate::transport::HttpResponse;

    struct Offline;

    impl Transport for Offline {
        fn get(&self, url: &str, _bearer: Option<&str>) -> Result<HttpResponse, InstallError> {
            Err(InstallError::Transport {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    struct Never;

    impl LibraryVerifier for Never {
        fn verify(&self, path: &Path) -> Result<(), InstallError> {
            Err(InstallError::Verify {
                path: path.to_path_buf(),
                reason: "never".into(),
            })
        }
    }

    fn offline(name: &str) -> Installer {
        let config = InstallerConfig {
            install_root: std::env::temp_dir()
                .join(format!("vl_installer_unit_{name}_{}", std::process::id())),
            ..InstallerConfig::default()
        };
        Installer::with_parts(config, Box::new(Offline), Box::new(Patchelf), Box::new(Never))
    }

    #[test]
    fn layout_is_keyed_by_architecture() {
        let installer = offline("layout");
        let root = installer.config().install_root.clone();
        assert_eq!(installer.lib_dir(Architecture::Arm64), root.join("arm64/lib"));
        assert_eq!(
            installer.staging_dir(Architecture::X86_64),
            root.join("staging/x86_64")
        );
        assert!(installer
            .library_path(Architecture::Arm64)
            .starts_with(root.join("arm64/lib")));
    }

    #[test]
    fn transport_failure_ends_failed_and_cleans_staging() {
        let installer = offline("transport");
        let reports = Mutex::new(Vec::new());
        let err = installer
            .ensure_installed(Architecture::Arm64, &|p| reports.lock().push(p))
            .unwrap_err();
        assert!(matches!(err, InstallError::Transport { .. }));

        let reports = reports.into_inner();
        assert_eq!(reports.first().map(|p| &p.status), Some(&InstallStatus::Pending));
        assert!(matches!(
            reports.last().map(|p| &p.status),
            Some(InstallStatus::Failed(reason)) if reason.contains("offline")
        ));
        assert!(!installer.staging_dir(Architecture::Arm64).exists());
        assert!(!installer.is_installed(Architecture::Arm64));
        assert!(matches!(
            installer.status(Architecture::Arm64).map(|j| j.status),
            Some(InstallStatus::Failed(_))
        ));
        let _ = fs::remove_dir_all(&installer.config().install_root);
    }
}

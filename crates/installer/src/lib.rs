//! `vl-installer`: On-demand acquisition of the secondary decoder library.
//!
//! An install job for one architecture runs these steps in order:
//!
//! 1. **Registry**: fetch bundle manifests for the package and its direct
//!    dependencies, picking the best bottle tag ([`tag_candidates`])
//! 2. **Token**: obtain a bearer token for the artifact host
//! 3. **Download**: stream each bundle to staging, checking status, size and
//!    SHA-256
//! 4. **Extract**: unpack and flatten shared libraries into one directory
//! 5. **Relink**: rewrite build-prefix load paths ([`plan_relink`])
//! 6. **Verify**: promote, then load the library by path
//!
//! Any failing step ends the job `Failed` with nothing promoted.

pub mod arch;
pub mod download;
pub mod error;
pub mod extract;
pub mod installer;
pub mod job;
pub mod registry;
pub mod relink;
pub mod token;
pub mod transport;
pub mod verify;

pub use arch::{tag_candidates, PORTABLE_TAG};
pub use download::{download_bundle, DownloadedBundle};
pub use error::InstallError;
pub use installer::{Installer, LibraryInstaller};
pub use job::{InstallJob, ProgressSink};
pub use registry::{fetch_manifest, manifest_url, parse_manifest, BundleManifest};
pub use relink::{
    plan_relink, platform_relinker, relink_all, BinaryFormat, InstallNameTool, PathChange,
    Patchelf, RelinkPlan, Relinker,
};
pub use token::{fetch_token, repository_path, token_request_url};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
pub use verify::{DylibVerifier, LibraryVerifier, REQUIRED_SYMBOL};

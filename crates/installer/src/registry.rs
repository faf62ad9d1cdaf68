//! Package registry manifests.
//!
//! Manifests are Homebrew-style formula JSON:
//!
//! ```json
//! { "name": "mpv",
//!   "dependencies": ["ffmpeg", "libass"],
//!   "bottle": { "stable": { "files": {
//!       "arm64_sonoma": { "url": "...", "sha256": "..." } } } } }
//! ```
//!
//! The registry is untrusted. Every key is optional during parsing; a
//! missing bottle for every candidate tag is "no compatible bundle".

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;
use vl_common::Architecture;

use crate::arch::tag_candidates;
use crate::error::InstallError;
use crate::transport::Transport;

/// One downloadable bundle chosen for an architecture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleManifest {
    pub name: String,
    pub tag: String,
    pub url: String,
    pub sha256: Option<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormulaDoc {
    dependencies: Option<Vec<String>>,
    bottle: Option<BottleSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BottleSection {
    stable: Option<BottleSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BottleSpec {
    files: HashMap<String, BottleFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BottleFile {
    url: Option<String>,
    sha256: Option<String>,
}

/// `<base>/<name>.json`
pub fn manifest_url(base: &str, name: &str) -> String {
    format!("{}/{}.json", base.trim_end_matches('/'), name)
}

/// Pick the first bottle matching `tags` out of a manifest document.
pub fn parse_manifest(
    name: &str,
    json: &str,
    arch: Architecture,
    os_tags: &[String],
) -> Result<BundleManifest, InstallError> {
    let doc: FormulaDoc = serde_json::from_str(json).map_err(|e| InstallError::Registry {
        package: name.to_string(),
        reason: format!("malformed manifest: {e}"),
    })?;

    let no_bundle = || InstallError::NoCompatibleBundle {
        package: name.to_string(),
        architecture: arch,
    };

    let files = doc
        .bottle
        .and_then(|b| b.stable)
        .map(|s| s.files)
        .ok_or_else(no_bundle)?;

    for tag in tag_candidates(arch, os_tags) {
        let Some(file) = files.get(&tag) else {
            continue;
        };
        let Some(url) = file.url.clone().filter(|u| !u.is_empty()) else {
            continue;
        };
        debug!(package = %name, tag = %tag, "Selected bottle");
        return Ok(BundleManifest {
            name: name.to_string(),
            tag,
            url,
            sha256: file.sha256.clone().filter(|s| !s.is_empty()),
            dependencies: doc.dependencies.unwrap_or_default(),
        });
    }

    Err(no_bundle())
}

/// Fetch and parse the manifest for `name`.
pub fn fetch_manifest(
    transport: &dyn Transport,
    base: &str,
    name: &str,
    arch: Architecture,
    os_tags: &[String],
) -> Result<BundleManifest, InstallError> {
    let url = manifest_url(base, name);
    let response = transport.get(&url, None)?;
    if !response.is_success() {
        return Err(InstallError::Registry {
            package: name.to_string(),
            reason: format!("HTTP {}", response.status),
        });
    }
    let text = response.into_text(&url)?;
    parse_manifest(name, &text, arch, os_tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os() -> Vec<String> {
        vec!["sequoia".into(), "sonoma".into()]
    }

    const MPV: &str = r#"{
        "name": "mpv",
        "dependencies": ["ffmpeg", "libass"],
        "bottle": { "stable": { "files": {
            "arm64_sonoma": { "url": "https://ghcr.io/v2/homebrew/core/mpv/blobs/sha256:aa", "sha256": "aa" },
            "sonoma": { "url": "https://ghcr.io/v2/homebrew/core/mpv/blobs/sha256:bb", "sha256": "bb" }
        } } }
    }"#;

    #[test]
    fn manifest_url_trims_slash() {
        assert_eq!(
            manifest_url("https://formulae.brew.sh/api/formula/", "mpv"),
            "https://formulae.brew.sh/api/formula/mpv.json"
        );
    }

    #[test]
    fn falls_back_to_older_os_tag() {
        let bundle = parse_manifest("mpv", MPV, Architecture::Arm64, &os()).unwrap();
        assert_eq!(bundle.tag, "arm64_sonoma");
        assert_eq!(bundle.sha256.as_deref(), Some("aa"));
        assert_eq!(bundle.dependencies, vec!["ffmpeg", "libass"]);

        let intel = parse_manifest("mpv", MPV, Architecture::X86_64, &os()).unwrap();
        assert_eq!(intel.tag, "sonoma");
    }

    #[test]
    fn portable_bottle_is_last_resort() {
        let json = r#"{ "bottle": { "stable": { "files": { "all": { "url": "https://x/all" } } } } }"#;
        let bundle = parse_manifest("libfoo", json, Architecture::Arm64, &os()).unwrap();
        assert_eq!(bundle.tag, "all");
        assert_eq!(bundle.sha256, None);
        assert!(bundle.dependencies.is_empty());
    }

    #[test]
    fn missing_keys_mean_no_bundle() {
        for json in [
            "{}",
            r#"{ "bottle": {} }"#,
            r#"{ "bottle": { "stable": { "files": {} } } }"#,
            r#"{ "bottle": { "stable": { "files": { "arm64_sonoma": {} } } } }"#,
        ] {
            let err = parse_manifest("mpv", json, Architecture::Arm64, &os()).unwrap_err();
            assert!(
                matches!(err, InstallError::NoCompatibleBundle { .. }),
                "{json}: {err}"
            );
        }
    }

    #[test]
    fn malformed_json_is_registry_error() {
        let err = parse_manifest("mpv", "not json", Architecture::Arm64, &os()).unwrap_err();
        assert!(matches!(err, InstallError::Registry { .. }));
    }
}

//! Configuration structs for the engine, seeking, scrubbing, capability
//! detection and the native library installer.
//!
//! Every struct is `#[serde(default)]`, so a config file only needs the keys
//! it wants to override.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Name of the per-user data directory.
pub const APP_DIR_NAME: &str = "Vellum";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub seek: SeekConfig,
    pub scrub: ScrubConfig,
    pub capability: CapabilityConfig,
    pub installer: InstallerConfig,
}

impl EngineConfig {
    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Seek behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    /// Tolerance on each side of a fast seek target.
    pub fast_tolerance_ms: u64,
    /// Bound on an accurate seek before it is reported as timed out.
    pub accurate_timeout_ms: u64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            fast_tolerance_ms: 500,
            accurate_timeout_ms: 4000,
        }
    }
}

impl SeekConfig {
    pub fn fast_tolerance(&self) -> Duration {
        Duration::from_millis(self.fast_tolerance_ms)
    }

    pub fn accurate_timeout(&self) -> Duration {
        Duration::from_millis(self.accurate_timeout_ms)
    }
}

/// Scrub controller tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    /// Seconds of media per drag point.
    pub seconds_per_point: f64,
    /// Fast seeks closer together than this are coalesced.
    pub min_interval_ms: u64,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            seconds_per_point: 0.02,
            min_interval_ms: 33,
        }
    }
}

impl ScrubConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Primary-backend capability rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Lowercase extensions the system decoder never opens.
    pub denied_extensions: Vec<String>,
    /// Codec reason names (`vp9`, `av1`, ...) the system decoder cannot decode.
    pub denied_codecs: Vec<String>,
    /// Host has hardware AV1 decode.
    pub host_supports_av1: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            denied_extensions: [
                "mkv", "webm", "avi", "flv", "wmv", "ogv", "ogg", "rm", "rmvb", "vob", "divx",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            denied_codecs: vec!["vp8".into(), "vp9".into()],
            host_supports_av1: false,
        }
    }
}

/// Native library installer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Registry API base; manifests are `<base>/<package>.json`.
    pub registry_url: String,
    /// Token endpoint for the artifact host.
    pub token_url: String,
    /// Service name passed to the token endpoint.
    pub token_service: String,
    /// Artifact repository prefix (`homebrew/core`).
    pub repository: String,
    pub package: String,
    /// File name of the library to verify inside `<install_root>/<arch>/lib`.
    pub library_file: String,
    pub install_root: PathBuf,
    /// OS bottle tags, newest first.
    pub os_tags: Vec<String>,
    pub http_timeout_secs: u64,
    pub max_redirects: usize,
    pub verify_checksums: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://formulae.brew.sh/api/formula".into(),
            token_url: "https://ghcr.io/token".into(),
            token_service: "ghcr.io".into(),
            repository: "homebrew/core".into(),
            package: "mpv".into(),
            library_file: default_library_file().into(),
            install_root: default_install_root(),
            os_tags: ["sequoia", "sonoma", "ventura", "monterey"]
                .into_iter()
                .map(String::from)
                .collect(),
            http_timeout_secs: 60,
            max_redirects: 5,
            verify_checksums: true,
        }
    }
}

impl InstallerConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_library_file() -> &'static str {
    if cfg!(target_os = "macos") {
        "libmpv.2.dylib"
    } else if cfg!(target_os = "windows") {
        "libmpv-2.dll"
    } else {
        "libmpv.so.2"
    }
}

/// Per-user local data directory joined with [`APP_DIR_NAME`], if the
/// platform has one.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// `<data dir>/native`, or the same layout under the system temp directory
/// when no data directory can be resolved.
pub fn default_install_root() -> PathBuf {
    default_data_dir()
        .unwrap_or_else(|| {
            warn!("No local data directory; installing native libraries under the temp dir");
            std::env::temp_dir().join(APP_DIR_NAME)
        })
        .join("native")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_uses_defaults() {
        let path = std::env::temp_dir().join("vl_config_partial_test.json");
        std::fs::write(&path, r#"{ "seek": { "accurate_timeout_ms": 250 } }"#).unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.seek.accurate_timeout_ms, 250);
        assert_eq!(config.seek.fast_tolerance_ms, 500);
        assert_eq!(config.installer.package, "mpv");
        assert!(config
            .capability
            .denied_extensions
            .iter()
            .any(|e| e == "webm"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join("vl_config_save_test.json");
        let mut config = EngineConfig::default();
        config.capability.host_supports_av1 = true;
        config.save_to(&path).unwrap();

        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("vl_config_does_not_exist.json");
        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn install_root_is_under_app_dir() {
        let config = InstallerConfig::default();
        assert!(config.install_root.ends_with("Vellum/native"));
        assert!(config.install_root.is_absolute());
        assert_eq!(config.install_root, default_install_root());
    }

    #[test]
    fn data_dir_comes_from_the_platform() {
        let expected = dirs::data_local_dir().map(|d| d.join(APP_DIR_NAME));
        assert_eq!(default_data_dir(), expected);
        if let Some(dir) = default_data_dir() {
            assert!(dir.is_absolute());
            assert_eq!(default_install_root(), dir.join("native"));
        }
    }
}

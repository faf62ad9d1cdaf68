//! Install job status shared between the installer and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU architecture an install job is keyed by.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    Arm64,
    X86_64,
}

impl Architecture {
    /// Architecture of the running process, if it is one bundles exist for.
    pub fn current() -> Option<Self> {
        match std::env::consts::ARCH {
            "aarch64" => Some(Self::Arm64),
            "x86_64" => Some(Self::X86_64),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install job status. `Installed` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    Pending,
    Downloading,
    Extracting,
    Relinking,
    Verifying,
    Installed,
    Failed(String),
}

impl InstallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed | Self::Failed(_))
    }
}

/// One progress report from an install job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub architecture: Architecture,
    pub status: InstallStatus,
    /// 0.0..=1.0 across the whole job.
    pub fraction: f32,
}

impl InstallProgress {
    pub fn new(architecture: Architecture, status: InstallStatus, fraction: f32) -> Self {
        Self {
            architecture,
            status,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

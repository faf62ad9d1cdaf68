//! Seek request types.

use serde::{Deserialize, Serialize};

use crate::types::MediaTime;

/// Seek fidelity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeekFidelity {
    /// Low latency, tolerance-based. Superseded freely by newer fast requests.
    Fast,
    /// Frame-exact, zero tolerance. Only a newer accurate request replaces it.
    #[default]
    Accurate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub target: MediaTime,
    pub fidelity: SeekFidelity,
}

impl SeekRequest {
    pub fn fast(target: MediaTime) -> Self {
        Self {
            target,
            fidelity: SeekFidelity::Fast,
        }
    }

    pub fn accurate(target: MediaTime) -> Self {
        Self {
            target,
            fidelity: SeekFidelity::Accurate,
        }
    }

    pub fn is_accurate(&self) -> bool {
        self.fidelity == SeekFidelity::Accurate
    }
}

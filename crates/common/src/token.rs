//! Load generation tokens.
//!
//! Every `load()` mints a new token. Asynchronous work captures the token it
//! was started under and checks it against the current one before applying
//! any result, so a superseded load can never write into the state of a
//! newer one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing load id. `LoadToken(0)` means "nothing loaded".
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LoadToken(pub u64);

impl LoadToken {
    pub const NONE: Self = Self(0);
}

impl fmt::Display for LoadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mints tokens. Owned by the engine.
#[derive(Debug, Default)]
pub struct LoadTokenSource {
    current: Arc<AtomicU64>,
}

impl LoadTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh token and make it current.
    pub fn mint(&self) -> LoadToken {
        LoadToken(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Invalidate every outstanding token without starting a new load.
    pub fn invalidate(&self) -> LoadToken {
        self.mint()
    }

    pub fn current(&self) -> LoadToken {
        LoadToken(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token != LoadToken::NONE && self.current() == token
    }

    /// Read-only view that can be handed to render or I/O threads.
    pub fn gate(&self) -> TokenGate {
        TokenGate {
            current: Arc::clone(&self.current),
        }
    }
}

/// Cheap, cloneable, read-only handle on the current token.
#[derive(Clone, Debug)]
pub struct TokenGate {
    current: Arc<AtomicU64>,
}

impl TokenGate {
    pub fn current(&self) -> LoadToken {
        LoadToken(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token != LoadToken::NONE && self.current() == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_increase() {
        let source = LoadTokenSource::new();
        let a = source.mint();
        let b = source.mint();
        assert!(b > a);
        assert!(!source.is_current(a));
        assert!(source.is_current(b));
    }

    #[test]
    fn gate_tracks_source() {
        let source = LoadTokenSource::new();
        let gate = source.gate();
        let a = source.mint();
        assert!(gate.is_current(a));
        source.invalidate();
        assert!(!gate.is_current(a));
    }

    #[test]
    fn none_is_never_current() {
        let source = LoadTokenSource::new();
        assert!(!source.is_current(LoadToken::NONE));
    }
}

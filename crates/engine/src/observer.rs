//! Engine-scoped observer registration.
//!
//! The engine calls its observer directly on the designated thread. There is
//! no global event bus: with no observer attached, state is still readable
//! through `PlaybackEngine::state()`.

use vl_common::{LoadToken, MediaTime, PlaybackState, TaggedError};

/// Out-of-band notifications that are not part of `PlaybackState`.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineNotice {
    /// A terminal error, surfaced once.
    Error(TaggedError),
    /// An accurate seek ran past its window; the playhead went back to
    /// `fallback`. The error is a `PlaybackError::SeekTimeout`.
    SeekTimedOut {
        error: TaggedError,
        fallback: MediaTime,
    },
    EndOfStream(LoadToken),
}

pub trait EngineObserver {
    fn state_changed(&mut self, state: &PlaybackState);

    fn notice(&mut self, _notice: &EngineNotice) {}
}

/// Observer over two closures.
pub struct FnObserver<S, N>
where
    S: FnMut(&PlaybackState),
    N: FnMut(&EngineNotice),
{
    on_state: S,
    on_notice: N,
}

impl<S, N> FnObserver<S, N>
where
    S: FnMut(&PlaybackState),
    N: FnMut(&EngineNotice),
{
    pub fn new(on_state: S, on_notice: N) -> Self {
        Self {
            on_state,
            on_notice,
        }
    }
}

impl<S, N> EngineObserver for FnObserver<S, N>
where
    S: FnMut(&PlaybackState),
    N: FnMut(&EngineNotice),
{
    fn state_changed(&mut self, state: &PlaybackState) {
        (self.on_state)(state)
    }

    fn notice(&mut self, notice: &EngineNotice) {
        (self.on_notice)(notice)
    }
}

//! `vl-engine`: The playback engine facade.
//!
//! Ties capability detection, backend selection, on-demand library
//! installation and seek bookkeeping into one state machine that publishes
//! a single `PlaybackState`.
//!
//! - **Engine**: [`PlaybackEngine`], the command surface and message pump
//! - **Selection**: [`BackendSelector`] and its [`Route`] decisions
//! - **Scrubbing**: [`ScrubController`] for drag-driven fast seeks
//! - **Observation**: [`EngineObserver`] and [`EngineNotice`]

pub mod engine;
pub mod observer;
pub mod scrub;
pub mod selector;

pub use engine::{PlaybackEngine, MAX_RATE, MIN_RATE};
pub use observer::{EngineNotice, EngineObserver, FnObserver};
pub use scrub::ScrubController;
pub use selector::{BackendSelector, Route};

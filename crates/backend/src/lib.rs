//! `vl-backend`: Playback backends and the capability detector.
//!
//! - **Capability**: [`probe`] / [`probe_async`] decide whether the system
//!   decoder can play a source, behind the pluggable [`CodecCapabilities`]
//! - **Contract**: [`PlaybackBackend`], [`BackendEvent`], [`BackendFactory`]
//! - **Seeking**: [`SeekTracker`] for fast/accurate seek bookkeeping
//! - **Primary**: [`PrimaryBackend`] over the host's [`SystemPlayer`]
//! - **Secondary**: [`SecondaryBackend`] over libmpv ([`PlayerCore`])
//! - **Surface**: [`RenderSurface`] supplied by the collaborator

pub mod capability;
pub mod error;
pub mod factory;
pub mod primary;
pub mod secondary;
pub mod seek;
pub mod surface;
pub mod traits;

pub use capability::{
    probe, probe_async, CodecCapabilities, DenyListCapabilities, ProbeOutcome,
    REASON_COMPATIBLE, REASON_PROBE_FAILED, REASON_REMOTE, REASON_UNRECOGNIZED_CODEC,
    REASON_UNRECOGNIZED_CONTAINER,
};
pub use error::CoreError;
pub use factory::{NativeBackendFactory, SystemPlayerFactory};
pub use primary::{
    CompositionRequest, CompositionResult, FilterCompositor, FrameCompositor, ItemInfo,
    ItemStatus, PrimaryBackend, SeekOutcome, SystemPlayer,
};
pub use secondary::{
    CoreEvent, CoreOpener, EndReason, MpvClient, PlayerCore, PropertyFormat, PropertyValue,
    SecondaryBackend,
};
pub use seek::{SeekCompletion, SeekDecision, SeekTicket, SeekTimedOut, SeekTracker};
pub use surface::{GlLoader, GlTarget, NullSurface, RenderSurface};
pub use traits::{
    BackendEvent, BackendFactory, EventSink, LoadContext, MediaInfo, PlaybackBackend,
};

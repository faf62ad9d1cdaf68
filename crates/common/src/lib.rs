//! `vl-common`: Shared types, frame/time model, errors, and configuration
//! for the Vellum playback core.
//!
//! This crate is the foundation that all other Vellum crates depend on:
//!
//! - **Types**: `FrameNumber`, `MediaTime`, `Rational`, `Resolution` (newtypes for safety)
//! - **Timing**: `frame_for_time`, `time_for_frame`, `step_frame`, timecode formatting
//! - **Codec**: `VideoCodec`, `ContainerFormat`
//! - **Filters**: `FilterDescriptor`, `FilterKind`, `ParamDef`, `ParamValue`
//! - **Load tokens**: `LoadToken`, `LoadTokenSource`, `TokenGate`
//! - **Seeking**: `SeekRequest`, `SeekFidelity`
//! - **State**: `PlaybackState`, `EngineStage`, `BackendKind`, install progress
//! - **Errors**: `PlaybackError`, `TaggedError`, `DemuxError` (thiserror-based)
//! - **Config**: `EngineConfig` and its sections

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod install;
pub mod seek;
pub mod state;
pub mod timing;
pub mod token;
pub mod types;

// Re-export commonly used items at crate root
pub use codec::{ContainerFormat, VideoCodec};
pub use config::{
    CapabilityConfig, ConfigError, EngineConfig, InstallerConfig, ScrubConfig, SeekConfig,
};
pub use error::{DemuxError, PlaybackError, PlaybackResult, TaggedError};
pub use filter::{FilterCategory, FilterDescriptor, FilterKind, ParamDef, ParamType, ParamValue};
pub use install::{Architecture, InstallProgress, InstallStatus};
pub use seek::{SeekFidelity, SeekRequest};
pub use state::{BackendKind, EngineStage, PlaybackState};
pub use token::{LoadToken, LoadTokenSource, TokenGate};
pub use types::{FrameNumber, MediaTime, Rational, Resolution, DEFAULT_TIMESCALE};

//! The contract both playback backends implement.
//!
//! The engine talks to a `Box<dyn PlaybackBackend>` and never to a concrete
//! backend; only the selector decides which one to build. Backends report
//! asynchronous results through the [`EventSink`] handed to them at load
//! time, from whatever thread the result appears on.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use vl_common::{
    BackendKind, FilterDescriptor, LoadToken, MediaTime, PlaybackResult, Rational, Resolution,
    SeekRequest, TokenGate,
};
use vl_effects::{FilterChain, RgbaImage};

use crate::seek::SeekTicket;
use crate::surface::RenderSurface;

/// Metadata reported once the item is ready.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration: MediaTime,
    pub frame_rate: Rational,
    pub natural_size: Resolution,
    pub has_audio: bool,
}

/// Asynchronous backend report.
#[derive(Clone, Debug)]
pub enum BackendEvent {
    /// Item reached the ready state. Nothing is loaded before this.
    Ready(MediaInfo),
    /// Item failed before becoming ready.
    LoadFailed(String),
    /// Playback failed after the item was ready.
    DecodeFailed(String),
    TimeChanged(MediaTime),
    PlayingChanged(bool),
    SeekCompleted {
        ticket: SeekTicket,
        position: MediaTime,
    },
    /// A composited frame, ready to present.
    FrameRendered {
        frame: Arc<RgbaImage>,
        time: MediaTime,
    },
    /// The GPU renderer has a new frame; call `render` on the designated thread.
    RenderRequested,
    EndOfStream,
}

/// Cloneable callback for backend events. Safe to call from any thread.
#[derive(Clone)]
pub struct EventSink {
    emit: Arc<dyn Fn(BackendEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new(emit: impl Fn(BackendEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    /// Sink that drops everything.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: BackendEvent) {
        (self.emit)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Everything a backend needs to tie its work to one load.
#[derive(Clone, Debug)]
pub struct LoadContext {
    pub token: LoadToken,
    /// Checked before publishing work that finished in the background.
    pub gate: TokenGate,
    pub events: EventSink,
    /// Shared descriptor list; renders take a snapshot.
    pub filters: FilterChain,
}

impl LoadContext {
    pub fn is_current(&self) -> bool {
        self.gate.is_current(self.token)
    }
}

pub trait PlaybackBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Start loading `url`. Returns once loading has begun; readiness or
    /// failure arrives as a [`BackendEvent`].
    fn load(
        &mut self,
        url: &str,
        ctx: LoadContext,
        surface: &mut dyn RenderSurface,
    ) -> PlaybackResult<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Issue a seek tagged with `ticket`. Completion is reported as
    /// `BackendEvent::SeekCompleted` with the same ticket.
    fn seek(&mut self, request: SeekRequest, ticket: SeekTicket);

    fn cancel_pending_seeks(&mut self);

    fn current_time(&self) -> MediaTime;

    /// The shared filter list changed.
    fn filters_changed(&mut self, filters: &[FilterDescriptor]);

    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);

    fn set_rate(&mut self, rate: f32);

    /// Draw the latest frame into the surface. Designated thread only.
    fn render(&mut self, surface: &mut dyn RenderSurface) -> PlaybackResult<()>;

    /// Stop and release everything tied to the current item.
    fn close(&mut self);
}

/// Builds backends on demand.
pub trait BackendFactory {
    fn primary(&self) -> PlaybackResult<Box<dyn PlaybackBackend>>;

    /// Secondary backend over the installed library at `library`.
    fn secondary(&self, library: &Path) -> PlaybackResult<Box<dyn PlaybackBackend>>;
}

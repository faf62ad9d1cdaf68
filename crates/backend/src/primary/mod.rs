//! Primary backend: the platform media decoder.
//!
//! # Module Structure
//!
//! - [`system`]: The [`SystemPlayer`] seam the host implements.
//! - [`compositor`]: Per-frame filter composition on decoder threads.
//!
//! Readiness comes from the item status callback; nothing is reported as
//! loaded before `ReadyToPlay`. Fast seeks use the configured tolerance on
//! both sides, accurate seeks use zero tolerance.

pub mod compositor;
pub mod system;

pub use compositor::{CompositionRequest, CompositionResult, FilterCompositor, FrameCompositor};
pub use system::{ItemInfo, ItemStatus, SeekOutcome, SystemPlayer};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vl_common::{
    BackendKind, FilterDescriptor, MediaTime, PlaybackError, PlaybackResult, Rational,
    SeekConfig, SeekFidelity, SeekRequest,
};
use vl_effects::FilterPipeline;

use crate::seek::SeekTicket;
use crate::surface::RenderSurface;
use crate::traits::{BackendEvent, LoadContext, MediaInfo, PlaybackBackend};

/// Position updates while playing.
const TIME_OBSERVER_INTERVAL: Duration = Duration::from_millis(50);

pub struct PrimaryBackend {
    player: Box<dyn SystemPlayer>,
    pipeline: FilterPipeline,
    fast_tolerance: MediaTime,
    ctx: Option<LoadContext>,
}

impl PrimaryBackend {
    pub fn new(player: Box<dyn SystemPlayer>, pipeline: FilterPipeline, seek: &SeekConfig) -> Self {
        Self {
            player,
            pipeline,
            fast_tolerance: MediaTime::from_secs(seek.fast_tolerance().as_secs_f64()),
            ctx: None,
        }
    }

    fn status_callback(ctx: LoadContext) -> system::StatusCallback {
        let ready = Arc::new(AtomicBool::new(false));
        Box::new(move |status| {
            if !ctx.is_current() {
                debug!(token = %ctx.token, "Ignoring item status for stale load");
                return;
            }
            match status {
                ItemStatus::ReadyToPlay(item) => {
                    if ready.swap(true, Ordering::AcqRel) {
                        return;
                    }
                    let frame_rate = Rational::from_fps_f64(item.nominal_frame_rate as f64);
                    info!(
                        token = %ctx.token,
                        duration = %item.duration,
                        fps = %frame_rate,
                        size = %item.natural_size,
                        "System decoder item ready"
                    );
                    ctx.events.emit(BackendEvent::Ready(MediaInfo {
                        duration: item.duration,
                        frame_rate,
                        natural_size: item.natural_size,
                        has_audio: item.has_audio,
                    }));
                }
                ItemStatus::Failed(reason) => {
                    if ready.load(Ordering::Acquire) {
                        warn!(token = %ctx.token, reason = %reason, "System decoder failed during playback");
                        ctx.events.emit(BackendEvent::DecodeFailed(reason));
                    } else {
                        warn!(token = %ctx.token, reason = %reason, "System decoder failed to load item");
                        ctx.events.emit(BackendEvent::LoadFailed(reason));
                    }
                }
            }
        })
    }
}

impl PlaybackBackend for PrimaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Primary
    }

    fn load(
        &mut self,
        url: &str,
        ctx: LoadContext,
        _surface: &mut dyn RenderSurface,
    ) -> PlaybackResult<()> {
        if self.ctx.is_some() {
            self.close();
        }
        info!(url = %url, token = %ctx.token, "Opening item in system decoder");

        self.player
            .open(url, Self::status_callback(ctx.clone()))
            .map_err(PlaybackError::DecodeFailure)?;

        let time_ctx = ctx.clone();
        self.player.observe_time(
            TIME_OBSERVER_INTERVAL,
            Box::new(move |time| {
                if time_ctx.is_current() {
                    time_ctx.events.emit(BackendEvent::TimeChanged(time));
                }
            }),
        );

        let compositor = FilterCompositor::new(self.pipeline.clone(), ctx.clone());
        self.player.set_compositor(Some(Arc::new(compositor)));
        self.ctx = Some(ctx);
        Ok(())
    }

    fn play(&mut self) {
        self.player.play();
        if let Some(ctx) = &self.ctx {
            ctx.events.emit(BackendEvent::PlayingChanged(true));
        }
    }

    fn pause(&mut self) {
        self.player.pause();
        if let Some(ctx) = &self.ctx {
            ctx.events.emit(BackendEvent::PlayingChanged(false));
        }
    }

    fn seek(&mut self, request: SeekRequest, ticket: SeekTicket) {
        let Some(ctx) = self.ctx.clone() else {
            return;
        };
        let tolerance = match request.fidelity {
            SeekFidelity::Fast => self.fast_tolerance,
            SeekFidelity::Accurate => MediaTime::ZERO,
        };
        debug!(
            target_time = %request.target,
            fidelity = ?request.fidelity,
            generation = ticket.generation,
            "System decoder seek"
        );
        self.player.seek(
            request.target,
            tolerance,
            tolerance,
            Box::new(move |outcome| {
                if outcome.finished && ctx.is_current() {
                    ctx.events.emit(BackendEvent::SeekCompleted {
                        ticket,
                        position: outcome.position,
                    });
                }
            }),
        );
    }

    fn cancel_pending_seeks(&mut self) {
        self.player.cancel_pending_seeks();
    }

    fn current_time(&self) -> MediaTime {
        self.player.current_time()
    }

    fn filters_changed(&mut self, filters: &[FilterDescriptor]) {
        // The compositor reads the shared chain on every frame.
        debug!(count = filters.len(), "Filters changed for system decoder");
    }

    fn set_volume(&mut self, volume: f32) {
        self.player.set_volume(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.player.set_muted(muted);
    }

    fn set_rate(&mut self, rate: f32) {
        self.player.set_rate(rate);
    }

    fn render(&mut self, _surface: &mut dyn RenderSurface) -> PlaybackResult<()> {
        // Frames arrive composited through `FrameRendered`.
        Ok(())
    }

    fn close(&mut self) {
        self.player.set_compositor(None);
        self.player.close();
        self.ctx = None;
    }
}

impl Drop for PrimaryBackend {
    fn drop(&mut self) {
        if self.ctx.is_some() {
            self.close();
        }
    }
}

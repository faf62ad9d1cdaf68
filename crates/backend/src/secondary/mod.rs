//! Secondary backend: libmpv, loaded at runtime from the installer's output.
//!
//! # Module Structure
//!
//! - [`ffi`]: Raw libmpv bindings (loaded via `libloading`).
//! - [`render`]: OpenGL render context.
//! - [`client`]: Safe [`MpvClient`] and the [`PlayerCore`] seam.
//!
//! # Threads
//!
//! A named event thread drains `mpv_wait_event` and turns events into
//! [`BackendEvent`]s. Metadata is read only after `file-loaded`. Rendering
//! happens in [`PlaybackBackend::render`] on the designated thread, prompted
//! by `RenderRequested` from mpv's update callback.

pub mod client;
pub mod ffi;
pub mod render;

pub use client::{
    CoreEvent, EndReason, MpvClient, PlayerCore, PropertyFormat, PropertyValue, DEFAULT_OPTIONS,
};
pub use ffi::MpvLibrary;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use vl_common::{
    BackendKind, FilterDescriptor, MediaTime, PlaybackError, PlaybackResult, Rational,
    Resolution, SeekFidelity, SeekRequest,
};
use vl_effects::FilterPipeline;

use crate::error::CoreError;
use crate::seek::SeekTicket;
use crate::surface::RenderSurface;
use crate::traits::{BackendEvent, LoadContext, MediaInfo, PlaybackBackend};

/// Creates a fresh player core for each load.
pub type CoreOpener = Box<dyn Fn() -> Result<Arc<dyn PlayerCore>, CoreError> + Send>;

const EVENT_WAIT_SECS: f64 = 0.25;

const OBSERVE_TIME_POS: u64 = 1;
const OBSERVE_PAUSE: u64 = 2;
const OBSERVE_DURATION: u64 = 3;

/// Restart window used before the frame rate is known.
const FALLBACK_FRAME_SECS: f64 = 1.0 / 24.0;

/// Most recent seek handed to mpv, with its target.
type LatestSeek = Arc<Mutex<Option<(SeekTicket, MediaTime)>>>;

pub struct SecondaryBackend {
    opener: CoreOpener,
    pipeline: FilterPipeline,
    core: Option<Arc<dyn PlayerCore>>,
    ctx: Option<LoadContext>,
    latest_seek: LatestSeek,
    running: Arc<AtomicBool>,
    events: Option<JoinHandle<()>>,
}

impl SecondaryBackend {
    pub fn new(opener: CoreOpener, pipeline: FilterPipeline) -> Self {
        Self {
            opener,
            pipeline,
            core: None,
            ctx: None,
            latest_seek: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            events: None,
        }
    }

    /// Backend over the libmpv at `library`. The library is loaded on `load`.
    pub fn with_library(library: PathBuf, pipeline: FilterPipeline) -> Self {
        let opener: CoreOpener = Box::new(move || {
            let client = MpvClient::open(&library)?;
            Ok(Arc::new(client) as Arc<dyn PlayerCore>)
        });
        Self::new(opener, pipeline)
    }

    fn core_call(&self, what: &str, f: impl FnOnce(&dyn PlayerCore) -> Result<(), CoreError>) {
        if let Some(core) = &self.core {
            if let Err(e) = f(core.as_ref()) {
                warn!(command = %what, error = %e, "libmpv command failed");
            }
        }
    }

    fn spawn_event_thread(&mut self, core: Arc<dyn PlayerCore>, ctx: LoadContext) -> PlaybackResult<()> {
        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let latest_seek = Arc::clone(&self.latest_seek);
        let handle = thread::Builder::new()
            .name(format!("vl-mpv-events-{}", ctx.token.0))
            .spawn(move || event_loop(core, ctx, running, latest_seek))
            .map_err(|e| PlaybackError::DecodeFailure(format!("event thread: {e}")))?;
        self.events = Some(handle);
        Ok(())
    }
}

fn read_media_info(core: &dyn PlayerCore) -> Result<MediaInfo, CoreError> {
    let duration = core.get_f64("duration")?;
    let fps = core
        .get_f64("container-fps")
        .ok()
        .filter(|fps| *fps > 0.0)
        .map_or_else(|| core.get_f64("estimated-vf-fps"), Ok)?;
    let width = core.get_i64("width")?;
    let height = core.get_i64("height")?;
    Ok(MediaInfo {
        duration: MediaTime::from_secs(duration),
        frame_rate: Rational::from_fps_f64(fps),
        natural_size: Resolution::new(width.max(0) as u32, height.max(0) as u32),
        has_audio: core.get_i64("aid").is_ok(),
    })
}

/// Whether a `playback-restart` landing at `position` belongs to the seek
/// `(ticket, target)`.
///
/// mpv does not say which seek a restart answers. Fast seeks snap to
/// keyframes, so any restart settles them. An accurate seek only settles once
/// playback restarts within one frame of its target; an earlier restart is
/// left over from a replaced or cancelled seek.
fn restart_settles(
    ticket: SeekTicket,
    target: MediaTime,
    position: MediaTime,
    fps: Rational,
) -> bool {
    match ticket.fidelity {
        SeekFidelity::Fast => true,
        SeekFidelity::Accurate => {
            let frame = if fps.is_valid() {
                1.0 / fps.as_f64()
            } else {
                FALLBACK_FRAME_SECS
            };
            position.distance_secs(target) < frame
        }
    }
}

fn event_loop(
    core: Arc<dyn PlayerCore>,
    ctx: LoadContext,
    running: Arc<AtomicBool>,
    latest_seek: LatestSeek,
) {
    let emit = |event: BackendEvent| {
        if ctx.is_current() {
            ctx.events.emit(event);
        }
    };
    let mut loaded = false;
    let mut frame_rate = Rational::INVALID;

    while running.load(Ordering::Acquire) {
        match core.wait_event(EVENT_WAIT_SECS) {
            CoreEvent::None | CoreEvent::Other(_) => {}
            CoreEvent::Shutdown => break,
            CoreEvent::FileLoaded => match read_media_info(core.as_ref()) {
                Ok(info) => {
                    loaded = true;
                    frame_rate = info.frame_rate;
                    info!(
                        token = %ctx.token,
                        duration = %info.duration,
                        fps = %info.frame_rate,
                        size = %info.natural_size,
                        "libmpv file loaded"
                    );
                    emit(BackendEvent::Ready(info));
                }
                Err(e) => {
                    warn!(token = %ctx.token, error = %e, "libmpv metadata unavailable");
                    emit(BackendEvent::LoadFailed(e.to_string()));
                }
            },
            CoreEvent::PropertyChanged { name, value } => match (name.as_str(), value) {
                ("time-pos", PropertyValue::Double(t)) => {
                    emit(BackendEvent::TimeChanged(MediaTime::from_secs(t)));
                }
                ("pause", PropertyValue::Flag(paused)) => emit(BackendEvent::PlayingChanged(!paused)),
                _ => {}
            },
            CoreEvent::PlaybackRestart => {
                let mut pending = latest_seek.lock();
                let Some((ticket, target)) = *pending else {
                    continue;
                };
                let position = core
                    .get_f64("time-pos")
                    .map(MediaTime::from_secs)
                    .unwrap_or(target);
                if restart_settles(ticket, target, position, frame_rate) {
                    pending.take();
                    drop(pending);
                    emit(BackendEvent::SeekCompleted { ticket, position });
                } else {
                    debug!(
                        generation = ticket.generation,
                        target_time = %target,
                        position = %position,
                        "Ignoring playback restart from a superseded seek"
                    );
                }
            }
            CoreEvent::EndFile { reason, error } => match reason {
                EndReason::Error => {
                    let reason = error.unwrap_or_else(|| "unknown error".into());
                    if loaded {
                        error!(token = %ctx.token, reason = %reason, "libmpv playback failed");
                        emit(BackendEvent::DecodeFailed(reason));
                    } else {
                        emit(BackendEvent::LoadFailed(reason));
                    }
                }
                EndReason::Eof => emit(BackendEvent::EndOfStream),
                EndReason::Stop | EndReason::Quit | EndReason::Other(_) => {}
            },
        }
    }
    debug!(token = %ctx.token, "libmpv event thread exiting");
}

impl PlaybackBackend for SecondaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Secondary
    }

    fn load(
        &mut self,
        url: &str,
        ctx: LoadContext,
        surface: &mut dyn RenderSurface,
    ) -> PlaybackResult<()> {
        if self.core.is_some() {
            self.close();
        }

        let core = (self.opener)().map_err(|e| {
            warn!(error = %e, "libmpv unavailable");
            PlaybackError::BackendUnavailable(e.to_string())
        })?;
        info!(url = %url, token = %ctx.token, "Opening item in libmpv");

        let setup = || -> Result<(), CoreError> {
            core.observe(OBSERVE_TIME_POS, "time-pos", PropertyFormat::Double)?;
            core.observe(OBSERVE_PAUSE, "pause", PropertyFormat::Flag)?;
            core.observe(OBSERVE_DURATION, "duration", PropertyFormat::Double)?;

            let vf = self.pipeline.mpv_vf(&ctx.filters.snapshot());
            if !vf.is_empty() {
                core.set_property("vf", &vf)?;
            }

            if let Some(loader) = surface.gl_loader() {
                let render_ctx = ctx.clone();
                core.attach_renderer(
                    loader,
                    Box::new(move || {
                        if render_ctx.is_current() {
                            render_ctx.events.emit(BackendEvent::RenderRequested);
                        }
                    }),
                )?;
            }

            core.command(&["loadfile", url, "replace"])
        };
        setup().map_err(|e| PlaybackError::DecodeFailure(e.to_string()))?;

        self.spawn_event_thread(Arc::clone(&core), ctx.clone())?;
        self.core = Some(core);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn play(&mut self) {
        self.core_call("play", |core| core.set_property("pause", "no"));
    }

    fn pause(&mut self) {
        self.core_call("pause", |core| core.set_property("pause", "yes"));
    }

    fn seek(&mut self, request: SeekRequest, ticket: SeekTicket) {
        let Some(core) = self.core.clone() else {
            return;
        };
        let flags = match request.fidelity {
            SeekFidelity::Accurate => "absolute+exact",
            SeekFidelity::Fast => "absolute+keyframes",
        };
        let target = format!("{:.6}", request.target.as_secs());
        debug!(target_time = %target, flags, generation = ticket.generation, "libmpv seek");

        *self.latest_seek.lock() = Some((ticket, request.target));
        if let Err(e) = core.command(&["seek", &target, flags]) {
            warn!(error = %e, "libmpv seek failed");
            self.latest_seek.lock().take();
        }
    }

    fn cancel_pending_seeks(&mut self) {
        // mpv replaces an outstanding seek with the next one; only forget it.
        self.latest_seek.lock().take();
    }

    fn current_time(&self) -> MediaTime {
        self.core
            .as_ref()
            .and_then(|core| core.get_f64("time-pos").ok())
            .map(MediaTime::from_secs)
            .unwrap_or(MediaTime::ZERO)
    }

    fn filters_changed(&mut self, filters: &[FilterDescriptor]) {
        let vf = self.pipeline.mpv_vf(filters);
        debug!(vf = %vf, "Filters changed for libmpv");
        self.core_call("vf", |core| core.set_property("vf", &vf));
    }

    fn set_volume(&mut self, volume: f32) {
        let value = format!("{:.1}", volume.clamp(0.0, 1.0) * 100.0);
        self.core_call("volume", |core| core.set_property("volume", &value));
    }

    fn set_muted(&mut self, muted: bool) {
        let value = if muted { "yes" } else { "no" };
        self.core_call("mute", |core| core.set_property("mute", value));
    }

    fn set_rate(&mut self, rate: f32) {
        let value = format!("{rate:.3}");
        self.core_call("speed", |core| core.set_property("speed", &value));
    }

    fn render(&mut self, surface: &mut dyn RenderSurface) -> PlaybackResult<()> {
        let Some(core) = &self.core else {
            return Ok(());
        };
        let Some(target) = surface.begin_gl_frame() else {
            return Ok(());
        };
        match core.render(target) {
            Ok(true) => {
                surface.frame_ready();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(PlaybackError::DecodeFailure(e.to_string())),
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(core) = &self.core {
            let _ = core.command(&["stop"]);
            core.wakeup();
        }
        if let Some(handle) = self.events.take() {
            if handle.join().is_err() {
                warn!("libmpv event thread panicked");
            }
        }
        self.latest_seek.lock().take();
        self.core = None;
        self.ctx = None;
    }
}

impl Drop for SecondaryBackend {
    fn drop(&mut self) {
        if self.core.is_some() {
            self.close();
        }
    }
}

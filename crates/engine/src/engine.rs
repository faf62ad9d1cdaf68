//! The playback engine: load state machine, command surface and state
//! publication.
//!
//! The engine lives on the collaborator's designated thread. Probing,
//! decoding, composition and installing run elsewhere and report back over
//! one channel; [`PlaybackEngine::pump`] drains it, so every `PlaybackState`
//! mutation, surface call and observer callback happens on this thread.
//!
//! Stage flow per load:
//!
//! ```text
//! Idle -> Probing -> Ready(primary)
//!                 -> Ready(secondary)
//!                 -> AcquiringSecondary -> Ready(secondary) | Failed
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use vl_backend::{
    probe, probe_async, BackendEvent, BackendFactory, CodecCapabilities, EventSink, LoadContext,
    MediaInfo, PlaybackBackend, ProbeOutcome, RenderSurface, SeekCompletion, SeekDecision,
    SeekTimedOut, SeekTracker,
};
use vl_common::{
    timing, Architecture, BackendKind, EngineConfig, EngineStage, FilterDescriptor,
    FrameNumber, InstallProgress, InstallStatus, LoadToken, LoadTokenSource, MediaTime,
    PlaybackError, PlaybackResult, PlaybackState, SeekFidelity, SeekRequest, TaggedError,
};
use vl_effects::FilterChain;
use vl_installer::LibraryInstaller;

use crate::observer::{EngineNotice, EngineObserver};
use crate::scrub::ScrubController;
use crate::selector::{BackendSelector, Route};

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 4.0;

/// Everything that reaches the designated thread from elsewhere.
enum EngineMessage {
    Probed {
        token: LoadToken,
        outcome: ProbeOutcome,
    },
    Backend {
        token: LoadToken,
        /// Which backend instance of this load sent it.
        serial: u64,
        event: BackendEvent,
    },
    Install(InstallProgress),
}

pub struct PlaybackEngine {
    selector: BackendSelector,
    capabilities: Arc<dyn CodecCapabilities>,
    surface: Box<dyn RenderSurface>,
    observer: Option<Box<dyn EngineObserver>>,
    tokens: LoadTokenSource,
    tx: Sender<EngineMessage>,
    rx: Receiver<EngineMessage>,
    state: PlaybackState,
    backend: Option<Box<dyn PlaybackBackend>>,
    backend_serial: u64,
    filters: FilterChain,
    seeks: SeekTracker,
    scrub: ScrubController,
    install_in_flight: bool,
    acquired_this_load: bool,
    stale_discarded: u64,
}

impl PlaybackEngine {
    pub fn new(
        config: EngineConfig,
        factory: Box<dyn BackendFactory>,
        installer: Arc<dyn LibraryInstaller>,
        capabilities: Arc<dyn CodecCapabilities>,
        surface: Box<dyn RenderSurface>,
    ) -> Self {
        Self::with_architecture(
            config,
            factory,
            installer,
            capabilities,
            surface,
            Architecture::current(),
        )
    }

    /// Engine for an explicit secondary-library architecture. `None` means
    /// the host has no secondary decoder.
    pub fn with_architecture(
        config: EngineConfig,
        factory: Box<dyn BackendFactory>,
        installer: Arc<dyn LibraryInstaller>,
        capabilities: Arc<dyn CodecCapabilities>,
        surface: Box<dyn RenderSurface>,
        architecture: Option<Architecture>,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            selector: BackendSelector::new(factory, installer, architecture),
            capabilities,
            surface,
            observer: None,
            tokens: LoadTokenSource::new(),
            tx,
            rx,
            state: PlaybackState::new(),
            backend: None,
            backend_serial: 0,
            filters: FilterChain::new(),
            seeks: SeekTracker::new(config.seek.accurate_timeout()),
            scrub: ScrubController::new(config.scrub),
            install_in_flight: false,
            acquired_this_load: false,
            stale_discarded: 0,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn EngineObserver>) {
        if self.observer.is_some() {
            debug!("Engine observer replaced");
        }
        self.observer = Some(observer);
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn current_token(&self) -> LoadToken {
        self.tokens.current()
    }

    pub fn filters(&self) -> Arc<Vec<FilterDescriptor>> {
        self.filters.snapshot()
    }

    /// Results dropped because their load had been superseded.
    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Start loading `url`. Always supersedes the previous load.
    pub fn load(&mut self, url: &str) -> PlaybackResult<LoadToken> {
        if url.trim().is_empty() {
            return Err(PlaybackError::InvalidArgument("empty url".into()));
        }
        let token = self.tokens.mint();
        info!(url = %url, token = %token, "Load started");

        self.teardown_backend();
        self.seeks.reset(MediaTime::ZERO);
        self.scrub.cancel();
        self.acquired_this_load = false;
        self.state.begin_load(url);
        self.publish();

        let tx = self.tx.clone();
        let spawned = probe_async(
            url,
            token,
            Arc::clone(&self.capabilities),
            move |token, outcome| {
                let _ = tx.send(EngineMessage::Probed { token, outcome });
            },
        );
        if let Err(e) = spawned {
            warn!(error = %e, "Could not start probe thread, probing inline");
            let outcome = probe(url, self.capabilities.as_ref());
            self.on_probed(token, outcome);
        }
        Ok(token)
    }

    pub fn play(&mut self) -> PlaybackResult<()> {
        self.require_loaded()?;
        if self.scrub.is_active() {
            self.scrub_end()?;
        }
        self.backend_mut()?.play();
        self.set_playing(true);
        Ok(())
    }

    pub fn pause(&mut self) -> PlaybackResult<()> {
        self.require_loaded()?;
        self.backend_mut()?.pause();
        self.set_playing(false);
        Ok(())
    }

    pub fn seek(&mut self, seconds: f64, fidelity: SeekFidelity) -> PlaybackResult<()> {
        self.require_loaded()?;
        if !seconds.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "seek target {seconds} is not a number"
            )));
        }
        let target = self.clamp_to_source(MediaTime::from_secs(seconds.max(0.0)));
        self.issue_seek(SeekRequest { target, fidelity })
    }

    /// Pause, then seek `delta` frames from the current frame. The target is
    /// clamped to the source. Returns the target frame.
    pub fn step_frame(&mut self, delta: i64, accurate: bool) -> PlaybackResult<FrameNumber> {
        self.require_loaded()?;
        if self.state.is_playing {
            self.pause()?;
        }
        let target = timing::step_frame(self.state.current_frame, delta, self.state.total_frames);
        let time = timing::time_for_frame(target, self.state.frame_rate);
        let request = if accurate {
            SeekRequest::accurate(time)
        } else {
            SeekRequest::fast(time)
        };
        debug!(delta, frame = %target, "Step frame");
        self.issue_seek(request)?;
        Ok(target)
    }

    /// Replace the filter list. Renders already running keep their snapshot.
    pub fn set_filters(&mut self, descriptors: Vec<FilterDescriptor>) -> PlaybackResult<()> {
        self.reject_while_acquiring()?;
        debug!(count = descriptors.len(), "Filters replaced");
        self.filters.replace(descriptors);
        let snapshot = self.filters.snapshot();
        if let Some(backend) = self.backend.as_mut() {
            backend.filters_changed(&snapshot);
        }
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> PlaybackResult<()> {
        self.reject_while_acquiring()?;
        if !volume.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "volume {volume} is not a number"
            )));
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_volume(volume);
        }
        self.publish();
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) -> PlaybackResult<()> {
        self.reject_while_acquiring()?;
        self.state.is_muted = muted;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_muted(muted);
        }
        self.publish();
        Ok(())
    }

    /// Playback rate, clamped to `0.1..=4.0`.
    pub fn set_rate(&mut self, rate: f32) -> PlaybackResult<()> {
        self.reject_while_acquiring()?;
        if !rate.is_finite() {
            return Err(PlaybackError::InvalidArgument(format!(
                "rate {rate} is not a number"
            )));
        }
        let rate = rate.clamp(MIN_RATE, MAX_RATE);
        self.state.rate = rate;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_rate(rate);
        }
        self.publish();
        Ok(())
    }

    /// Abort the running install. The load then fails with
    /// `InstallFailed("cancelled")`. A no-op when nothing is installing.
    pub fn cancel_install(&mut self) -> PlaybackResult<()> {
        if self.state.stage != EngineStage::AcquiringSecondary || !self.install_in_flight {
            return Ok(());
        }
        if let Some(arch) = self.selector.architecture() {
            self.selector.cancel_install(arch);
        }
        Ok(())
    }

    /// Re-run the install for the current source after `InstallFailed`.
    pub fn retry_install(&mut self) -> PlaybackResult<()> {
        let install_failed = self.state.stage == EngineStage::Failed
            && matches!(self.state.last_error, Some(PlaybackError::InstallFailed(_)));
        if !install_failed {
            return Err(PlaybackError::NotReady);
        }
        let Some(arch) = self.selector.architecture() else {
            return Err(PlaybackError::NotReady);
        };
        info!(token = %self.tokens.current(), "Retrying install");
        self.state.last_error = None;
        self.begin_acquire(arch);
        Ok(())
    }

    pub fn scrub_begin(&mut self) -> PlaybackResult<()> {
        self.require_loaded()?;
        if self.state.is_playing {
            self.pause()?;
        }
        self.scrub.begin(self.state.current_time);
        Ok(())
    }

    /// Move the scrub playhead by `points` drag points.
    pub fn scrub_by(&mut self, points: f64) -> PlaybackResult<()> {
        self.require_loaded()?;
        if !self.scrub.is_active() {
            return Err(PlaybackError::InvalidArgument("no scrub in progress".into()));
        }
        match self.scrub.drag(points, self.state.duration, Instant::now()) {
            Some(target) => self.issue_seek(SeekRequest::fast(target)),
            None => {
                self.state.set_position(self.scrub.target());
                self.publish();
                Ok(())
            }
        }
    }

    /// Finish the drag with one accurate seek to where it ended.
    pub fn scrub_end(&mut self) -> PlaybackResult<()> {
        match self.scrub.end() {
            Some(target) => self.issue_seek(SeekRequest::accurate(target)),
            None => Ok(()),
        }
    }

    /// Unload and return to `Idle`. A running install keeps going.
    pub fn close(&mut self) {
        let token = self.tokens.invalidate();
        info!(token = %token, "Engine closed");
        self.teardown_backend();
        self.seeks.reset(MediaTime::ZERO);
        self.scrub.cancel();
        self.acquired_this_load = false;
        self.state.reset_to_idle();
        self.publish();
    }

    // ─── Pumping ────────────────────────────────────────────────────

    /// Handle everything queued so far without blocking. Returns the number
    /// of messages handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        self.tick(Instant::now());
        handled
    }

    /// Wait up to `timeout` for the first message, then drain the rest.
    /// Returns early for a seek deadline or a scrub flush.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let wake = [Some(deadline), self.seeks.deadline(), self.scrub.next_flush()]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(deadline);
        let mut handled = 0;
        if let Ok(message) = self.rx.recv_deadline(wake) {
            self.dispatch(message);
            handled += 1;
        }
        handled + self.pump()
    }

    fn dispatch(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Probed { token, outcome } => self.on_probed(token, outcome),
            EngineMessage::Backend {
                token,
                serial,
                event,
            } => self.on_backend_event(token, serial, event),
            EngineMessage::Install(progress) => self.on_install_progress(progress),
        }
    }

    fn tick(&mut self, now: Instant) {
        if let Some(timed_out) = self.seeks.check_timeout(now) {
            self.on_seek_timeout(timed_out);
        }
        if let Some(target) = self.scrub.poll(now) {
            if let Err(e) = self.issue_seek(SeekRequest::fast(target)) {
                debug!(error = %e, "Coalesced scrub seek not issued");
            }
        }
    }

    // ─── Load state machine ─────────────────────────────────────────

    fn on_probed(&mut self, token: LoadToken, outcome: ProbeOutcome) {
        if !self.tokens.is_current(token) {
            self.discard("probe", token);
            return;
        }
        if self.state.stage != EngineStage::Probing {
            return;
        }
        if outcome.is_probe_failure() {
            warn!(token = %token, "Probe could not read the source, trying the secondary backend");
        }
        let route = self.selector.after_probe(&outcome);
        self.follow(token, route);
    }

    fn follow(&mut self, token: LoadToken, route: Route) {
        match route {
            Route::Primary | Route::Secondary(_) => self.start_backend(token, &route),
            Route::Acquire(arch) => self.begin_acquire(arch),
            Route::Fail(error) => self.fail_load(token, error),
        }
    }

    fn start_backend(&mut self, token: LoadToken, route: &Route) {
        let kind = match route {
            Route::Primary => BackendKind::Primary,
            _ => BackendKind::Secondary,
        };
        let mut backend = match self.selector.build(route) {
            Ok(backend) => backend,
            Err(e) => return self.on_load_failure(token, kind, e),
        };

        self.backend_serial += 1;
        let ctx = LoadContext {
            token,
            gate: self.tokens.gate(),
            events: self.event_sink(token, self.backend_serial),
            filters: self.filters.clone(),
        };
        let url = self.state.url.clone().unwrap_or_default();
        self.state.stage = EngineStage::Ready(kind);
        self.state.backend_kind = Some(kind);
        self.state.install_progress = None;
        info!(token = %token, backend = kind.as_str(), "Backend selected");

        match backend.load(&url, ctx, self.surface.as_mut()) {
            Ok(()) => {
                backend.set_volume(self.state.volume);
                backend.set_muted(self.state.is_muted);
                backend.set_rate(self.state.rate);
                self.backend = Some(backend);
                self.publish();
            }
            Err(e) => {
                backend.close();
                self.on_load_failure(token, kind, e);
            }
        }
    }

    fn on_load_failure(&mut self, token: LoadToken, kind: BackendKind, error: PlaybackError) {
        warn!(token = %token, backend = kind.as_str(), error = %error, "Backend failed before ready");
        self.teardown_backend();
        let route = self
            .selector
            .after_failure(kind, &error, self.acquired_this_load);
        self.follow(token, route);
    }

    fn begin_acquire(&mut self, arch: Architecture) {
        self.acquired_this_load = true;
        self.state.stage = EngineStage::AcquiringSecondary;
        self.state.backend_kind = None;
        self.state.install_progress = Some(0.0);
        self.publish();

        if self.install_in_flight {
            debug!(arch = %arch, "Joining install already in flight");
            return;
        }
        info!(arch = %arch, "Acquiring secondary decoder library");
        self.install_in_flight = true;
        let tx = self.tx.clone();
        self.selector.start_install(
            arch,
            Arc::new(move |progress| {
                let _ = tx.send(EngineMessage::Install(progress));
            }),
        );
    }

    fn on_install_progress(&mut self, progress: InstallProgress) {
        let terminal = progress.status.is_terminal();
        if terminal {
            self.install_in_flight = false;
        }
        if self.state.stage != EngineStage::AcquiringSecondary {
            if terminal {
                info!(
                    arch = %progress.architecture,
                    status = ?progress.status,
                    "Install finished with no load waiting on it"
                );
            }
            return;
        }

        let token = self.tokens.current();
        match progress.status {
            InstallStatus::Installed => {
                let route = self.selector.after_install(progress.architecture);
                self.follow(token, route);
            }
            InstallStatus::Failed(reason) => {
                self.fail_load(token, PlaybackError::InstallFailed(reason));
            }
            _ => {
                self.state.install_progress = Some(progress.fraction);
                self.publish();
            }
        }
    }

    fn fail_load(&mut self, token: LoadToken, error: PlaybackError) {
        error!(token = %token, error = %error, "Load failed");
        self.teardown_backend();
        self.seeks.reset(MediaTime::ZERO);
        self.scrub.cancel();
        self.state.mark_failed(error.clone());
        self.publish();
        self.notify(EngineNotice::Error(TaggedError::new(token, error)));
    }

    /// Mid-playback failure: back to `Idle` with the error recorded.
    fn decode_failure(&mut self, token: LoadToken, reason: String) {
        let error = PlaybackError::DecodeFailure(reason);
        error!(token = %token, error = %error, "Playback failed");
        self.teardown_backend();
        self.seeks.reset(MediaTime::ZERO);
        self.scrub.cancel();
        self.state.reset_to_idle();
        self.state.last_error = Some(error.clone());
        self.publish();
        self.notify(EngineNotice::Error(TaggedError::new(token, error)));
    }

    // ─── Backend events ─────────────────────────────────────────────

    fn on_backend_event(&mut self, token: LoadToken, serial: u64, event: BackendEvent) {
        if !self.tokens.is_current(token) || serial != self.backend_serial || self.backend.is_none()
        {
            self.discard("backend event", token);
            return;
        }

        match event {
            BackendEvent::Ready(info) => self.on_ready(token, info),
            BackendEvent::LoadFailed(reason) | BackendEvent::DecodeFailed(reason) => {
                if self.state.is_loaded {
                    self.decode_failure(token, reason);
                } else {
                    let kind = self.backend_kind();
                    self.on_load_failure(token, kind, PlaybackError::UnsupportedFormat(reason));
                }
            }
            BackendEvent::TimeChanged(time) => {
                if !self.state.is_loaded || self.seeks.is_seeking() || self.scrub.is_active() {
                    return;
                }
                self.seeks.note_position(time);
                self.state.set_position(time);
                self.publish();
            }
            BackendEvent::PlayingChanged(playing) => self.set_playing(playing),
            BackendEvent::SeekCompleted { ticket, position } => {
                match self.seeks.complete(ticket, position) {
                    SeekCompletion::Applied(position) => {
                        debug!(position = %position, fidelity = ?ticket.fidelity, "Seek applied");
                        self.state.set_position(position);
                        self.state.is_seeking = self.seeks.is_seeking();
                        self.publish();
                    }
                    SeekCompletion::Stale => {
                        debug!(fidelity = ?ticket.fidelity, "Superseded seek result dropped");
                    }
                }
            }
            BackendEvent::FrameRendered { frame, time } => {
                self.surface.present(&frame, time);
                self.surface.frame_ready();
            }
            BackendEvent::RenderRequested => {
                if let Some(backend) = self.backend.as_mut() {
                    if let Err(e) = backend.render(self.surface.as_mut()) {
                        warn!(error = %e, "Render failed");
                    }
                }
            }
            BackendEvent::EndOfStream => {
                self.state.is_playing = false;
                self.state.set_position(self.state.duration);
                self.publish();
                self.notify(EngineNotice::EndOfStream(token));
            }
        }
    }

    fn on_ready(&mut self, token: LoadToken, info: MediaInfo) {
        if self.state.is_loaded {
            return;
        }
        let kind = self.backend_kind();
        self.state
            .apply_metadata(info.duration, info.frame_rate, info.natural_size);
        self.state.mark_loaded(kind);
        self.seeks.reset(self.state.current_time);
        info!(
            token = %token,
            backend = kind.as_str(),
            duration = %info.duration,
            fps = %info.frame_rate,
            size = %info.natural_size,
            frames = self.state.total_frames,
            "Source ready"
        );
        self.publish();
    }

    fn on_seek_timeout(&mut self, timed_out: SeekTimedOut) {
        if let Some(backend) = self.backend.as_mut() {
            backend.cancel_pending_seeks();
        }
        self.state.is_seeking = false;
        self.state.set_position(timed_out.fallback);
        self.publish();
        let error = PlaybackError::SeekTimeout {
            target: timed_out.target,
            timeout_ms: timed_out.timeout.as_millis() as u64,
        };
        let token = self.tokens.current();
        self.notify(EngineNotice::SeekTimedOut {
            error: TaggedError::new(token, error),
            fallback: timed_out.fallback,
        });
    }

    // ─── Helpers ────────────────────────────────────────────────────

    fn issue_seek(&mut self, request: SeekRequest) -> PlaybackResult<()> {
        let SeekDecision::Issue {
            ticket,
            cancel_in_flight,
        } = self.seeks.request(request, Instant::now())
        else {
            return Ok(());
        };
        let backend = self.backend_mut()?;
        if cancel_in_flight {
            backend.cancel_pending_seeks();
        }
        backend.seek(request, ticket);
        self.state.set_position(request.target);
        self.state.is_seeking = self.seeks.is_seeking();
        self.publish();
        Ok(())
    }

    fn event_sink(&self, token: LoadToken, serial: u64) -> EventSink {
        let tx = self.tx.clone();
        EventSink::new(move |event| {
            let _ = tx.send(EngineMessage::Backend {
                token,
                serial,
                event,
            });
        })
    }

    fn backend_mut(&mut self) -> PlaybackResult<&mut Box<dyn PlaybackBackend>> {
        self.backend.as_mut().ok_or(PlaybackError::NotReady)
    }

    fn backend_kind(&self) -> BackendKind {
        self.backend
            .as_ref()
            .map(|b| b.kind())
            .unwrap_or(BackendKind::Primary)
    }

    fn require_loaded(&self) -> PlaybackResult<()> {
        if self.state.is_loaded && self.backend.is_some() {
            Ok(())
        } else {
            Err(PlaybackError::NotReady)
        }
    }

    fn reject_while_acquiring(&self) -> PlaybackResult<()> {
        if self.state.stage == EngineStage::AcquiringSecondary {
            Err(PlaybackError::NotReady)
        } else {
            Ok(())
        }
    }

    fn clamp_to_source(&self, time: MediaTime) -> MediaTime {
        if self.state.duration.is_valid() && self.state.duration > MediaTime::ZERO {
            time.clamp_to(MediaTime::ZERO, self.state.duration)
        } else {
            time.clamp_to(MediaTime::ZERO, MediaTime::INVALID)
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.state.is_playing != playing {
            self.state.is_playing = playing;
            self.publish();
        }
    }

    fn teardown_backend(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            debug!(backend = backend.kind().as_str(), "Closing backend");
            backend.close();
        }
    }

    fn discard(&mut self, what: &str, token: LoadToken) {
        self.stale_discarded += 1;
        debug!(
            token = %token,
            current = %self.tokens.current(),
            what,
            "Discarded stale result"
        );
    }

    fn publish(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.state_changed(&self.state);
        }
    }

    fn notify(&mut self, notice: EngineNotice) {
        if let Some(observer) = self.observer.as_mut() {
            observer.notice(&notice);
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.teardown_backend();
    }
}

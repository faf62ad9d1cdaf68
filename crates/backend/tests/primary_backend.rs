//! Primary backend driven through a scripted `SystemPlayer`.
//!
//! The fake records every call and hands the test the callbacks the backend
//! registered, so readiness, seek completion and composition can be fired
//! at will from the test thread.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use vl_backend::{
    BackendEvent, CompositionRequest, CompositionResult, EventSink, FrameCompositor, ItemInfo,
    ItemStatus, LoadContext, NullSurface, PlaybackBackend, PrimaryBackend, SeekOutcome,
    SeekTicket, SystemPlayer,
};
use vl_common::{
    FilterDescriptor, FilterKind, LoadTokenSource, MediaTime, Rational, Resolution, SeekConfig,
    SeekFidelity, SeekRequest,
};
use vl_effects::{FilterChain, FilterPipeline, RgbaImage};

// ---------------------------------------------------------------------------
// Fake system player
// ---------------------------------------------------------------------------

type Completion = Box<dyn FnOnce(SeekOutcome) + Send>;

struct PendingSeek {
    target: MediaTime,
    tolerance_before: MediaTime,
    tolerance_after: MediaTime,
    completion: Completion,
}

#[derive(Default)]
struct FakeState {
    opened: Vec<String>,
    status: Option<Box<dyn Fn(ItemStatus) + Send + Sync>>,
    time: Option<Box<dyn Fn(MediaTime) + Send + Sync>>,
    seeks: Vec<PendingSeek>,
    cancelled: usize,
    compositor: Option<Arc<dyn FrameCompositor>>,
    closed: usize,
    volume: f32,
}

#[derive(Clone, Default)]
struct FakePlayer {
    state: Arc<Mutex<FakeState>>,
}

impl FakePlayer {
    fn fire_status(&self, status: ItemStatus) {
        let state = self.state.lock();
        if let Some(cb) = &state.status {
            cb(status);
        }
    }

    fn fire_time(&self, time: MediaTime) {
        let state = self.state.lock();
        if let Some(cb) = &state.time {
            cb(time);
        }
    }

    fn take_seek(&self) -> PendingSeek {
        self.state.lock().seeks.remove(0)
    }

    fn compositor(&self) -> Option<Arc<dyn FrameCompositor>> {
        self.state.lock().compositor.clone()
    }
}

impl SystemPlayer for FakePlayer {
    fn open(&mut self, url: &str, on_status: Box<dyn Fn(ItemStatus) + Send + Sync>) -> Result<(), String> {
        if url.contains("unopenable") {
            return Err("cannot open".into());
        }
        let mut state = self.state.lock();
        state.opened.push(url.to_string());
        state.status = Some(on_status);
        Ok(())
    }

    fn observe_time(&mut self, _interval: Duration, on_time: Box<dyn Fn(MediaTime) + Send + Sync>) {
        self.state.lock().time = Some(on_time);
    }

    fn play(&mut self) {}

    fn pause(&mut self) {}

    fn set_rate(&mut self, _rate: f32) {}

    fn seek(
        &mut self,
        target: MediaTime,
        tolerance_before: MediaTime,
        tolerance_after: MediaTime,
        completion: Completion,
    ) {
        self.state.lock().seeks.push(PendingSeek {
            target,
            tolerance_before,
            tolerance_after,
            completion,
        });
    }

    fn cancel_pending_seeks(&mut self) {
        let mut state = self.state.lock();
        state.cancelled += 1;
        for seek in state.seeks.drain(..) {
            (seek.completion)(SeekOutcome {
                finished: false,
                position: seek.target,
            });
        }
    }

    fn current_time(&self) -> MediaTime {
        MediaTime::ZERO
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn set_muted(&mut self, _muted: bool) {}

    fn set_compositor(&mut self, compositor: Option<Arc<dyn FrameCompositor>>) {
        self.state.lock().compositor = compositor;
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.closed += 1;
        state.status = None;
        state.time = None;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    player: FakePlayer,
    backend: PrimaryBackend,
    tokens: LoadTokenSource,
    filters: FilterChain,
    events: Arc<Mutex<Vec<BackendEvent>>>,
}

impl Harness {
    fn new() -> Self {
        init_logging();
        let player = FakePlayer::default();
        let backend = PrimaryBackend::new(
            Box::new(player.clone()),
            FilterPipeline::with_builtins(),
            &SeekConfig::default(),
        );
        Self {
            player,
            backend,
            tokens: LoadTokenSource::new(),
            filters: FilterChain::new(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn load(&mut self, url: &str) -> vl_common::PlaybackResult<()> {
        let events = Arc::clone(&self.events);
        let ctx = LoadContext {
            token: self.tokens.mint(),
            gate: self.tokens.gate(),
            events: EventSink::new(move |e| events.lock().push(e)),
            filters: self.filters.clone(),
        };
        self.backend.load(url, ctx, &mut NullSurface::new())
    }

    fn drain(&self) -> Vec<BackendEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn ready_item() -> ItemStatus {
    ItemStatus::ReadyToPlay(ItemInfo {
        duration: MediaTime::from_secs(10.0),
        nominal_frame_rate: 29.97,
        natural_size: Resolution::new(1920, 1080),
        has_audio: true,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn not_ready_until_item_reports_ready() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mov").unwrap();
    assert!(h.drain().is_empty());

    h.player.fire_status(ready_item());
    let events = h.drain();
    assert_eq!(events.len(), 1);
    let BackendEvent::Ready(info) = &events[0] else {
        panic!("expected Ready, got {events:?}");
    };
    assert_eq!(info.frame_rate, Rational::FPS_29_97);
    assert_eq!(info.natural_size, Resolution::new(1920, 1080));

    // A second ready notification is not reported twice.
    h.player.fire_status(ready_item());
    assert!(h.drain().is_empty());
}

#[test]
fn failure_before_and_after_ready() {
    let mut h = Harness::new();
    h.load("file:///clips/broken.mov").unwrap();
    h.player.fire_status(ItemStatus::Failed("unreadable".into()));
    assert!(matches!(&h.drain()[..], [BackendEvent::LoadFailed(r)] if r == "unreadable"));

    h.load("file:///clips/ref.mov").unwrap();
    h.player.fire_status(ready_item());
    h.drain();
    h.player.fire_status(ItemStatus::Failed("decoder reset".into()));
    assert!(matches!(&h.drain()[..], [BackendEvent::DecodeFailed(_)]));
}

#[test]
fn open_error_is_returned() {
    let mut h = Harness::new();
    assert!(h.load("file:///clips/unopenable.mov").is_err());
}

#[test]
fn accurate_seek_is_zero_tolerance() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mov").unwrap();
    h.player.fire_status(ready_item());
    h.drain();

    let fast = SeekTicket {
        fidelity: SeekFidelity::Fast,
        generation: 1,
    };
    h.backend.seek(SeekRequest::fast(MediaTime::from_secs(2.0)), fast);
    let seek = h.player.take_seek();
    assert_eq!(seek.tolerance_before, MediaTime::from_secs(0.5));
    assert_eq!(seek.tolerance_after, MediaTime::from_secs(0.5));

    let accurate = SeekTicket {
        fidelity: SeekFidelity::Accurate,
        generation: 1,
    };
    h.backend
        .seek(SeekRequest::accurate(MediaTime::from_secs(4.0)), accurate);
    let seek = h.player.take_seek();
    assert_eq!(seek.tolerance_before, MediaTime::ZERO);
    assert_eq!(seek.tolerance_after, MediaTime::ZERO);

    (seek.completion)(SeekOutcome {
        finished: true,
        position: MediaTime::from_secs(4.0),
    });
    let events = h.drain();
    assert!(matches!(
        &events[..],
        [BackendEvent::SeekCompleted { ticket, position }]
            if *ticket == accurate && *position == MediaTime::from_secs(4.0)
    ));
}

#[test]
fn cancelled_seek_reports_nothing() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mov").unwrap();
    let ticket = SeekTicket {
        fidelity: SeekFidelity::Accurate,
        generation: 1,
    };
    h.backend
        .seek(SeekRequest::accurate(MediaTime::from_secs(1.0)), ticket);
    h.backend.cancel_pending_seeks();
    assert_eq!(h.player.state.lock().cancelled, 1);
    assert!(h.drain().is_empty());
}

#[test]
fn callbacks_from_superseded_load_are_ignored() {
    let mut h = Harness::new();
    h.load("file:///clips/a.mov").unwrap();
    // Grab A's callbacks before B replaces them.
    let stale_status = h.player.state.lock().status.take();
    h.load("file:///clips/b.mov").unwrap();

    if let Some(cb) = stale_status {
        cb(ready_item());
    }
    assert!(h.drain().is_empty());

    h.player.fire_time(MediaTime::from_secs(1.0));
    assert!(matches!(&h.drain()[..], [BackendEvent::TimeChanged(_)]));
}

#[test]
fn compositor_applies_current_filters() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mov").unwrap();
    let compositor = h.player.compositor().expect("compositor installed on load");

    let request = || CompositionRequest {
        source: Arc::new(RgbaImage::filled(4, 4, [10, 20, 30, 255])),
        presentation_time: MediaTime::from_secs(0.5),
    };

    let CompositionResult::Rendered(plain) = compositor.compose(request()) else {
        panic!("expected a frame");
    };
    assert_eq!(plain.pixel(0, 0), [10, 20, 30, 255]);

    h.filters
        .replace(vec![FilterDescriptor::new(FilterKind::Invert)]);
    let CompositionResult::Rendered(inverted) = compositor.compose(request()) else {
        panic!("expected a frame");
    };
    assert_eq!(inverted.pixel(0, 0), [245, 235, 225, 255]);

    let rendered = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, BackendEvent::FrameRendered { .. }))
        .count();
    assert_eq!(rendered, 2);
}

#[test]
fn close_removes_compositor() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mov").unwrap();
    h.backend.set_volume(0.4);
    assert_eq!(h.player.state.lock().volume, 0.4);

    h.backend.close();
    assert!(h.player.compositor().is_none());
    assert_eq!(h.player.state.lock().closed, 1);
}

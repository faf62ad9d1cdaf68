//! Secondary backend driven through a scripted `PlayerCore`.
//!
//! The fake core records commands and properties, serves canned property
//! values, and feeds events pushed by the test to the backend's event thread.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use vl_backend::{
    BackendEvent, CoreError, CoreEvent, CoreOpener, EndReason, EventSink, GlLoader, GlTarget,
    LoadContext, NullSurface, PlaybackBackend, PlayerCore, PropertyFormat, PropertyValue,
    SecondaryBackend, SeekTicket,
};
use vl_common::{
    FilterDescriptor, FilterKind, LoadTokenSource, MediaTime, PlaybackError, Rational, Resolution,
    SeekFidelity, SeekRequest,
};
use vl_effects::{FilterChain, FilterPipeline};

// ---------------------------------------------------------------------------
// Fake core
// ---------------------------------------------------------------------------

struct FakeCore {
    commands: Mutex<Vec<Vec<String>>>,
    properties: Mutex<HashMap<String, String>>,
    doubles: Mutex<HashMap<String, f64>>,
    ints: Mutex<HashMap<String, i64>>,
    events: Receiver<CoreEvent>,
}

impl FakeCore {
    fn new(events: Receiver<CoreEvent>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            properties: Mutex::new(HashMap::new()),
            doubles: Mutex::new(HashMap::new()),
            ints: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn unavailable(name: &str) -> CoreError {
        CoreError::Api {
            call: "mpv_get_property",
            code: -10,
            message: format!("property unavailable: {name}"),
        }
    }
}

impl PlayerCore for FakeCore {
    fn command(&self, args: &[&str]) -> Result<(), CoreError> {
        self.commands
            .lock()
            .push(args.iter().map(|s| s.to_string()).collect());
        Ok(())
    }

    fn set_property(&self, name: &str, value: &str) -> Result<(), CoreError> {
        self.properties
            .lock()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get_f64(&self, name: &str) -> Result<f64, CoreError> {
        self.doubles
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| Self::unavailable(name))
    }

    fn get_i64(&self, name: &str) -> Result<i64, CoreError> {
        self.ints
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| Self::unavailable(name))
    }

    fn observe(&self, _id: u64, _name: &str, _format: PropertyFormat) -> Result<(), CoreError> {
        Ok(())
    }

    fn wait_event(&self, timeout_secs: f64) -> CoreEvent {
        self.events
            .recv_timeout(Duration::from_secs_f64(timeout_secs))
            .unwrap_or(CoreEvent::None)
    }

    fn wakeup(&self) {}

    fn attach_renderer(
        &self,
        _loader: GlLoader,
        _on_update: Box<dyn Fn() + Send + Sync>,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn render(&self, _target: GlTarget) -> Result<bool, CoreError> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    core: Arc<FakeCore>,
    core_events: Sender<CoreEvent>,
    backend: SecondaryBackend,
    tokens: LoadTokenSource,
    filters: FilterChain,
    events: Receiver<BackendEvent>,
    sink: Sender<BackendEvent>,
}

impl Harness {
    fn new() -> Self {
        init_logging();
        let (core_events, core_rx) = channel::unbounded();
        let core = Arc::new(FakeCore::new(core_rx));
        let opener_core = Arc::clone(&core);
        let opener: CoreOpener = Box::new(move || Ok(Arc::clone(&opener_core) as Arc<dyn PlayerCore>));
        let (sink, events) = channel::unbounded();
        Self {
            core,
            core_events,
            backend: SecondaryBackend::new(opener, FilterPipeline::with_builtins()),
            tokens: LoadTokenSource::new(),
            filters: FilterChain::new(),
            events,
            sink,
        }
    }

    fn load(&mut self, url: &str) {
        let sink = self.sink.clone();
        let ctx = LoadContext {
            token: self.tokens.mint(),
            gate: self.tokens.gate(),
            events: EventSink::new(move |e| {
                let _ = sink.send(e);
            }),
            filters: self.filters.clone(),
        };
        self.backend
            .load(url, ctx, &mut NullSurface::new())
            .unwrap();
    }

    fn push(&self, event: CoreEvent) {
        self.core_events.send(event).unwrap();
    }

    fn next_event(&self) -> BackendEvent {
        self.events
            .recv_timeout(Duration::from_secs(5))
            .expect("backend event")
    }

    fn set_metadata(&self, fps_key: &str, fps: f64) {
        let mut doubles = self.core.doubles.lock();
        doubles.insert("duration".into(), 12.0);
        doubles.insert(fps_key.into(), fps);
        let mut ints = self.core.ints.lock();
        ints.insert("width".into(), 1280);
        ints.insert("height".into(), 720);
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn missing_library_is_backend_unavailable() {
    let path = std::env::temp_dir().join("vl_secondary_missing").join("libmpv.so");
    let mut backend = SecondaryBackend::with_library(path, FilterPipeline::with_builtins());
    let tokens = LoadTokenSource::new();
    let ctx = LoadContext {
        token: tokens.mint(),
        gate: tokens.gate(),
        events: EventSink::discard(),
        filters: FilterChain::new(),
    };
    let err = backend
        .load("file:///clips/ref.webm", ctx, &mut NullSurface::new())
        .unwrap_err();
    assert!(matches!(err, PlaybackError::BackendUnavailable(_)));
    assert!(err.is_fallback_eligible());
}

#[test]
fn metadata_is_read_after_file_loaded() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.webm");
    assert_eq!(
        h.core.commands.lock().last().cloned(),
        Some(vec![
            "loadfile".to_string(),
            "file:///clips/ref.webm".to_string(),
            "replace".to_string()
        ])
    );
    assert!(h.events.try_recv().is_err());

    h.set_metadata("container-fps", 23.976);
    h.push(CoreEvent::FileLoaded);
    let BackendEvent::Ready(info) = h.next_event() else {
        panic!("expected Ready");
    };
    assert_eq!(info.frame_rate, Rational::FPS_23_976);
    assert_eq!(info.duration, MediaTime::from_secs(12.0));
    assert_eq!(info.natural_size, Resolution::new(1280, 720));
    assert!(!info.has_audio);
    h.backend.close();
}

#[test]
fn fps_falls_back_to_estimate() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.mkv");
    h.set_metadata("estimated-vf-fps", 29.97);
    h.push(CoreEvent::FileLoaded);
    let BackendEvent::Ready(info) = h.next_event() else {
        panic!("expected Ready");
    };
    assert_eq!(info.frame_rate, Rational::FPS_29_97);
    h.backend.close();
}

#[test]
fn seek_commands_and_restart() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.webm");

    let fast = SeekTicket {
        fidelity: SeekFidelity::Fast,
        generation: 3,
    };
    h.backend
        .seek(SeekRequest::fast(MediaTime::from_secs(1.5)), fast);
    let accurate = SeekTicket {
        fidelity: SeekFidelity::Accurate,
        generation: 1,
    };
    h.backend
        .seek(SeekRequest::accurate(MediaTime::from_secs(2.25)), accurate);

    let commands = h.core.commands.lock().clone();
    let seeks: Vec<_> = commands.iter().filter(|c| c[0] == "seek").collect();
    assert_eq!(seeks[0], &vec!["seek", "1.500000", "absolute+keyframes"]);
    assert_eq!(seeks[1], &vec!["seek", "2.250000", "absolute+exact"]);

    h.core.doubles.lock().insert("time-pos".into(), 2.25);
    h.push(CoreEvent::PlaybackRestart);
    let BackendEvent::SeekCompleted { ticket, position } = h.next_event() else {
        panic!("expected SeekCompleted");
    };
    assert_eq!(ticket, accurate);
    assert_eq!(position, MediaTime::from_secs(2.25));
    h.backend.close();
}

#[test]
fn restart_from_cancelled_fast_seek_does_not_settle_accurate_seek() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.webm");
    h.set_metadata("container-fps", 30.0);
    h.push(CoreEvent::FileLoaded);
    assert!(matches!(h.next_event(), BackendEvent::Ready(_)));

    let fast = SeekTicket {
        fidelity: SeekFidelity::Fast,
        generation: 4,
    };
    h.backend
        .seek(SeekRequest::fast(MediaTime::from_secs(3.0)), fast);
    h.backend.cancel_pending_seeks();
    let accurate = SeekTicket {
        fidelity: SeekFidelity::Accurate,
        generation: 2,
    };
    h.backend
        .seek(SeekRequest::accurate(MediaTime::from_secs(8.0)), accurate);

    // mpv finishes the keyframe seek first.
    h.core.doubles.lock().insert("time-pos".into(), 3.0);
    h.push(CoreEvent::PlaybackRestart);
    // Marker event: anything emitted for the stale restart would arrive first.
    h.push(CoreEvent::PropertyChanged {
        name: "time-pos".into(),
        value: PropertyValue::Double(3.0),
    });
    assert!(matches!(h.next_event(), BackendEvent::TimeChanged(t) if t == MediaTime::from_secs(3.0)));

    h.core.doubles.lock().insert("time-pos".into(), 8.0);
    h.push(CoreEvent::PlaybackRestart);
    let BackendEvent::SeekCompleted { ticket, position } = h.next_event() else {
        panic!("expected SeekCompleted");
    };
    assert_eq!(ticket, accurate);
    assert_eq!(position, MediaTime::from_secs(8.0));
    h.backend.close();
}

#[test]
fn accurate_restart_within_a_frame_settles() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.webm");
    h.set_metadata("container-fps", 25.0);
    h.push(CoreEvent::FileLoaded);
    assert!(matches!(h.next_event(), BackendEvent::Ready(_)));

    let accurate = SeekTicket {
        fidelity: SeekFidelity::Accurate,
        generation: 7,
    };
    h.backend
        .seek(SeekRequest::accurate(MediaTime::from_secs(5.01)), accurate);
    h.core.doubles.lock().insert("time-pos".into(), 5.04);
    h.push(CoreEvent::PlaybackRestart);
    let BackendEvent::SeekCompleted { ticket, position } = h.next_event() else {
        panic!("expected SeekCompleted");
    };
    assert_eq!(ticket, accurate);
    assert_eq!(position, MediaTime::from_secs(5.04));

    // Nothing is left pending for a further restart.
    h.push(CoreEvent::PlaybackRestart);
    h.push(CoreEvent::PropertyChanged {
        name: "pause".into(),
        value: PropertyValue::Flag(true),
    });
    assert!(matches!(h.next_event(), BackendEvent::PlayingChanged(false)));
    h.backend.close();
}

#[test]
fn end_file_error_before_and_after_load() {
    let mut h = Harness::new();
    h.load("file:///clips/bad.webm");
    h.push(CoreEvent::EndFile {
        reason: EndReason::Error,
        error: Some("unrecognized file format".into()),
    });
    assert!(matches!(h.next_event(), BackendEvent::LoadFailed(r) if r == "unrecognized file format"));

    h.load("file:///clips/ref.webm");
    h.set_metadata("container-fps", 30.0);
    h.push(CoreEvent::FileLoaded);
    assert!(matches!(h.next_event(), BackendEvent::Ready(_)));
    h.push(CoreEvent::EndFile {
        reason: EndReason::Error,
        error: Some("hardware decoder lost".into()),
    });
    assert!(matches!(h.next_event(), BackendEvent::DecodeFailed(_)));
    h.backend.close();
}

#[test]
fn property_changes_become_events() {
    let mut h = Harness::new();
    h.load("file:///clips/ref.webm");
    h.push(CoreEvent::PropertyChanged {
        name: "pause".into(),
        value: PropertyValue::Flag(false),
    });
    assert!(matches!(h.next_event(), BackendEvent::PlayingChanged(true)));
    h.push(CoreEvent::PropertyChanged {
        name: "time-pos".into(),
        value: PropertyValue::Double(3.0),
    });
    assert!(matches!(h.next_event(), BackendEvent::TimeChanged(t) if t == MediaTime::from_secs(3.0)));
    h.backend.close();
}

#[test]
fn filters_map_to_vf_property() {
    let mut h = Harness::new();
    h.filters
        .replace(vec![FilterDescriptor::new(FilterKind::Invert)]);
    h.load("file:///clips/ref.webm");
    assert_eq!(
        h.core.properties.lock().get("vf").cloned(),
        Some("lavfi=[negate]".to_string())
    );

    h.backend.filters_changed(&[]);
    assert_eq!(h.core.properties.lock().get("vf").cloned(), Some(String::new()));

    h.backend.set_volume(0.5);
    assert_eq!(
        h.core.properties.lock().get("volume").cloned(),
        Some("50.0".to_string())
    );
    h.backend.close();
}

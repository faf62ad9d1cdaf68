//! Published playback state.
//!
//! `PlaybackState` is owned and mutated only by the engine on the designated
//! thread. Collaborators receive read-only snapshots through the observer.

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;
use crate::timing;
use crate::types::{FrameNumber, MediaTime, Rational, Resolution};

/// Which backend is driving playback.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// The system media decoder.
    Primary,
    /// The dynamically loaded libmpv decoder.
    Secondary,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Load state machine stage.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStage {
    #[default]
    Idle,
    Probing,
    /// Backend chosen and loading; becomes `is_loaded` once the item is ready.
    Ready(BackendKind),
    AcquiringSecondary,
    Failed,
}

impl EngineStage {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub stage: EngineStage,
    pub url: Option<String>,
    pub is_loaded: bool,
    pub is_playing: bool,
    /// An accurate seek is outstanding.
    pub is_seeking: bool,
    pub current_time: MediaTime,
    pub current_frame: FrameNumber,
    pub total_frames: u64,
    pub duration: MediaTime,
    pub frame_rate: Rational,
    pub natural_size: Resolution,
    /// 0.0..=1.0
    pub volume: f32,
    pub is_muted: bool,
    pub rate: f32,
    pub backend_kind: Option<BackendKind>,
    /// Present only while the secondary library is being acquired.
    pub install_progress: Option<f32>,
    pub last_error: Option<PlaybackError>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            stage: EngineStage::Idle,
            url: None,
            is_loaded: false,
            is_playing: false,
            is_seeking: false,
            current_time: MediaTime::ZERO,
            current_frame: FrameNumber::ZERO,
            total_frames: 0,
            duration: MediaTime::ZERO,
            frame_rate: Rational::INVALID,
            natural_size: Resolution::ZERO,
            volume: 1.0,
            is_muted: false,
            rate: 1.0,
            backend_kind: None,
            install_progress: None,
            last_error: None,
        }
    }

    /// Clear everything tied to the previous source. Audio settings survive.
    pub fn begin_load(&mut self, url: &str) {
        let (volume, is_muted, rate) = (self.volume, self.is_muted, self.rate);
        *self = Self::new();
        self.volume = volume;
        self.is_muted = is_muted;
        self.rate = rate;
        self.url = Some(url.to_string());
        self.stage = EngineStage::Probing;
    }

    /// Back to `Idle`, keeping audio settings.
    pub fn reset_to_idle(&mut self) {
        let (volume, is_muted, rate) = (self.volume, self.is_muted, self.rate);
        *self = Self::new();
        self.volume = volume;
        self.is_muted = is_muted;
        self.rate = rate;
    }

    pub fn apply_metadata(&mut self, duration: MediaTime, fps: Rational, size: Resolution) {
        self.duration = duration;
        self.frame_rate = fps;
        self.natural_size = size;
        self.total_frames = timing::total_frames(duration, fps);
        self.set_position(self.current_time);
    }

    /// Update the playhead; the frame is derived and clamped to the source.
    pub fn set_position(&mut self, time: MediaTime) {
        let time = if self.duration.is_valid() && self.duration > MediaTime::ZERO {
            time.clamp_to(MediaTime::ZERO, self.duration)
        } else {
            time.clamp_to(MediaTime::ZERO, MediaTime::INVALID)
        };
        self.current_time = time;
        self.current_frame = timing::clamp_frame(
            timing::frame_for_time(time, self.frame_rate),
            self.total_frames,
        );
    }

    pub fn mark_loaded(&mut self, kind: BackendKind) {
        self.stage = EngineStage::Ready(kind);
        self.backend_kind = Some(kind);
        self.is_loaded = true;
        self.install_progress = None;
        self.last_error = None;
    }

    /// Terminal failure. Never leaves `is_loaded` set alongside the error.
    pub fn mark_failed(&mut self, error: PlaybackError) {
        self.stage = EngineStage::Failed;
        self.is_loaded = false;
        self.is_playing = false;
        self.is_seeking = false;
        self.install_progress = None;
        self.last_error = Some(error);
    }

    pub fn current_time_seconds(&self) -> f64 {
        self.current_time.as_secs()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs()
    }

    pub fn frame_rate_f64(&self) -> f64 {
        self.frame_rate.as_f64()
    }

    pub fn timecode(&self) -> String {
        timing::timecode(self.current_time, self.frame_rate)
    }

    /// Check the published-state invariants.
    pub fn is_consistent(&self) -> bool {
        if self.is_loaded && self.last_error.is_some() {
            return false;
        }
        if self.is_loaded && self.total_frames > 0 && self.current_frame.0 >= self.total_frames {
            return false;
        }
        let derived = timing::frame_for_time(self.current_time, self.frame_rate);
        derived.0.abs_diff(self.current_frame.0) <= 1
    }
}

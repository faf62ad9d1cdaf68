//! Seam over the platform media decoder.
//!
//! The host implements [`SystemPlayer`] on top of whatever the OS provides.
//! Callbacks may fire on any thread.

use std::sync::Arc;
use std::time::Duration;

use vl_common::{MediaTime, Resolution};

use super::compositor::FrameCompositor;

/// What the decoder knows about an item once it is ready.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemInfo {
    pub duration: MediaTime,
    /// Nominal frame rate as the decoder reports it (e.g. 29.97).
    pub nominal_frame_rate: f32,
    pub natural_size: Resolution,
    pub has_audio: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemStatus {
    ReadyToPlay(ItemInfo),
    Failed(String),
}

/// Outcome of one seek. `finished == false` means it was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeekOutcome {
    pub finished: bool,
    pub position: MediaTime,
}

pub type StatusCallback = Box<dyn Fn(ItemStatus) + Send + Sync>;
pub type TimeCallback = Box<dyn Fn(MediaTime) + Send + Sync>;
pub type SeekCallback = Box<dyn FnOnce(SeekOutcome) + Send>;

pub trait SystemPlayer: Send {
    /// Open an item. Status changes are reported through `on_status`.
    fn open(&mut self, url: &str, on_status: StatusCallback) -> Result<(), String>;

    /// Periodic position updates while playing.
    fn observe_time(&mut self, interval: Duration, on_time: TimeCallback);

    fn play(&mut self);

    fn pause(&mut self);

    fn set_rate(&mut self, rate: f32);

    /// Seek with the given tolerances. Zero on both sides is frame-exact.
    fn seek(
        &mut self,
        target: MediaTime,
        tolerance_before: MediaTime,
        tolerance_after: MediaTime,
        completion: SeekCallback,
    );

    /// Cancel outstanding seeks; their completions report `finished == false`.
    fn cancel_pending_seeks(&mut self);

    fn current_time(&self) -> MediaTime;

    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);

    /// Install the per-frame composition hook, or remove it with `None`.
    fn set_compositor(&mut self, compositor: Option<Arc<dyn FrameCompositor>>);

    fn close(&mut self);
}

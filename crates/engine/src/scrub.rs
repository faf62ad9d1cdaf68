//! Scrub controller: drag deltas in, fast seeks out, one accurate settle.
//!
//! While a drag is active every delta moves a virtual playhead by
//! `seconds_per_point`. Fast seeks are rate-limited to one per
//! `min_interval`; deltas arriving faster are coalesced and the latest
//! target is flushed by [`ScrubController::poll`]. Ending the drag yields
//! the final target for a single accurate seek.

use std::time::Instant;

use tracing::debug;
use vl_common::{MediaTime, ScrubConfig};

#[derive(Debug)]
pub struct ScrubController {
    config: ScrubConfig,
    active: bool,
    target: MediaTime,
    last_issued: Option<(Instant, MediaTime)>,
    pending: Option<MediaTime>,
}

impl ScrubController {
    pub fn new(config: ScrubConfig) -> Self {
        Self {
            config,
            active: false,
            target: MediaTime::ZERO,
            last_issued: None,
            pending: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current virtual playhead.
    pub fn target(&self) -> MediaTime {
        self.target
    }

    /// Start a drag at `position`.
    pub fn begin(&mut self, position: MediaTime) {
        self.active = true;
        self.target = position;
        self.last_issued = None;
        self.pending = None;
        debug!(position = %position, "Scrub started");
    }

    /// Move by `points`. Returns a fast-seek target if one should go out now.
    pub fn drag(&mut self, points: f64, duration: MediaTime, now: Instant) -> Option<MediaTime> {
        if !self.active || !points.is_finite() {
            return None;
        }
        let secs = self.target.as_secs() + points * self.config.seconds_per_point;
        let mut target = MediaTime::from_secs(secs.max(0.0));
        if duration.is_valid() && duration > MediaTime::ZERO {
            target = target.clamp_to(MediaTime::ZERO, duration);
        }
        self.target = target;

        if let Some((at, _)) = self.last_issued {
            if now.duration_since(at) < self.config.min_interval() {
                self.pending = Some(target);
                return None;
            }
        }
        self.issue(target, now)
    }

    /// Flush a coalesced target once the interval has passed.
    pub fn poll(&mut self, now: Instant) -> Option<MediaTime> {
        if !self.active {
            return None;
        }
        let target = self.pending?;
        if let Some((at, _)) = self.last_issued {
            if now.duration_since(at) < self.config.min_interval() {
                return None;
            }
        }
        self.issue(target, now)
    }

    /// When the next coalesced target is due, if any.
    pub fn next_flush(&self) -> Option<Instant> {
        let (at, _) = self.last_issued?;
        self.pending.map(|_| at + self.config.min_interval())
    }

    fn issue(&mut self, target: MediaTime, now: Instant) -> Option<MediaTime> {
        self.pending = None;
        if matches!(self.last_issued, Some((_, last)) if last == target) {
            return None;
        }
        self.last_issued = Some((now, target));
        Some(target)
    }

    /// End the drag. Returns the settle target for the accurate seek.
    pub fn end(&mut self) -> Option<MediaTime> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.pending = None;
        self.last_issued = None;
        debug!(target_time = %self.target, "Scrub ended");
        Some(self.target)
    }

    /// Drop the drag without settling (new load, close).
    pub fn cancel(&mut self) {
        self.active = false;
        self.pending = None;
        self.last_issued = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> ScrubController {
        ScrubController::new(ScrubConfig {
            seconds_per_point: 0.1,
            min_interval_ms: 30,
        })
    }

    fn ten_secs() -> MediaTime {
        MediaTime::from_secs(10.0)
    }

    #[test]
    fn drag_issues_fast_target() {
        let mut scrub = controller();
        let t0 = Instant::now();
        scrub.begin(MediaTime::from_secs(1.0));
        assert_eq!(
            scrub.drag(10.0, ten_secs(), t0),
            Some(MediaTime::from_secs(2.0))
        );
    }

    #[test]
    fn rapid_drags_are_coalesced() {
        let mut scrub = controller();
        let t0 = Instant::now();
        scrub.begin(MediaTime::ZERO);
        assert!(scrub.drag(5.0, ten_secs(), t0).is_some());
        assert_eq!(scrub.drag(5.0, ten_secs(), t0 + Duration::from_millis(5)), None);
        assert_eq!(scrub.drag(5.0, ten_secs(), t0 + Duration::from_millis(10)), None);
        assert_eq!(scrub.poll(t0 + Duration::from_millis(20)), None);
        assert_eq!(
            scrub.next_flush(),
            Some(t0 + Duration::from_millis(30))
        );
        assert_eq!(
            scrub.poll(t0 + Duration::from_millis(31)),
            Some(MediaTime::from_secs(1.5))
        );
        assert_eq!(scrub.poll(t0 + Duration::from_millis(80)), None);
    }

    #[test]
    fn target_is_clamped_to_source() {
        let mut scrub = controller();
        let t0 = Instant::now();
        scrub.begin(MediaTime::from_secs(9.5));
        assert_eq!(scrub.drag(100.0, ten_secs(), t0), Some(ten_secs()));
        scrub.begin(MediaTime::from_secs(0.5));
        assert_eq!(scrub.drag(-100.0, ten_secs(), t0), Some(MediaTime::ZERO));
    }

    #[test]
    fn end_settles_on_latest_target() {
        let mut scrub = controller();
        let t0 = Instant::now();
        scrub.begin(MediaTime::ZERO);
        scrub.drag(10.0, ten_secs(), t0);
        scrub.drag(10.0, ten_secs(), t0 + Duration::from_millis(1));
        assert_eq!(scrub.end(), Some(MediaTime::from_secs(2.0)));
        assert!(!scrub.is_active());
        assert_eq!(scrub.end(), None);
        assert_eq!(scrub.drag(1.0, ten_secs(), t0), None);
    }
}

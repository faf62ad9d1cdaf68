//! Two-fidelity seek bookkeeping shared by both backends.
//!
//! The tracker runs on the designated thread. Backends tag every seek they
//! issue with a [`SeekTicket`] and report it back in
//! `BackendEvent::SeekCompleted`; the tracker decides whether that result
//! still counts.
//!
//! - A fast request supersedes an older fast request.
//! - A fast request arriving while an accurate seek is in flight is dropped.
//! - An accurate request supersedes everything in flight (cancel and restart).
//! - An accurate seek past its timeout is abandoned and the position falls
//!   back to the last known good time.

use std::time::{Duration, Instant};

use tracing::{debug, warn};
use vl_common::{MediaTime, SeekFidelity, SeekRequest};

/// Identity of one issued seek.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SeekTicket {
    pub fidelity: SeekFidelity,
    pub generation: u64,
}

/// What the caller should do with a new request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekDecision {
    /// Issue the seek. Cancel pending backend seeks first if asked to.
    Issue {
        ticket: SeekTicket,
        cancel_in_flight: bool,
    },
    /// An accurate seek owns the playhead; the fast request is ignored.
    Dropped,
}

/// Result of reporting a completion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekCompletion {
    Applied(MediaTime),
    Stale,
}

/// An accurate seek that ran out of time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SeekTimedOut {
    pub target: MediaTime,
    /// Position to publish instead.
    pub fallback: MediaTime,
    pub timeout: Duration,
}

#[derive(Copy, Clone, Debug)]
struct InFlight {
    ticket: SeekTicket,
    target: MediaTime,
    deadline: Instant,
}

#[derive(Debug)]
pub struct SeekTracker {
    fast_generation: u64,
    accurate_generation: u64,
    fast: Option<SeekTicket>,
    accurate: Option<InFlight>,
    last_known_good: MediaTime,
    timeout: Duration,
}

impl SeekTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            fast_generation: 0,
            accurate_generation: 0,
            fast: None,
            accurate: None,
            last_known_good: MediaTime::ZERO,
            timeout,
        }
    }

    pub fn request(&mut self, request: SeekRequest, now: Instant) -> SeekDecision {
        match request.fidelity {
            SeekFidelity::Fast => {
                if let Some(in_flight) = self.accurate {
                    debug!(
                        target_time = %request.target,
                        accurate_target = %in_flight.target,
                        "Fast seek dropped while accurate seek in flight"
                    );
                    return SeekDecision::Dropped;
                }
                self.fast_generation += 1;
                let ticket = SeekTicket {
                    fidelity: SeekFidelity::Fast,
                    generation: self.fast_generation,
                };
                self.fast = Some(ticket);
                SeekDecision::Issue {
                    ticket,
                    cancel_in_flight: false,
                }
            }
            SeekFidelity::Accurate => {
                let cancel_in_flight = self.accurate.is_some() || self.fast.is_some();
                self.accurate_generation += 1;
                let ticket = SeekTicket {
                    fidelity: SeekFidelity::Accurate,
                    generation: self.accurate_generation,
                };
                self.fast = None;
                self.accurate = Some(InFlight {
                    ticket,
                    target: request.target,
                    deadline: now + self.timeout,
                });
                SeekDecision::Issue {
                    ticket,
                    cancel_in_flight,
                }
            }
        }
    }

    pub fn complete(&mut self, ticket: SeekTicket, position: MediaTime) -> SeekCompletion {
        match ticket.fidelity {
            SeekFidelity::Accurate => match self.accurate {
                Some(in_flight) if in_flight.ticket == ticket => {
                    self.accurate = None;
                    self.last_known_good = position;
                    SeekCompletion::Applied(position)
                }
                _ => SeekCompletion::Stale,
            },
            SeekFidelity::Fast => {
                if self.accurate.is_some() || self.fast != Some(ticket) {
                    return SeekCompletion::Stale;
                }
                self.fast = None;
                self.last_known_good = position;
                SeekCompletion::Applied(position)
            }
        }
    }

    /// Abandon the accurate seek if its deadline has passed.
    pub fn check_timeout(&mut self, now: Instant) -> Option<SeekTimedOut> {
        let in_flight = self.accurate?;
        if now < in_flight.deadline {
            return None;
        }
        self.accurate = None;
        warn!(
            target_time = %in_flight.target,
            fallback = %self.last_known_good,
            timeout_ms = self.timeout.as_millis() as u64,
            "Accurate seek timed out"
        );
        Some(SeekTimedOut {
            target: in_flight.target,
            fallback: self.last_known_good,
            timeout: self.timeout,
        })
    }

    /// Playback position observed outside of any seek.
    pub fn note_position(&mut self, time: MediaTime) {
        if !self.is_seeking() {
            self.last_known_good = time;
        }
    }

    pub fn is_seeking(&self) -> bool {
        self.accurate.is_some()
    }

    pub fn pending_accurate_target(&self) -> Option<MediaTime> {
        self.accurate.map(|a| a.target)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.accurate.map(|a| a.deadline)
    }

    pub fn last_known_good(&self) -> MediaTime {
        self.last_known_good
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forget all in-flight seeks. Generations keep counting so tickets from
    /// before the reset stay stale.
    pub fn reset(&mut self, position: MediaTime) {
        self.fast = None;
        self.accurate = None;
        self.last_known_good = position;
    }
}

//! Core types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Ticks per second used for internal media times unless a source says otherwise.
pub const DEFAULT_TIMESCALE: u32 = 600;

/// Frame index within the loaded source (0-based).
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FrameNumber(pub u64);

impl FrameNumber {
    pub const ZERO: Self = Self(0);

    pub fn as_media_time(self, fps: Rational) -> MediaTime {
        crate::timing::time_for_frame(self, fps)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Rational media time: `value / timescale` seconds.
///
/// A timescale of zero marks an invalid time. Comparison and equality are
/// exact across timescales (cross multiplication), so `300/600 == 1/2`.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: u32,
}

impl MediaTime {
    pub const ZERO: Self = Self {
        value: 0,
        timescale: DEFAULT_TIMESCALE,
    };

    pub const INVALID: Self = Self {
        value: 0,
        timescale: 0,
    };

    pub const fn new(value: i64, timescale: u32) -> Self {
        Self { value, timescale }
    }

    /// Time in ticks of [`DEFAULT_TIMESCALE`].
    pub const fn from_ticks(value: i64) -> Self {
        Self::new(value, DEFAULT_TIMESCALE)
    }

    /// Convert floating seconds to the default timescale, rounding to the
    /// nearest tick. Non-finite input yields [`MediaTime::INVALID`].
    pub fn from_secs(secs: f64) -> Self {
        Self::from_secs_with_timescale(secs, DEFAULT_TIMESCALE)
    }

    pub fn from_secs_with_timescale(secs: f64, timescale: u32) -> Self {
        if !secs.is_finite() || timescale == 0 {
            return Self::INVALID;
        }
        Self::new((secs * timescale as f64).round() as i64, timescale)
    }

    pub fn is_valid(self) -> bool {
        self.timescale != 0
    }

    pub fn as_secs(self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }

    /// Re-express this time in another timescale, rounding half away from zero.
    pub fn convert_scale(self, timescale: u32) -> Self {
        if !self.is_valid() || timescale == 0 {
            return Self::INVALID;
        }
        if timescale == self.timescale {
            return self;
        }
        let num = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        Self::new(div_round(num, den) as i64, timescale)
    }

    /// Clamp into `[lo, hi]` (inclusive). Invalid bounds are ignored.
    pub fn clamp_to(self, lo: MediaTime, hi: MediaTime) -> Self {
        let mut t = self;
        if lo.is_valid() && t < lo {
            t = lo;
        }
        if hi.is_valid() && t > hi {
            t = hi;
        }
        t
    }

    /// Absolute difference in seconds.
    pub fn distance_secs(self, other: MediaTime) -> f64 {
        (self.as_secs() - other.as_secs()).abs()
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Integer division rounding half away from zero.
pub(crate) fn div_round(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0);
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    /// Invalid times sort before every valid time.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => {
                let lhs = self.value as i128 * other.timescale as i128;
                let rhs = other.value as i128 * self.timescale as i128;
                lhs.cmp(&rhs)
            }
        }
    }
}

impl Add for MediaTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        if !self.is_valid() || !rhs.is_valid() {
            return Self::INVALID;
        }
        let rhs = rhs.convert_scale(self.timescale);
        Self::new(self.value.saturating_add(rhs.value), self.timescale)
    }
}

impl Sub for MediaTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        if !self.is_valid() || !rhs.is_valid() {
            return Self::INVALID;
        }
        let rhs = rhs.convert_scale(self.timescale);
        Self::new(self.value.saturating_sub(rhs.value), self.timescale)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:.3}s", self.as_secs())
        } else {
            write!(f, "invalid")
        }
    }
}

/// Rational number for frame rates (e.g., 30000/1001 for 29.97fps).
///
/// A zero numerator or denominator is an invalid rate; the frame model
/// treats it as "no frames" rather than dividing by zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const INVALID: Self = Self { num: 0, den: 1 };
    pub const FPS_23_976: Self = Self {
        num: 24000,
        den: 1001,
    };
    pub const FPS_24: Self = Self { num: 24, den: 1 };
    pub const FPS_25: Self = Self { num: 25, den: 1 };
    pub const FPS_29_97: Self = Self {
        num: 30000,
        den: 1001,
    };
    pub const FPS_30: Self = Self { num: 30, den: 1 };
    pub const FPS_59_94: Self = Self {
        num: 60000,
        den: 1001,
    };
    pub const FPS_60: Self = Self { num: 60, den: 1 };

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn as_f64(self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Build a frame rate from a decoder-reported float.
    ///
    /// NTSC rates (23.976, 29.97, 47.952, 59.94, 119.88) snap to their exact
    /// `N*1000/1001` form, near-integers snap to `N/1`, and anything else is
    /// expressed in thousandths.
    pub fn from_fps_f64(fps: f64) -> Self {
        if !fps.is_finite() || fps <= 0.0 {
            return Self::INVALID;
        }
        for base in [24u32, 30, 48, 60, 120] {
            let ntsc = base as f64 * 1000.0 / 1001.0;
            if (fps - ntsc).abs() < 0.005 {
                return Self::new(base * 1000, 1001);
            }
        }
        let rounded = fps.round();
        if (fps - rounded).abs() < 0.001 {
            return Self::new(rounded as u32, 1);
        }
        let num = (fps * 1000.0).round() as u32;
        let g = gcd(num, 1000);
        Self::new(num / g, 1000 / g)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Video/image resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Byte size for RGBA8 pixel data.
    pub fn rgba_byte_size(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

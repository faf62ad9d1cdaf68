//! Frame/time model: pure conversions between media time and frame index.
//!
//! All arithmetic is done on the rational `MediaTime` in `i128`, never on
//! accumulated floating seconds, so fractional NTSC rates stay within one
//! frame over arbitrarily long files. An invalid frame rate (zero numerator
//! or denominator) maps every time to frame 0 and every frame to time 0.

use crate::types::{div_round, FrameNumber, MediaTime, Rational, DEFAULT_TIMESCALE};

/// `round(t * fps)`, half away from zero. Negative times clamp to frame 0.
pub fn frame_for_time(time: MediaTime, fps: Rational) -> FrameNumber {
    if !fps.is_valid() || !time.is_valid() || time.value <= 0 {
        return FrameNumber::ZERO;
    }
    // frames = value * num / (timescale * den)
    let num = time.value as i128 * fps.num as i128;
    let den = time.timescale as i128 * fps.den as i128;
    FrameNumber(div_round(num, den).max(0) as u64)
}

/// `f / fps`, expressed in the default timescale and rounded to the nearest tick.
pub fn time_for_frame(frame: FrameNumber, fps: Rational) -> MediaTime {
    if !fps.is_valid() {
        return MediaTime::ZERO;
    }
    // ticks = f * den * timescale / num
    let num = frame.0 as i128 * fps.den as i128 * DEFAULT_TIMESCALE as i128;
    let ticks = div_round(num, fps.num as i128);
    MediaTime::from_ticks(ticks.min(i64::MAX as i128) as i64)
}

/// Float convenience for collaborators that hold seconds.
pub fn frame_for_seconds(secs: f64, fps: Rational) -> FrameNumber {
    frame_for_time(MediaTime::from_secs(secs), fps)
}

pub fn seconds_for_frame(frame: FrameNumber, fps: Rational) -> f64 {
    time_for_frame(frame, fps).as_secs()
}

/// Total frame count of a source: `round(duration * fps)`.
pub fn total_frames(duration: MediaTime, fps: Rational) -> u64 {
    frame_for_time(duration, fps).0
}

/// Move `delta` frames from `current`, clamped to `[0, total - 1]`.
///
/// With `total == 0` the only legal frame is 0.
pub fn step_frame(current: FrameNumber, delta: i64, total: u64) -> FrameNumber {
    if total == 0 {
        return FrameNumber::ZERO;
    }
    let last = (total - 1) as i128;
    let target = (current.0 as i128 + delta as i128).clamp(0, last);
    FrameNumber(target as u64)
}

/// Clamp a frame into `[0, total - 1]`.
pub fn clamp_frame(frame: FrameNumber, total: u64) -> FrameNumber {
    step_frame(frame, 0, total)
}

/// Format `HH:MM:SS:FF` using the nominal (rounded-up) frames per second.
///
/// Non-drop-frame: the frame field counts within each wall-clock second.
pub fn timecode(time: MediaTime, fps: Rational) -> String {
    if !fps.is_valid() || !time.is_valid() {
        return "00:00:00:00".to_string();
    }
    let frame = frame_for_time(time, fps);
    let nominal = (fps.num as u64).div_ceil(fps.den as u64).max(1);
    let secs_total = if time.value <= 0 {
        0
    } else {
        (time.value as i128 / time.timescale as i128) as u64
    };
    let first_of_second = frame_for_time(
        MediaTime::from_ticks(secs_total as i64 * DEFAULT_TIMESCALE as i64),
        fps,
    );
    let ff = frame.0.saturating_sub(first_of_second.0).min(nominal - 1);
    let hh = secs_total / 3600;
    let mm = (secs_total / 60) % 60;
    let ss = secs_total % 60;
    format!("{hh:02}:{mm:02}:{ss:02}:{ff:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES: [f64; 6] = [24.0, 23.976, 25.0, 29.97, 30.0, 60.0];

    #[test]
    fn frame_time_round_trip_has_no_drift() {
        // Three hours of frames at every rate.
        for fps in RATES {
            let fps = Rational::from_fps_f64(fps);
            let total = total_frames(MediaTime::from_secs(3.0 * 3600.0), fps);
            for f in 0..total {
                let t = time_for_frame(FrameNumber(f), fps);
                let back = frame_for_time(t, fps);
                assert_eq!(back.0, f, "fps {fps} frame {f}");
                assert_eq!(time_for_frame(back, fps), t);
            }
        }
    }

    #[test]
    fn rounds_to_nearest_not_truncates() {
        let fps = Rational::FPS_29_97;
        // 1/29.97 s is 20.02 ticks; 20 ticks must still map to frame 1.
        assert_eq!(frame_for_time(MediaTime::from_ticks(20), fps), FrameNumber(1));
        assert_eq!(frame_for_time(MediaTime::from_ticks(9), fps), FrameNumber(0));
        assert_eq!(frame_for_time(MediaTime::from_ticks(11), fps), FrameNumber(1));
    }

    #[test]
    fn invalid_rate_never_divides_by_zero() {
        let bad = Rational::new(0, 1);
        assert_eq!(frame_for_seconds(10.0, bad), FrameNumber::ZERO);
        assert_eq!(time_for_frame(FrameNumber(50), bad), MediaTime::ZERO);
        assert_eq!(total_frames(MediaTime::from_secs(10.0), bad), 0);
        assert_eq!(frame_for_seconds(10.0, Rational::new(30, 0)), FrameNumber::ZERO);
    }

    #[test]
    fn total_frames_for_ten_seconds_ntsc() {
        let total = total_frames(MediaTime::from_secs(10.0), Rational::FPS_29_97);
        assert_eq!(total, 300);
    }

    #[test]
    fn step_clamps_both_ends() {
        assert_eq!(step_frame(FrameNumber(0), -1, 300), FrameNumber(0));
        assert_eq!(step_frame(FrameNumber(299), 1, 300), FrameNumber(299));
        assert_eq!(step_frame(FrameNumber(10), 5, 300), FrameNumber(15));
        assert_eq!(step_frame(FrameNumber(10), 5, 0), FrameNumber(0));
    }

    #[test]
    fn negative_time_is_frame_zero() {
        assert_eq!(frame_for_seconds(-3.0, Rational::FPS_24), FrameNumber::ZERO);
    }

    #[test]
    fn timecode_formats() {
        let fps = Rational::FPS_25;
        assert_eq!(timecode(MediaTime::from_secs(3661.4), fps), "01:01:01:10");
        assert_eq!(timecode(MediaTime::ZERO, fps), "00:00:00:00");
        assert_eq!(
            timecode(MediaTime::from_secs(1.0), Rational::new(0, 1)),
            "00:00:00:00"
        );
    }
}

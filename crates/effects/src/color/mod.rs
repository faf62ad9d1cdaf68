//! Color adjustment filters.
//!
//! - [`BrightnessContrast`]: Brightness and contrast
//! - [`Exposure`]: Exposure (EV) and gamma
//! - [`HslAdjust`]: Hue, saturation, lightness
//! - [`Invert`]: Negative
//! - [`Monochrome`]: Desaturate toward Rec.709 luma
//! - [`Opacity`]: Alpha multiply

pub mod brightness;
pub mod exposure;
pub mod hsl;
pub mod invert;
pub mod monochrome;
pub mod opacity;

pub use brightness::BrightnessContrast;
pub use exposure::Exposure;
pub use hsl::HslAdjust;
pub use invert::Invert;
pub use monochrome::Monochrome;
pub use opacity::Opacity;

/// Rec.709 luma of normalized RGB.
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// RGB (0..1) to HSL with hue in degrees `[0, 360)`.
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d <= f32::EPSILON {
        return (0.0, 0.0, l);
    }
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h * 60.0, s, l)
}

pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= f32::EPSILON {
        return (l, l, l);
    }
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    (r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32, f32), b: (f32, f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4 && (a.2 - b.2).abs() < 1e-4
    }

    #[test]
    fn hsl_round_trip() {
        for rgb in [
            (1.0, 0.0, 0.0),
            (0.2, 0.6, 0.4),
            (0.9, 0.9, 0.1),
            (0.5, 0.5, 0.5),
        ] {
            let (h, s, l) = rgb_to_hsl(rgb.0, rgb.1, rgb.2);
            assert!(close(hsl_to_rgb(h, s, l), rgb), "{rgb:?}");
        }
    }

    #[test]
    fn primary_hues() {
        assert_eq!(rgb_to_hsl(0.0, 1.0, 0.0).0, 120.0);
        assert_eq!(rgb_to_hsl(0.0, 0.0, 1.0).0, 240.0);
    }

    #[test]
    fn luma_of_white_is_one() {
        assert!((luma(1.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
    }
}

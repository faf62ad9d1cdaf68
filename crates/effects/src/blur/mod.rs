//! Blur filters.
//!
//! - [`GaussianBlur`]: Separable Gaussian blur (2-pass)
//!
//! The blur core works on premultiplied float pixels so transparent
//! regions do not bleed color into opaque ones. Sharpen reuses it.

pub mod gaussian;

pub use gaussian::GaussianBlur;

use crate::image::{from_unit, to_unit, RgbaImage};

/// Reusable buffers for one blur instance.
#[derive(Default)]
pub(crate) struct BlurScratch {
    kernel: Vec<f32>,
    pixels: Vec<[f32; 4]>,
    pass: Vec<[f32; 4]>,
}

impl BlurScratch {
    /// Normalized 1D Gaussian kernel covering `radius` pixels on each side.
    fn build_kernel(&mut self, radius: f32) -> usize {
        let half = radius.ceil().max(1.0) as usize;
        let sigma = (radius / 2.0).max(0.5);
        self.kernel.clear();
        self.kernel.extend((0..=2 * half).map(|i| {
            let x = i as f32 - half as f32;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        }));
        let sum: f32 = self.kernel.iter().sum();
        for k in &mut self.kernel {
            *k /= sum;
        }
        half
    }

    /// Blur `input`, returning premultiplied float pixels.
    pub(crate) fn blur_premultiplied(&mut self, input: &RgbaImage, radius: f32) -> &[[f32; 4]] {
        let (w, h) = (input.width() as usize, input.height() as usize);
        self.pixels.clear();
        self.pixels
            .extend(input.as_bytes().chunks_exact(4).map(premultiply));
        if w == 0 || h == 0 {
            return &self.pixels;
        }
        let half = self.build_kernel(radius);

        // Horizontal pass into `pass`, vertical pass back into `pixels`.
        self.pass.clear();
        self.pass.resize(w * h, [0.0; 4]);
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 4];
                for (i, k) in self.kernel.iter().enumerate() {
                    let sx = (x + i).saturating_sub(half).min(w - 1);
                    add_scaled(&mut acc, &self.pixels[y * w + sx], *k);
                }
                self.pass[y * w + x] = acc;
            }
        }
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 4];
                for (i, k) in self.kernel.iter().enumerate() {
                    let sy = (y + i).saturating_sub(half).min(h - 1);
                    add_scaled(&mut acc, &self.pass[sy * w + x], *k);
                }
                self.pixels[y * w + x] = acc;
            }
        }
        &self.pixels
    }
}

fn add_scaled(acc: &mut [f32; 4], px: &[f32; 4], k: f32) {
    for c in 0..4 {
        acc[c] += px[c] * k;
    }
}

pub(crate) fn premultiply(px: &[u8]) -> [f32; 4] {
    let a = to_unit(px[3]);
    [to_unit(px[0]) * a, to_unit(px[1]) * a, to_unit(px[2]) * a, a]
}

pub(crate) fn unpremultiply(px: [f32; 4]) -> [u8; 4] {
    let a = px[3];
    if a <= f32::EPSILON {
        return [0, 0, 0, 0];
    }
    [
        from_unit(px[0] / a),
        from_unit(px[1] / a),
        from_unit(px[2] / a),
        from_unit(a),
    ]
}

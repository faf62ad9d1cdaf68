//! Edge detection filter (Sobel on luma).

use vl_common::{FilterKind, ParamDef};

use crate::color::luma;
use crate::image::{from_unit, to_unit, RgbaImage};
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![
        float_param("strength", "Strength", 0.0, 4.0, 1.0),
        float_param("threshold", "Threshold", 0.0, 1.0, 0.1),
    ]
}

/// White edges on black. Magnitudes below `threshold` are dropped.
pub struct EdgeDetect {
    params: Vec<ParamDef>,
}

impl EdgeDetect {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for EdgeDetect {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for EdgeDetect {
    fn kind(&self) -> FilterKind {
        FilterKind::EdgeDetect
    }

    fn display_name(&self) -> &str {
        "Edge Detect"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(EdgeDetectFilter {
            strength: params.float("strength"),
            threshold: params.float("threshold"),
            luma: Vec::new(),
        })
    }
}

struct EdgeDetectFilter {
    strength: f32,
    threshold: f32,
    luma: Vec<f32>,
}

impl Filter for EdgeDetectFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::EdgeDetect
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        let (w, h) = (input.width() as usize, input.height() as usize);
        self.luma.clear();
        self.luma.extend(
            input
                .as_bytes()
                .chunks_exact(4)
                .map(|px| luma(to_unit(px[0]), to_unit(px[1]), to_unit(px[2]))),
        );

        let mut out = RgbaImage::new(input.width(), input.height());
        let at = |x: isize, y: isize| -> f32 {
            let cx = x.clamp(0, w as isize - 1) as usize;
            let cy = y.clamp(0, h as isize - 1) as usize;
            self.luma[cy * w + cx]
        };
        for y in 0..h as isize {
            for x in 0..w as isize {
                let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2.0 * at(x - 1, y)
                    - at(x - 1, y + 1);
                let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2.0 * at(x, y - 1)
                    - at(x + 1, y - 1);
                // Sobel magnitude peaks at 4 * sqrt(2) for a unit step.
                let mag = (gx * gx + gy * gy).sqrt() / 4.0 * self.strength;
                let v = if mag < self.threshold { 0 } else { from_unit(mag) };
                let alpha = input.pixel(x as u32, y as u32)[3];
                out.set_pixel(x as u32, y as u32, [v, v, v, alpha]);
            }
        }
        out
    }
}

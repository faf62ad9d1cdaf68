//! Unsharp Mask (Sharpen) filter.

use vl_common::{FilterKind, ParamDef};

use crate::blur::{premultiply, unpremultiply, BlurScratch};
use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![
        float_param("amount", "Amount", 0.0, 5.0, 1.0),
        float_param("radius", "Radius", 0.5, 10.0, 1.0),
    ]
}

/// Unsharp mask: `out = in + amount * (in - blur(in, radius))`.
pub struct Sharpen {
    params: Vec<ParamDef>,
}

impl Sharpen {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for Sharpen {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for Sharpen {
    fn kind(&self) -> FilterKind {
        FilterKind::Sharpen
    }

    fn display_name(&self) -> &str {
        "Sharpen"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(SharpenFilter {
            amount: params.float("amount"),
            radius: params.float("radius"),
            scratch: BlurScratch::default(),
        })
    }
}

struct SharpenFilter {
    amount: f32,
    radius: f32,
    scratch: BlurScratch,
}

impl Filter for SharpenFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Sharpen
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        if self.amount <= 0.0 {
            return input.clone();
        }
        let amount = self.amount;
        let blurred = self.scratch.blur_premultiplied(input, self.radius);
        let data = input
            .as_bytes()
            .chunks_exact(4)
            .zip(blurred)
            .flat_map(|(src, blur)| {
                let orig = premultiply(src);
                let mut out = [0.0f32; 4];
                for c in 0..3 {
                    out[c] = (orig[c] + amount * (orig[c] - blur[c])).clamp(0.0, orig[3]);
                }
                out[3] = orig[3];
                unpremultiply(out)
            })
            .collect();
        RgbaImage::from_raw(input.width(), input.height(), data).unwrap_or_else(|_| input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve_params;

    #[test]
    fn flat_image_is_unchanged() {
        let fx = Sharpen::new();
        let mut filter = fx.instantiate(&resolve_params(fx.name(), fx.param_defs(), &[]));
        let image = RgbaImage::filled(6, 6, [90, 90, 90, 255]);
        assert_eq!(filter.apply(&image), image);
    }

    #[test]
    fn increases_local_contrast() {
        let fx = Sharpen::new();
        let mut filter = fx.instantiate(&resolve_params(fx.name(), fx.param_defs(), &[]));
        let mut image = RgbaImage::filled(6, 1, [100, 100, 100, 255]);
        for x in 3..6 {
            image.set_pixel(x, 0, [150, 150, 150, 255]);
        }
        let out = filter.apply(&image);
        assert!(out.pixel(2, 0)[0] < 100);
        assert!(out.pixel(3, 0)[0] > 150);
    }
}

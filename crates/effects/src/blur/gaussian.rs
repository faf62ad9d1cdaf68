//! Gaussian Blur filter (separable).

use vl_common::{FilterKind, ParamDef};

use super::{unpremultiply, BlurScratch};
use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![float_param("radius", "Radius", 0.0, 50.0, 4.0)]
}

/// Gaussian Blur (separable two-pass). Sigma is half the radius.
pub struct GaussianBlur {
    params: Vec<ParamDef>,
}

impl GaussianBlur {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for GaussianBlur {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for GaussianBlur {
    fn kind(&self) -> FilterKind {
        FilterKind::GaussianBlur
    }

    fn display_name(&self) -> &str {
        "Gaussian Blur"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(GaussianBlurFilter {
            radius: params.float("radius"),
            scratch: BlurScratch::default(),
        })
    }
}

struct GaussianBlurFilter {
    radius: f32,
    scratch: BlurScratch,
}

impl Filter for GaussianBlurFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::GaussianBlur
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        if self.radius < 0.5 {
            return input.clone();
        }
        let blurred = self.scratch.blur_premultiplied(input, self.radius);
        let data = blurred.iter().flat_map(|px| unpremultiply(*px)).collect();
        RgbaImage::from_raw(input.width(), input.height(), data).unwrap_or_else(|_| input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve_params;
    use vl_common::ParamValue;

    fn build(radius: f32) -> Box<dyn Filter> {
        let fx = GaussianBlur::new();
        let params = vec![("radius".to_string(), ParamValue::Float(radius))];
        fx.instantiate(&resolve_params(fx.name(), fx.param_defs(), &params))
    }

    #[test]
    fn flat_image_is_unchanged() {
        let image = RgbaImage::filled(8, 8, [40, 80, 120, 255]);
        assert_eq!(build(5.0).apply(&image), image);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mut image = RgbaImage::filled(4, 4, [0, 0, 0, 255]);
        image.set_pixel(1, 1, [255, 255, 255, 255]);
        assert_eq!(build(0.0).apply(&image), image);
    }

    #[test]
    fn spreads_a_bright_pixel() {
        let mut image = RgbaImage::filled(9, 9, [0, 0, 0, 255]);
        image.set_pixel(4, 4, [255, 255, 255, 255]);
        let out = build(2.0).apply(&image);
        assert!(out.pixel(4, 4)[0] < 255);
        assert!(out.pixel(5, 4)[0] > 0);
        assert_eq!(out.pixel(5, 4), out.pixel(3, 4));
    }

    #[test]
    fn transparent_neighbors_do_not_darken() {
        let mut image = RgbaImage::new(5, 1);
        image.set_pixel(2, 0, [255, 0, 0, 255]);
        let out = build(1.0).apply(&image);
        let [r, g, b, a] = out.pixel(2, 0);
        assert_eq!((r, g, b), (255, 0, 0));
        assert!(a < 255);
    }
}

//! Brightness / Contrast filter.

use vl_common::{FilterKind, ParamDef};

use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![
        float_param("brightness", "Brightness", -1.0, 1.0, 0.0),
        float_param("contrast", "Contrast", 0.0, 3.0, 1.0),
    ]
}

/// Brightness / Contrast adjustment. Contrast pivots around mid-grey.
pub struct BrightnessContrast {
    params: Vec<ParamDef>,
}

impl BrightnessContrast {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for BrightnessContrast {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for BrightnessContrast {
    fn kind(&self) -> FilterKind {
        FilterKind::BrightnessContrast
    }

    fn display_name(&self) -> &str {
        "Brightness / Contrast"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(BrightnessContrastFilter {
            brightness: params.float("brightness"),
            contrast: params.float("contrast"),
        })
    }
}

struct BrightnessContrastFilter {
    brightness: f32,
    contrast: f32,
}

impl Filter for BrightnessContrastFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::BrightnessContrast
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        let (b, c) = (self.brightness, self.contrast);
        input.map_pixels(|[r, g, bl, a]| {
            let adjust = |v: f32| (v - 0.5) * c + 0.5 + b;
            [adjust(r), adjust(g), adjust(bl), a]
        })
    }
}

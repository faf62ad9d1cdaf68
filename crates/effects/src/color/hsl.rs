//! Hue / Saturation / Lightness adjustment filter.

use vl_common::{FilterKind, ParamDef, ParamType, ParamValue};

use super::{hsl_to_rgb, rgb_to_hsl};
use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![
        ParamDef {
            name: "hue".to_string(),
            display_name: "Hue".to_string(),
            param_type: ParamType::Angle {
                min: -180.0,
                max: 180.0,
            },
            default: ParamValue::Angle(0.0),
        },
        float_param("saturation", "Saturation", 0.0, 2.0, 1.0),
        float_param("lightness", "Lightness", -1.0, 1.0, 0.0),
    ]
}

/// Hue rotation in degrees, saturation multiplier, lightness offset.
pub struct HslAdjust {
    params: Vec<ParamDef>,
}

impl HslAdjust {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for HslAdjust {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for HslAdjust {
    fn kind(&self) -> FilterKind {
        FilterKind::HslAdjust
    }

    fn display_name(&self) -> &str {
        "Hue / Saturation / Lightness"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(HslFilter {
            hue: params.float("hue"),
            saturation: params.float("saturation"),
            lightness: params.float("lightness"),
        })
    }
}

struct HslFilter {
    hue: f32,
    saturation: f32,
    lightness: f32,
}

impl Filter for HslFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::HslAdjust
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        input.map_pixels(|[r, g, b, a]| {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let (r, g, b) = hsl_to_rgb(
                h + self.hue,
                (s * self.saturation).clamp(0.0, 1.0),
                (l + self.lightness).clamp(0.0, 1.0),
            );
            [r, g, b, a]
        })
    }
}

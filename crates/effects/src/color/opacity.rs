//! Opacity filter.

use vl_common::{FilterKind, ParamDef};

use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![float_param("opacity", "Opacity", 0.0, 1.0, 1.0)]
}

/// Multiplies alpha. Color channels are untouched.
pub struct Opacity {
    params: Vec<ParamDef>,
}

impl Opacity {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for Opacity {
    fn kind(&self) -> FilterKind {
        FilterKind::Opacity
    }

    fn display_name(&self) -> &str {
        "Opacity"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(OpacityFilter {
            opacity: params.float("opacity"),
        })
    }
}

struct OpacityFilter {
    opacity: f32,
}

impl Filter for OpacityFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Opacity
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        let k = self.opacity;
        input.map_pixels(|[r, g, b, a]| [r, g, b, a * k])
    }
}

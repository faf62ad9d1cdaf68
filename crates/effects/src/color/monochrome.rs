//! Monochrome filter.

use vl_common::{FilterKind, ParamDef};

use super::luma;
use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![float_param("amount", "Amount", 0.0, 1.0, 1.0)]
}

/// Blend toward Rec.709 luma; `amount = 1` is fully grey.
pub struct Monochrome {
    params: Vec<ParamDef>,
}

impl Monochrome {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for Monochrome {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for Monochrome {
    fn kind(&self) -> FilterKind {
        FilterKind::Monochrome
    }

    fn display_name(&self) -> &str {
        "Monochrome"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(MonochromeFilter {
            amount: params.float("amount"),
        })
    }
}

struct MonochromeFilter {
    amount: f32,
}

impl Filter for MonochromeFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Monochrome
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        let t = self.amount;
        input.map_pixels(|[r, g, b, a]| {
            let y = luma(r, g, b);
            let mix = |v: f32| v + (y - v) * t;
            [mix(r), mix(g), mix(b), a]
        })
    }
}

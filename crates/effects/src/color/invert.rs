//! Invert (negative) filter. Alpha is preserved.

use vl_common::{FilterKind, ParamDef};

use crate::image::RgbaImage;
use crate::params::ResolvedParams;
use crate::traits::{Filter, FilterFactory};

#[derive(Default)]
pub struct Invert {
    params: Vec<ParamDef>,
}

impl Invert {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterFactory for Invert {
    fn kind(&self) -> FilterKind {
        FilterKind::Invert
    }

    fn display_name(&self) -> &str {
        "Invert"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, _params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(InvertFilter)
    }
}

struct InvertFilter;

impl Filter for InvertFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Invert
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        input.map_pixels(|[r, g, b, a]| [1.0 - r, 1.0 - g, 1.0 - b, a])
    }
}

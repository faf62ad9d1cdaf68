//! Exposure / Gamma filter.

use vl_common::{FilterKind, ParamDef};

use crate::image::RgbaImage;
use crate::params::{float_param, ResolvedParams};
use crate::traits::{Filter, FilterFactory};

fn param_defs() -> Vec<ParamDef> {
    vec![
        float_param("exposure", "Exposure (EV)", -5.0, 5.0, 0.0),
        float_param("gamma", "Gamma", 0.1, 4.0, 1.0),
    ]
}

/// Exposure in stops followed by a gamma curve.
pub struct Exposure {
    params: Vec<ParamDef>,
}

impl Exposure {
    pub fn new() -> Self {
        Self {
            params: param_defs(),
        }
    }
}

impl Default for Exposure {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory for Exposure {
    fn kind(&self) -> FilterKind {
        FilterKind::Exposure
    }

    fn display_name(&self) -> &str {
        "Exposure"
    }

    fn param_defs(&self) -> &[ParamDef] {
        &self.params
    }

    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter> {
        Box::new(ExposureFilter {
            gain: 2f32.powf(params.float("exposure")),
            inv_gamma: 1.0 / params.float("gamma"),
        })
    }
}

struct ExposureFilter {
    gain: f32,
    inv_gamma: f32,
}

impl Filter for ExposureFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Exposure
    }

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage {
        let (gain, inv_gamma) = (self.gain, self.inv_gamma);
        input.map_pixels(|[r, g, b, a]| {
            let adjust = |v: f32| (v * gain).clamp(0.0, 1.0).powf(inv_gamma);
            [adjust(r), adjust(g), adjust(b), a]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve_params;
    use vl_common::ParamValue;

    #[test]
    fn one_stop_doubles() {
        let fx = Exposure::new();
        let params = vec![("exposure".to_string(), ParamValue::Float(1.0))];
        let mut filter = fx.instantiate(&resolve_params(fx.name(), fx.param_defs(), &params));
        let out = filter.apply(&RgbaImage::filled(1, 1, [50, 100, 200, 255]));
        assert_eq!(out.pixel(0, 0), [100, 200, 255, 255]);
    }

    #[test]
    fn zero_gamma_is_clamped() {
        let fx = Exposure::new();
        let params = vec![("gamma".to_string(), ParamValue::Float(0.0))];
        let resolved = resolve_params(fx.name(), fx.param_defs(), &params);
        assert_eq!(resolved.float("gamma"), 0.1);
        let out = fx
            .instantiate(&resolved)
            .apply(&RgbaImage::filled(1, 1, [128, 128, 128, 255]));
        assert!(out.pixel(0, 0)[0] < 128);
    }
}

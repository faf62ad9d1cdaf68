//! Parameter resolution: defaults, type checks and range clamping.
//!
//! Values are never rejected. Out-of-range numbers are clamped, wrong types
//! fall back to the default, unknown names are ignored with a warning.

use tracing::warn;
use vl_common::{ParamDef, ParamType, ParamValue};

/// One value per parameter definition, already clamped to its range.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedParams {
    values: Vec<(String, ParamValue)>,
}

impl ResolvedParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Float or angle value; 0.0 for an undefined name.
    pub fn float(&self, name: &str) -> f32 {
        self.get(name).and_then(ParamValue::as_float).unwrap_or(0.0)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve supplied parameters against a filter's definitions.
pub fn resolve_params(
    filter: &str,
    defs: &[ParamDef],
    params: &[(String, ParamValue)],
) -> ResolvedParams {
    for (name, _) in params {
        if !defs.iter().any(|d| d.name == *name) {
            warn!(filter = %filter, param = %name, "Ignoring unknown filter parameter");
        }
    }

    let values = defs
        .iter()
        .map(|def| {
            // Last occurrence wins.
            let supplied = params.iter().rev().find(|(n, _)| *n == def.name);
            let value = match supplied {
                Some((_, value)) => coerce(filter, def, value),
                None => def.default.clone(),
            };
            (def.name.clone(), value)
        })
        .collect();

    ResolvedParams { values }
}

fn coerce(filter: &str, def: &ParamDef, value: &ParamValue) -> ParamValue {
    match (&def.param_type, value) {
        (ParamType::Float { .. }, ParamValue::Float(v) | ParamValue::Angle(v)) => {
            ParamValue::Float(def.param_type.clamp(*v))
        }
        (ParamType::Angle { .. }, ParamValue::Float(v) | ParamValue::Angle(v)) => {
            ParamValue::Angle(def.param_type.clamp(*v))
        }
        (ParamType::Bool, ParamValue::Bool(b)) => ParamValue::Bool(*b),
        _ => {
            warn!(
                filter = %filter,
                param = %def.name,
                got = ?value,
                "Filter parameter has wrong type, using default"
            );
            def.default.clone()
        }
    }
}

/// Shorthand for building a float parameter definition.
pub fn float_param(name: &str, display_name: &str, min: f32, max: f32, default: f32) -> ParamDef {
    ParamDef {
        name: name.to_string(),
        display_name: display_name.to_string(),
        param_type: ParamType::Float { min, max },
        default: ParamValue::Float(default),
    }
}

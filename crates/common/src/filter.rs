//! Filter descriptors, parameter types, and parameter values.
//!
//! Descriptors are plain values. The pipeline in `vl-effects` turns each
//! descriptor into a fresh filter object on every render.

use serde::{Deserialize, Serialize};

/// Built-in filter kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    BrightnessContrast,
    Exposure,
    HslAdjust,
    Invert,
    Monochrome,
    GaussianBlur,
    Sharpen,
    EdgeDetect,
    Opacity,
}

impl FilterKind {
    pub const ALL: [FilterKind; 9] = [
        Self::BrightnessContrast,
        Self::Exposure,
        Self::HslAdjust,
        Self::Invert,
        Self::Monochrome,
        Self::GaussianBlur,
        Self::Sharpen,
        Self::EdgeDetect,
        Self::Opacity,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            Self::BrightnessContrast => "brightness_contrast",
            Self::Exposure => "exposure",
            Self::HslAdjust => "hsl_adjust",
            Self::Invert => "invert",
            Self::Monochrome => "monochrome",
            Self::GaussianBlur => "gaussian_blur",
            Self::Sharpen => "sharpen",
            Self::EdgeDetect => "edge_detect",
            Self::Opacity => "opacity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn category(self) -> FilterCategory {
        match self {
            Self::BrightnessContrast
            | Self::Exposure
            | Self::HslAdjust
            | Self::Invert
            | Self::Monochrome
            | Self::Opacity => FilterCategory::Color,
            Self::GaussianBlur => FilterCategory::Blur,
            Self::Sharpen | Self::EdgeDetect => FilterCategory::Stylize,
        }
    }
}

/// Filter category for collaborator UI grouping.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterCategory {
    Color,
    Blur,
    Stylize,
}

/// Parameter definition for a filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub display_name: String,
    pub param_type: ParamType,
    pub default: ParamValue,
}

/// Parameter type with constraints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ParamType {
    Float { min: f32, max: f32 },
    Bool,
    Angle { min: f32, max: f32 },
}

impl ParamType {
    /// Clamp a numeric value into this type's range. Non-finite values map to `min`.
    pub fn clamp(&self, value: f32) -> f32 {
        match *self {
            Self::Float { min, max } | Self::Angle { min, max } => {
                if value.is_finite() {
                    value.clamp(min, max)
                } else {
                    min
                }
            }
            Self::Bool => value,
        }
    }
}

/// Concrete parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f32),
    Bool(bool),
    Angle(f32),
}

impl ParamValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) | Self::Angle(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// One entry of an ordered filter list, with concrete parameter values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub enabled: bool,
    pub params: Vec<(String, ParamValue)>,
}

impl FilterDescriptor {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            enabled: true,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.params.push((name.into(), value));
        self
    }

    pub fn with_float(self, name: impl Into<String>, value: f32) -> Self {
        self.with_param(name, ParamValue::Float(value))
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Last value wins when a name is repeated.
    pub fn get_param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builder() {
        let fx = FilterDescriptor::new(FilterKind::BrightnessContrast)
            .with_float("brightness", 0.5)
            .with_float("contrast", 1.2);

        assert_eq!(fx.params.len(), 2);
        assert_eq!(fx.get_param("brightness").unwrap().as_float(), Some(0.5));
        assert!(fx.enabled);
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in FilterKind::ALL {
            assert_eq!(FilterKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FilterKind::from_name("chroma_key"), None);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&FilterKind::EdgeDetect).unwrap();
        assert_eq!(json, "\"edge_detect\"");
    }

    #[test]
    fn clamp_handles_nan() {
        let t = ParamType::Float { min: -1.0, max: 1.0 };
        assert_eq!(t.clamp(5.0), 1.0);
        assert_eq!(t.clamp(f32::NAN), -1.0);
    }
}

//! Filter traits.
//!
//! A [`FilterFactory`] is a stateless, shareable description of one filter
//! kind. Each render asks it for a brand-new [`Filter`] carrying the
//! parameters and scratch state for that single frame; filter instances are
//! never shared between renders.

use vl_common::{FilterCategory, FilterKind, ParamDef};

use crate::image::RgbaImage;
use crate::params::ResolvedParams;

/// Registered filter kind: metadata plus instance construction.
pub trait FilterFactory: Send + Sync {
    fn kind(&self) -> FilterKind;

    /// Unique filter name (matches [`FilterKind::name`]).
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Display name for UI.
    fn display_name(&self) -> &str;

    fn category(&self) -> FilterCategory {
        self.kind().category()
    }

    /// Parameter definitions (for UI generation and clamping).
    fn param_defs(&self) -> &[ParamDef];

    /// Build a fresh instance from already-clamped parameters.
    fn instantiate(&self, params: &ResolvedParams) -> Box<dyn Filter>;
}

/// A single-use filter instance. May keep mutable scratch state.
pub trait Filter: Send {
    fn kind(&self) -> FilterKind;

    fn apply(&mut self, input: &RgbaImage) -> RgbaImage;
}

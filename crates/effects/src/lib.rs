//! `vl-effects`: Filter pipeline for rendered frames.
//!
//! Filters are described by value ([`vl_common::FilterDescriptor`]) and turned
//! into fresh [`Filter`] instances on every render, so concurrent render
//! threads never share filter state.
//!
//! - The [`FilterFactory`] and [`Filter`] traits
//! - A [`FilterRegistry`] for by-kind and by-category lookup
//! - Parameter resolution with range clamping
//! - [`FilterPipeline`] and the shared [`FilterChain`] snapshot
//! - lavfi translation for the libmpv backend
//! - 9 built-in filters across 3 categories:
//!
//! ## Color (6 filters)
//! - Brightness / Contrast
//! - Exposure / Gamma
//! - Hue / Saturation / Lightness
//! - Invert
//! - Monochrome
//! - Opacity
//!
//! ## Blur (1 filter)
//! - Gaussian Blur (separable, 2-pass)
//!
//! ## Stylize (2 filters)
//! - Sharpen (Unsharp Mask)
//! - Edge Detect (Sobel, for tracing line work)

pub mod blur;
pub mod color;
pub mod error;
pub mod image;
pub mod lavfi;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod stylize;
pub mod traits;

// Re-export primary types at crate root.
pub use error::EffectError;
pub use image::RgbaImage;
pub use lavfi::{to_lavfi_chain, to_mpv_vf};
pub use params::{resolve_params, ResolvedParams};
pub use pipeline::{FilterChain, FilterPipeline};
pub use registry::FilterRegistry;
pub use traits::{Filter, FilterFactory};

// Re-export all filter factories for convenience.
pub use blur::GaussianBlur;
pub use color::{BrightnessContrast, Exposure, HslAdjust, Invert, Monochrome, Opacity};
pub use stylize::{EdgeDetect, Sharpen};

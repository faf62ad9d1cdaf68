//! Translation of a descriptor list into an mpv `vf` filter string.
//!
//! The secondary backend renders inside libmpv, so the CPU filters are not
//! in its frame path. Each filter kind maps to the closest libavfilter
//! graph; parameters go through the same clamping as the CPU path.

use std::fmt::Write;

use tracing::warn;
use vl_common::{FilterDescriptor, FilterKind};

use crate::params::ResolvedParams;
use crate::registry::FilterRegistry;

/// Render enabled descriptors as a comma-separated lavfi chain.
///
/// Returns an empty string when nothing would change the image.
pub fn to_lavfi_chain(registry: &FilterRegistry, descriptors: &[FilterDescriptor]) -> String {
    let mut parts = Vec::new();
    for descriptor in descriptors.iter().filter(|d| d.enabled) {
        match registry.resolve(descriptor) {
            Ok(params) => {
                if let Some(graph) = graph_for(descriptor.kind, &params) {
                    parts.push(graph);
                }
            }
            Err(e) => warn!(filter = descriptor.kind.name(), error = %e, "Skipping filter"),
        }
    }
    parts.join(",")
}

/// Wrap a chain as the value of mpv's `vf` property.
pub fn to_mpv_vf(registry: &FilterRegistry, descriptors: &[FilterDescriptor]) -> String {
    let chain = to_lavfi_chain(registry, descriptors);
    if chain.is_empty() {
        chain
    } else {
        format!("lavfi=[{chain}]")
    }
}

fn graph_for(kind: FilterKind, p: &ResolvedParams) -> Option<String> {
    let graph = match kind {
        FilterKind::BrightnessContrast => format!(
            "eq=brightness={:.3}:contrast={:.3}",
            p.float("brightness"),
            p.float("contrast")
        ),
        FilterKind::Exposure => format!(
            "exposure=exposure={:.3},eq=gamma={:.3}",
            p.float("exposure"),
            p.float("gamma")
        ),
        FilterKind::HslAdjust => {
            let mut g = format!("hue=h={:.3}:s={:.3}", p.float("hue"), p.float("saturation"));
            let lightness = p.float("lightness");
            if lightness != 0.0 {
                let _ = write!(g, ",eq=brightness={lightness:.3}");
            }
            g
        }
        FilterKind::Invert => "negate".to_string(),
        FilterKind::Monochrome => format!("hue=s={:.3}", 1.0 - p.float("amount")),
        FilterKind::GaussianBlur => {
            let radius = p.float("radius");
            if radius < 0.5 {
                return None;
            }
            format!("gblur=sigma={:.3}", radius / 2.0)
        }
        FilterKind::Sharpen => {
            // unsharp wants an odd matrix size in 3..=23
            let size = ((p.float("radius").ceil() as u32) * 2 + 1).clamp(3, 23);
            format!(
                "unsharp=luma_msize_x={size}:luma_msize_y={size}:luma_amount={:.3}",
                p.float("amount")
            )
        }
        FilterKind::EdgeDetect => {
            let high = p.float("threshold").max(0.01);
            format!("edgedetect=low={:.3}:high={:.3}", high / 2.0, high)
        }
        FilterKind::Opacity => format!(
            "format=rgba,colorchannelmixer=aa={:.3}",
            p.float("opacity")
        ),
    };
    Some(graph)
}

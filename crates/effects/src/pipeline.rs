//! Filter pipeline: ordered descriptors applied to one frame.
//!
//! Every `apply` call builds fresh filter instances from the descriptors, so
//! concurrent renders of different frames never share filter state. The
//! descriptor list itself lives in a [`FilterChain`]; renders take an
//! immutable snapshot and a `replace` never touches a snapshot in use.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};
use vl_common::FilterDescriptor;

use crate::image::RgbaImage;
use crate::registry::FilterRegistry;

/// Applies descriptor lists using a shared registry of factories.
#[derive(Clone)]
pub struct FilterPipeline {
    registry: Arc<FilterRegistry>,
}

impl FilterPipeline {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    pub fn with_builtins() -> Self {
        Self::new(Arc::new(FilterRegistry::with_builtins()))
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// The same list as an mpv `vf` value, for backends that filter internally.
    pub fn mpv_vf(&self, descriptors: &[FilterDescriptor]) -> String {
        crate::lavfi::to_mpv_vf(&self.registry, descriptors)
    }

    /// Run `descriptors` over `source` in order.
    ///
    /// An empty or all-disabled list returns `source` itself (same `Arc`, no
    /// copy). Descriptors whose kind is not registered are skipped.
    pub fn apply(&self, descriptors: &[FilterDescriptor], source: Arc<RgbaImage>) -> Arc<RgbaImage> {
        let mut current: Option<RgbaImage> = None;

        for descriptor in descriptors.iter().filter(|d| d.enabled) {
            let mut filter = match self.registry.instantiate(descriptor) {
                Ok(f) => f,
                Err(e) => {
                    warn!(filter = descriptor.kind.name(), error = %e, "Skipping filter");
                    continue;
                }
            };
            let input = current.as_ref().unwrap_or(source.as_ref());
            let output = filter.apply(input);
            current = Some(output);
        }

        match current {
            Some(image) => {
                trace!(
                    width = image.width(),
                    height = image.height(),
                    "Filter pipeline rendered frame"
                );
                Arc::new(image)
            }
            None => source,
        }
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Current descriptor list, shared between the command thread and renderers.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    inner: Arc<RwLock<Arc<Vec<FilterDescriptor>>>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable view of the list as of now.
    pub fn snapshot(&self) -> Arc<Vec<FilterDescriptor>> {
        Arc::clone(&self.inner.read())
    }

    /// Swap in a new list. Renders holding an older snapshot are unaffected.
    pub fn replace(&self, descriptors: Vec<FilterDescriptor>) {
        *self.inner.write() = Arc::new(descriptors);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().iter().all(|d| !d.enabled)
    }
}

//! Per-frame composition for the system decoder.
//!
//! The decoder calls [`FrameCompositor::compose`] on its own render threads,
//! possibly for several frames at once. Each call snapshots the filter list
//! and runs it through a fresh set of filter instances. Results for a load
//! that is no longer current are dropped.

use std::sync::Arc;

use tracing::trace;
use vl_common::MediaTime;
use vl_effects::{FilterPipeline, RgbaImage};

use crate::traits::{BackendEvent, LoadContext};

/// One decoded frame to composite.
#[derive(Clone, Debug)]
pub struct CompositionRequest {
    pub source: Arc<RgbaImage>,
    pub presentation_time: MediaTime,
}

#[derive(Clone, Debug)]
pub enum CompositionResult {
    Rendered(Arc<RgbaImage>),
    /// Do not display anything for this request.
    Skip,
}

pub trait FrameCompositor: Send + Sync {
    fn compose(&self, request: CompositionRequest) -> CompositionResult;
}

/// Compositor running the filter pipeline for one load.
pub struct FilterCompositor {
    pipeline: FilterPipeline,
    ctx: LoadContext,
}

impl FilterCompositor {
    pub fn new(pipeline: FilterPipeline, ctx: LoadContext) -> Self {
        Self { pipeline, ctx }
    }
}

impl FrameCompositor for FilterCompositor {
    fn compose(&self, request: CompositionRequest) -> CompositionResult {
        if !self.ctx.is_current() {
            trace!(token = %self.ctx.token, "Skipping composition for stale load");
            return CompositionResult::Skip;
        }

        let filters = self.ctx.filters.snapshot();
        let frame = self.pipeline.apply(&filters, request.source);

        // The load may have been superseded while filters ran.
        if !self.ctx.is_current() {
            trace!(token = %self.ctx.token, "Discarding composited frame for stale load");
            return CompositionResult::Skip;
        }

        trace!(
            token = %self.ctx.token,
            time = %request.presentation_time,
            filters = filters.len(),
            "Composited frame"
        );
        self.ctx.events.emit(BackendEvent::FrameRendered {
            frame: Arc::clone(&frame),
            time: request.presentation_time,
        });
        CompositionResult::Rendered(frame)
    }
}

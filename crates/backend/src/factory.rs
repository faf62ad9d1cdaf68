//! Default [`BackendFactory`]: the host's system player plus libmpv.

use std::path::Path;

use vl_common::{PlaybackResult, SeekConfig};
use vl_effects::FilterPipeline;

use crate::primary::{PrimaryBackend, SystemPlayer};
use crate::secondary::SecondaryBackend;
use crate::traits::{BackendFactory, PlaybackBackend};

pub type SystemPlayerFactory = Box<dyn Fn() -> Box<dyn SystemPlayer>>;

pub struct NativeBackendFactory {
    system_player: SystemPlayerFactory,
    pipeline: FilterPipeline,
    seek: SeekConfig,
}

impl NativeBackendFactory {
    pub fn new(system_player: SystemPlayerFactory, pipeline: FilterPipeline, seek: SeekConfig) -> Self {
        Self {
            system_player,
            pipeline,
            seek,
        }
    }
}

impl BackendFactory for NativeBackendFactory {
    fn primary(&self) -> PlaybackResult<Box<dyn PlaybackBackend>> {
        Ok(Box::new(PrimaryBackend::new(
            (self.system_player)(),
            self.pipeline.clone(),
            &self.seek,
        )))
    }

    fn secondary(&self, library: &Path) -> PlaybackResult<Box<dyn PlaybackBackend>> {
        Ok(Box::new(SecondaryBackend::with_library(
            library.to_path_buf(),
            self.pipeline.clone(),
        )))
    }
}

//! The five pipeline stages. Each declares its output and knows how to
//! produce it; deciding *whether* to run belongs to the engine.

mod cleanup;
mod download;
mod process_text;
mod reduce_probes;
mod unpack;

pub use cleanup::{CREATED_MARKER, CleanupStage, REMOVED_MARKER};
pub use download::DownloadStage;
pub use process_text::ProcessTextStage;
pub use reduce_probes::{PROBE_COLUMNS_TO_DROP, ReduceProbesStage};
pub use unpack::UnpackStage;

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::geo::GeoClient;
use crate::layout::DatasetLayout;
use crate::oracle::OutputDescriptor;

/// Everything a stage may touch while running. Read-only for the stage.
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub layout: &'a DatasetLayout,
    pub geo: &'a dyn GeoClient,
    pub cancel: &'a CancelToken,
}

pub trait Stage {
    fn kind(&self) -> StageKind;

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor;

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError>;

    fn predecessor(&self) -> Option<StageKind> {
        self.kind().predecessor()
    }
}

pub fn stage_for(kind: StageKind) -> &'static dyn Stage {
    match kind {
        StageKind::Download => &DownloadStage,
        StageKind::Unpack => &UnpackStage,
        StageKind::ProcessText => &ProcessTextStage,
        StageKind::ReduceProbes => &ReduceProbesStage,
        StageKind::Cleanup => &CleanupStage,
    }
}

fn manifest_output(
    ctx: &StageContext<'_>,
    path: camino::Utf8PathBuf,
    listing_extension: &'static str,
) -> OutputDescriptor {
    OutputDescriptor::Manifest {
        path,
        listing_extension,
        non_empty: true,
        require_entries: ctx.config.empty_manifest.requires_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_kind() {
        for kind in StageKind::ALL {
            let stage = stage_for(kind);
            assert_eq!(stage.kind(), kind);
            assert_eq!(stage.predecessor(), kind.predecessor());
        }
    }
}

use std::fs;

use tracing::info;

use super::{Stage, StageContext};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::oracle::OutputDescriptor;

/// Fetches `{name}_RAW.tar` into the data directory.
pub struct DownloadStage;

impl Stage for DownloadStage {
    fn kind(&self) -> StageKind {
        StageKind::Download
    }

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor {
        OutputDescriptor::SingleFile {
            path: ctx.layout.archive_path(),
            extension: "tar",
            non_empty: true,
        }
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError> {
        let data_dir = ctx.layout.data_dir();
        fs::create_dir_all(data_dir.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {data_dir}: {err}")))?;

        let archive = ctx.layout.archive_path();
        let bytes = ctx.geo.download_series_archive(
            &ctx.config.dataset_series,
            &ctx.config.dataset_name,
            &archive,
            ctx.cancel,
        )?;
        info!(path = %archive, bytes, "series archive downloaded");
        Ok(())
    }
}

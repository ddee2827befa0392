use std::fmt::Write as _;

use tracing::info;

use super::{Stage, StageContext};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::fs_util;
use crate::manifest::read_manifest;
use crate::oracle::OutputDescriptor;

pub const CREATED_MARKER: &str = "Created files:";
pub const REMOVED_MARKER: &str = "Temporarily created and removed files:";

/// Deletes intermediate `.txt` files under the extraction directory and
/// writes `readme.txt` listing what was produced and what was removed.
pub struct CleanupStage;

impl CleanupStage {
    fn dataset_marker(ctx: &StageContext<'_>) -> String {
        format!("Dataset: {}", ctx.config.dataset_name)
    }
}

impl Stage for CleanupStage {
    fn kind(&self) -> StageKind {
        StageKind::Cleanup
    }

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor {
        OutputDescriptor::Report {
            path: ctx.layout.report_path(),
            markers: vec![
                Self::dataset_marker(ctx),
                CREATED_MARKER.to_string(),
                REMOVED_MARKER.to_string(),
            ],
        }
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError> {
        let created = read_manifest(&ctx.layout.reduced_manifest())?;

        let extract_dir = ctx.layout.extract_dir();
        let removed: Vec<String> =
            fs_util::remove_files_with_extension(extract_dir.as_std_path(), "txt")?
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect();
        info!(
            created = created.len(),
            removed = removed.len(),
            "intermediate files removed"
        );

        let mut report = String::new();
        let _ = writeln!(report, "{}", Self::dataset_marker(ctx));
        let _ = writeln!(report, "Generated: {}", chrono::Utc::now().to_rfc3339());
        let _ = writeln!(report);
        let _ = writeln!(report, "{CREATED_MARKER}");
        for path in &created {
            let _ = writeln!(report, "{path}");
        }
        let _ = writeln!(report);
        let _ = writeln!(report, "{REMOVED_MARKER}");
        for name in &removed {
            let _ = writeln!(report, "{name}");
        }

        fs_util::write_atomic(&ctx.layout.report_path(), report.as_bytes())
    }
}

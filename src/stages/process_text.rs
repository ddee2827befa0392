use tracing::{debug, info};

use super::{Stage, StageContext, manifest_output};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::manifest::{ManifestWriter, read_manifest};
use crate::oracle::OutputDescriptor;
use crate::table;

/// Splits every unpacked text file into one `{section}.tsv` per section.
pub struct ProcessTextStage;

impl Stage for ProcessTextStage {
    fn kind(&self) -> StageKind {
        StageKind::ProcessText
    }

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor {
        manifest_output(ctx, ctx.layout.tsv_manifest(), "tsv")
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError> {
        let sources = read_manifest(&ctx.layout.unpack_manifest())?;
        let mut manifest = ManifestWriter::create(&ctx.layout.tsv_manifest())?;

        for source in sources {
            ctx.cancel.check()?;
            let dir = source
                .parent()
                .ok_or_else(|| KiraError::Filesystem(format!("no parent directory: {source}")))?;
            let tables = table::read_sections(&source)?;
            debug!(source = %source, sections = tables.len(), "text file parsed");

            for table in tables {
                let output = dir.join(format!("{}.tsv", table.name));
                table::write_tsv(&table, &output)?;
                manifest.append(&output)?;
            }
        }

        info!(tables = manifest.len(), "sections written");
        manifest.commit()?;
        Ok(())
    }
}

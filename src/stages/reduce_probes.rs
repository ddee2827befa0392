use tracing::info;

use super::{Stage, StageContext, manifest_output};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::manifest::{ManifestWriter, read_manifest};
use crate::oracle::OutputDescriptor;
use crate::table;

pub const PROBE_COLUMNS_TO_DROP: [&str; 7] = [
    "Definition",
    "Ontology_Component",
    "Ontology_Process",
    "Ontology_Function",
    "Synonyms",
    "Obsolete_Probe_Id",
    "Probe_Sequence",
];

const PROBES_TABLE: &str = "Probes.tsv";
const REDUCED_TABLE: &str = "Probes_reduced.tsv";

/// Writes `Probes_reduced.tsv` beside every `Probes.tsv` with the annotation
/// columns removed.
///
/// Its manifest, `tmp_reduced.txt`, repeats every section table listed by
/// ProcessText and then the reduced tables, so Cleanup needs nothing older.
pub struct ReduceProbesStage;

impl Stage for ReduceProbesStage {
    fn kind(&self) -> StageKind {
        StageKind::ReduceProbes
    }

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor {
        manifest_output(ctx, ctx.layout.reduced_manifest(), "tsv")
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError> {
        let tables = read_manifest(&ctx.layout.tsv_manifest())?;
        let mut manifest = ManifestWriter::create(&ctx.layout.reduced_manifest())?;

        for path in &tables {
            manifest.append(path)?;
        }

        let probes = tables.iter().filter(|path| {
            path.file_name()
                .map(|name| name.contains(PROBES_TABLE))
                .unwrap_or(false)
        });
        for path in probes {
            ctx.cancel.check()?;
            let table = table::read_tsv(path)?;
            let reduced = table.drop_columns(&PROBE_COLUMNS_TO_DROP)?;
            let output = path.with_file_name(REDUCED_TABLE);
            table::write_tsv(&reduced, &output)?;
            info!(
                path = %output,
                rows = reduced.rows.len(),
                columns = reduced.columns.len(),
                "probe table reduced"
            );
            manifest.append(&output)?;
        }

        manifest.commit()?;
        Ok(())
    }
}

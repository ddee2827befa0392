use std::fs;

use tracing::{debug, info, warn};

use super::{Stage, StageContext, manifest_output};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::fs_util;
use crate::manifest::ManifestWriter;
use crate::oracle::OutputDescriptor;

/// Unpacks the series archive, one directory per member, gunzipping members
/// in place. Lists the resulting `.txt` files in `tmp.txt`.
pub struct UnpackStage;

impl Stage for UnpackStage {
    fn kind(&self) -> StageKind {
        StageKind::Unpack
    }

    fn output(&self, ctx: &StageContext<'_>) -> OutputDescriptor {
        manifest_output(ctx, ctx.layout.unpack_manifest(), "txt")
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<(), KiraError> {
        let archive = ctx.layout.archive_path();
        let extract_dir = ctx.layout.extract_dir();
        fs::create_dir_all(extract_dir.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {extract_dir}: {err}")))?;

        let mut manifest = ManifestWriter::create(&ctx.layout.unpack_manifest())?;
        let members = fs_util::extract_tar_members(&archive, &extract_dir)?;
        debug!(members = members.len(), "archive extracted");

        for member in members {
            ctx.cancel.check()?;
            let final_path = if member.path.extension() == Some("gz") {
                let decompressed = extract_dir.join(&member.base).join(&member.base);
                fs_util::gunzip_in_place(&member.path, &decompressed)?;
                decompressed
            } else {
                member.path
            };

            if final_path.extension() == Some("txt") {
                manifest.append(&final_path)?;
            } else {
                warn!(path = %final_path, "member is not a text file, left unlisted");
            }
        }

        info!(files = manifest.len(), "text files unpacked");
        manifest.commit()?;
        Ok(())
    }
}

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::StageKind;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid GEO series accession: {0}")]
    InvalidAccession(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GEO transfer failed: {0}")]
    Transfer(String),

    #[error("GEO returned status {status}: {message}")]
    TransferStatus { status: u16, message: String },

    #[error("corrupt archive: {0}")]
    Archive(String),

    #[error("failed to decompress archive member: {0}")]
    Decompress(String),

    #[error("malformed table: {0}")]
    Format(String),

    #[error("expected column missing: {0}")]
    Schema(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("stage {stage} ran but its output is still incomplete")]
    #[diagnostic(help("inspect the stage output on disk; this points to an I/O or logic defect"))]
    Incomplete { stage: StageKind },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("stage {stage} failed")]
    Stage {
        stage: StageKind,
        #[source]
        source: Box<KiraError>,
    },
}

impl KiraError {
    pub fn in_stage(self, stage: StageKind) -> Self {
        match self {
            KiraError::Stage { .. } | KiraError::Incomplete { .. } | KiraError::Cancelled => self,
            other => KiraError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a failure was attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            KiraError::Stage { stage, .. } | KiraError::Incomplete { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Underlying cause with any stage wrapping removed.
    pub fn root(&self) -> &KiraError {
        match self {
            KiraError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn stage_wrapping_keeps_cause() {
        let err = KiraError::Format("bad row".to_string()).in_stage(StageKind::ProcessText);
        assert_eq!(err.stage(), Some(StageKind::ProcessText));
        assert_matches!(err.root(), KiraError::Format(_));
    }

    #[test]
    fn stage_wrapping_is_not_nested() {
        let err = KiraError::Schema("Synonyms".to_string())
            .in_stage(StageKind::ReduceProbes)
            .in_stage(StageKind::Cleanup);
        assert_eq!(err.stage(), Some(StageKind::ReduceProbes));
    }
}

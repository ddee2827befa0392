use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

static SERIES_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^GSE[0-9]+$").expect("valid series accession regex"));

static SERIES_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^GSE[0-9]*nnn$").expect("valid series group regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoSeriesAccession(String);

impl GeoSeriesAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// FTP grouping directory of a series, e.g. `GSE68849` lives under `GSE68nnn`.
    pub fn series_group(&self) -> GeoSeriesGroup {
        let digits = self.0.trim_start_matches("GSE");
        if digits.len() <= 3 {
            return GeoSeriesGroup("GSEnnn".to_string());
        }
        let head = &digits[..digits.len() - 3];
        GeoSeriesGroup(format!("GSE{head}nnn"))
    }
}

impl fmt::Display for GeoSeriesAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeoSeriesAccession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !SERIES_ACCESSION.is_match(&normalized) {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoSeriesGroup(String);

impl GeoSeriesGroup {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeoSeriesGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeoSeriesGroup {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let normalized = match trimmed.strip_suffix("nnn") {
            Some(head) => format!("{}nnn", head.to_uppercase()),
            None => trimmed.to_uppercase(),
        };
        if !SERIES_GROUP.is_match(&normalized) {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// The five pipeline stages, in chain order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Download,
    Unpack,
    ProcessText,
    ReduceProbes,
    Cleanup,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Download,
        StageKind::Unpack,
        StageKind::ProcessText,
        StageKind::ReduceProbes,
        StageKind::Cleanup,
    ];

    pub fn predecessor(self) -> Option<StageKind> {
        match self {
            StageKind::Download => None,
            StageKind::Unpack => Some(StageKind::Download),
            StageKind::ProcessText => Some(StageKind::Unpack),
            StageKind::ReduceProbes => Some(StageKind::ProcessText),
            StageKind::Cleanup => Some(StageKind::ReduceProbes),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Download => "download",
            StageKind::Unpack => "unpack",
            StageKind::ProcessText => "process-text",
            StageKind::ReduceProbes => "reduce-probes",
            StageKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// What a manifest with zero entries means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmptyManifestPolicy {
    /// An empty manifest is a finished stage.
    Accept,
    /// An empty manifest leaves the stage incomplete.
    #[default]
    Reject,
}

impl EmptyManifestPolicy {
    pub fn requires_entries(self) -> bool {
        matches!(self, EmptyManifestPolicy::Reject)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_series_accession_valid() {
        let acc: GeoSeriesAccession = "gse68849".parse().unwrap();
        assert_eq!(acc.as_str(), "GSE68849");
    }

    #[test]
    fn parse_series_accession_invalid() {
        let err = "GSM1684095".parse::<GeoSeriesAccession>().unwrap_err();
        assert_matches!(err, KiraError::InvalidAccession(_));
    }

    #[test]
    fn series_group_from_accession() {
        let acc: GeoSeriesAccession = "GSE68849".parse().unwrap();
        assert_eq!(acc.series_group().as_str(), "GSE68nnn");

        let short: GeoSeriesAccession = "GSE12".parse().unwrap();
        assert_eq!(short.series_group().as_str(), "GSEnnn");
    }

    #[test]
    fn parse_series_group() {
        let group: GeoSeriesGroup = "gse68nnn".parse().unwrap();
        assert_eq!(group.as_str(), "GSE68nnn");
        assert!("GSE68849".parse::<GeoSeriesGroup>().is_err());
    }

    #[test]
    fn chain_order() {
        let mut chain = Vec::new();
        let mut current = Some(StageKind::Cleanup);
        while let Some(stage) = current {
            chain.push(stage);
            current = stage.predecessor();
        }
        chain.reverse();
        assert_eq!(chain, StageKind::ALL.to_vec());
    }
}

use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{EmptyManifestPolicy, GeoSeriesAccession, GeoSeriesGroup};
use crate::error::KiraError;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DATASET_SERIES: &str = "GSE68nnn";
pub const DEFAULT_DATASET_NAME: &str = "GSE68849";

/// On-disk form of `kira-gp.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub dataset_series: Option<String>,
    #[serde(default)]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub empty_manifest: Option<EmptyManifestPolicy>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<String>,
    pub dataset_series: Option<String>,
    pub dataset_name: Option<String>,
    pub empty_manifest: Option<EmptyManifestPolicy>,
    pub timeout_secs: Option<u64>,
}

/// Immutable settings shared by every stage of one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: Utf8PathBuf,
    pub dataset_series: GeoSeriesGroup,
    pub dataset_name: GeoSeriesAccession,
    pub empty_manifest: EmptyManifestPolicy,
    /// Download timeout; unset means no limit.
    pub timeout_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<Utf8PathBuf>, dataset_name: GeoSeriesAccession) -> Self {
        Self {
            data_dir: data_dir.into(),
            dataset_series: dataset_name.series_group(),
            dataset_name,
            empty_manifest: EmptyManifestPolicy::default(),
            timeout_secs: None,
        }
    }

    pub fn with_empty_manifest(mut self, policy: EmptyManifestPolicy) -> Self {
        self.empty_manifest = policy;
        self
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError> {
        let config = match path {
            Some(path) => {
                let config_path = PathBuf::from(path);
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| KiraError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError> {
        let data_dir = overrides
            .data_dir
            .or(config.data_dir)
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let dataset_name: GeoSeriesAccession = overrides
            .dataset_name
            .or(config.dataset_name)
            .as_deref()
            .unwrap_or(DEFAULT_DATASET_NAME)
            .parse()?;

        // An explicit series is taken as given; otherwise derive it, which for the
        // default accession yields the default series.
        let dataset_series = match overrides.dataset_series.or(config.dataset_series) {
            Some(series) => series.parse()?,
            None => dataset_name.series_group(),
        };

        Ok(PipelineConfig {
            data_dir: Utf8PathBuf::from(data_dir),
            dataset_series,
            dataset_name,
            empty_manifest: overrides
                .empty_manifest
                .or(config.empty_manifest)
                .unwrap_or_default(),
            timeout_secs: overrides.timeout_secs.or(config.timeout_secs),
        })
    }
}

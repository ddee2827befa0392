use camino::{Utf8Path, Utf8PathBuf};

use crate::config::PipelineConfig;

pub const UNPACK_MANIFEST: &str = "tmp.txt";
pub const TSV_MANIFEST: &str = "tmp_tsv.txt";
pub const REDUCED_MANIFEST: &str = "tmp_reduced.txt";
pub const REPORT_FILE: &str = "readme.txt";

/// Where every stage reads and writes, derived from the config alone.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    data_dir: Utf8PathBuf,
    dataset_name: String,
}

impl DatasetLayout {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            dataset_name: config.dataset_name.as_str().to_string(),
        }
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    /// `{data_dir}/{name}_RAW.tar`
    pub fn archive_path(&self) -> Utf8PathBuf {
        self.data_dir.join(format!("{}_RAW.tar", self.dataset_name))
    }

    /// `{data_dir}/{name}`
    pub fn extract_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(&self.dataset_name)
    }

    pub fn unpack_manifest(&self) -> Utf8PathBuf {
        self.extract_dir().join(UNPACK_MANIFEST)
    }

    pub fn tsv_manifest(&self) -> Utf8PathBuf {
        self.extract_dir().join(TSV_MANIFEST)
    }

    pub fn reduced_manifest(&self) -> Utf8PathBuf {
        self.extract_dir().join(REDUCED_MANIFEST)
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.data_dir.join(REPORT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let config = PipelineConfig::new("data", "GSE68849".parse().unwrap());
        let layout = DatasetLayout::new(&config);

        assert_eq!(layout.archive_path(), "data/GSE68849_RAW.tar");
        assert_eq!(layout.unpack_manifest(), "data/GSE68849/tmp.txt");
        assert_eq!(layout.tsv_manifest(), "data/GSE68849/tmp_tsv.txt");
        assert_eq!(layout.reduced_manifest(), "data/GSE68849/tmp_reduced.txt");
        assert_eq!(layout.report_path(), "data/readme.txt");
    }
}

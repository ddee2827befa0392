//! Checkpoint manifests: newline-delimited lists of artifact paths.
//!
//! A stage appends to `{manifest}.partial` while it runs and renames it onto
//! the manifest path once its last artifact is written. A stage that dies
//! half-way therefore leaves no manifest behind.

use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;

pub struct ManifestWriter {
    target: Utf8PathBuf,
    staging: Utf8PathBuf,
    entries: usize,
}

impl ManifestWriter {
    /// Starts a fresh manifest, discarding leftovers of an interrupted run.
    pub fn create(target: &Utf8Path) -> Result<Self, KiraError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
        }
        let staging = Utf8PathBuf::from(format!("{target}.partial"));
        for stale in [staging.as_path(), target] {
            if stale.as_std_path().exists() {
                fs::remove_file(stale.as_std_path())
                    .map_err(|err| KiraError::Filesystem(format!("remove {stale}: {err}")))?;
            }
        }
        // Touch the staging file so an empty manifest still commits.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(staging.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("open {staging}: {err}")))?;
        Ok(Self {
            target: target.to_path_buf(),
            staging,
            entries: 0,
        })
    }

    /// Appends one entry; the handle is held only for this call.
    pub fn append(&mut self, entry: &Utf8Path) -> Result<(), KiraError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.staging.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", self.staging)))?;
        writeln!(file, "{entry}")
            .and_then(|_| file.flush())
            .map_err(|err| KiraError::Filesystem(format!("append {}: {err}", self.staging)))?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn commit(self) -> Result<Utf8PathBuf, KiraError> {
        fs::rename(self.staging.as_std_path(), self.target.as_std_path()).map_err(|err| {
            KiraError::Filesystem(format!("commit {} -> {}: {err}", self.staging, self.target))
        })?;
        Ok(self.target)
    }
}

/// Reads manifest entries in insertion order, skipping blank lines.
pub fn read_manifest(path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, KiraError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read manifest {path}: {err}")))?;
    Ok(parse_entries(&content))
}

pub(crate) fn parse_entries(content: &str) -> Vec<Utf8PathBuf> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Utf8PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn entries_appear_only_after_commit() {
        let (_temp, root) = utf8_temp();
        let target = root.join("nested").join("tmp.txt");

        let mut writer = ManifestWriter::create(&target).unwrap();
        writer.append(Utf8Path::new("a/one.txt")).unwrap();
        writer.append(Utf8Path::new("a/one.txt")).unwrap();
        assert!(!target.as_std_path().exists());

        writer.commit().unwrap();
        let entries = read_manifest(&target).unwrap();
        assert_eq!(entries, vec!["a/one.txt", "a/one.txt"]);
    }

    #[test]
    fn create_discards_previous_manifest() {
        let (_temp, root) = utf8_temp();
        let target = root.join("tmp.txt");
        fs::write(target.as_std_path(), "old/entry.txt\n").unwrap();

        let writer = ManifestWriter::create(&target).unwrap();
        assert!(!target.as_std_path().exists());
        assert!(writer.is_empty());
        writer.commit().unwrap();
        assert!(read_manifest(&target).unwrap().is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let entries = parse_entries("x.tsv\n\n  \ny.tsv\n");
        assert_eq!(entries, vec!["x.tsv", "y.tsv"]);
    }
}

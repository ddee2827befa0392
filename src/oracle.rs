//! Completion oracle: decides from disk state alone whether a stage's
//! declared output is present and well formed. Nothing here writes.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::manifest;

/// Declared output of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDescriptor {
    SingleFile {
        path: Utf8PathBuf,
        extension: &'static str,
        non_empty: bool,
    },
    Manifest {
        path: Utf8PathBuf,
        listing_extension: &'static str,
        non_empty: bool,
        require_entries: bool,
    },
    Report {
        path: Utf8PathBuf,
        markers: Vec<String>,
    },
}

impl OutputDescriptor {
    pub fn path(&self) -> &Utf8Path {
        match self {
            OutputDescriptor::SingleFile { path, .. }
            | OutputDescriptor::Manifest { path, .. }
            | OutputDescriptor::Report { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Completion {
    Complete,
    Missing { path: Utf8PathBuf },
    NotAFile { path: Utf8PathBuf },
    WrongExtension { path: Utf8PathBuf, expected: String },
    Empty { path: Utf8PathBuf },
    Unreadable { path: Utf8PathBuf },
    NoEntries { path: Utf8PathBuf },
    EntryInvalid { entry: Utf8PathBuf, reason: Box<Completion> },
    MarkerMissing { path: Utf8PathBuf, marker: String },
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::Complete)
    }
}

pub fn is_complete(descriptor: &OutputDescriptor) -> bool {
    check(descriptor).is_complete()
}

pub fn check(descriptor: &OutputDescriptor) -> Completion {
    match descriptor {
        OutputDescriptor::SingleFile {
            path,
            extension,
            non_empty,
        } => check_file(path, extension, *non_empty),
        OutputDescriptor::Manifest {
            path,
            listing_extension,
            non_empty,
            require_entries,
        } => check_manifest(path, listing_extension, *non_empty, *require_entries),
        OutputDescriptor::Report { path, markers } => check_report(path, markers),
    }
}

fn check_file(path: &Utf8Path, extension: &str, non_empty: bool) -> Completion {
    let Ok(meta) = fs::metadata(path.as_std_path()) else {
        return Completion::Missing {
            path: path.to_path_buf(),
        };
    };
    if !meta.is_file() {
        return Completion::NotAFile {
            path: path.to_path_buf(),
        };
    }
    if path.extension() != Some(extension) {
        return Completion::WrongExtension {
            path: path.to_path_buf(),
            expected: extension.to_string(),
        };
    }
    if non_empty && meta.len() == 0 {
        return Completion::Empty {
            path: path.to_path_buf(),
        };
    }
    Completion::Complete
}

fn check_manifest(
    path: &Utf8Path,
    listing_extension: &str,
    non_empty: bool,
    require_entries: bool,
) -> Completion {
    let Ok(meta) = fs::metadata(path.as_std_path()) else {
        return Completion::Missing {
            path: path.to_path_buf(),
        };
    };
    if !meta.is_file() {
        return Completion::NotAFile {
            path: path.to_path_buf(),
        };
    }
    let Ok(content) = fs::read_to_string(path.as_std_path()) else {
        return Completion::Unreadable {
            path: path.to_path_buf(),
        };
    };
    let entries = manifest::parse_entries(&content);
    if entries.is_empty() && require_entries {
        return Completion::NoEntries {
            path: path.to_path_buf(),
        };
    }
    for entry in entries {
        let verdict = check_file(&entry, listing_extension, non_empty);
        if !verdict.is_complete() {
            return Completion::EntryInvalid {
                entry,
                reason: Box::new(verdict),
            };
        }
    }
    Completion::Complete
}

fn check_report(path: &Utf8Path, markers: &[String]) -> Completion {
    let Ok(meta) = fs::metadata(path.as_std_path()) else {
        return Completion::Missing {
            path: path.to_path_buf(),
        };
    };
    if !meta.is_file() {
        return Completion::NotAFile {
            path: path.to_path_buf(),
        };
    }
    let Ok(content) = fs::read_to_string(path.as_std_path()) else {
        return Completion::Unreadable {
            path: path.to_path_buf(),
        };
    };
    match markers.iter().find(|marker| !content.contains(marker.as_str())) {
        Some(marker) => Completion::MarkerMissing {
            path: path.to_path_buf(),
            marker: marker.clone(),
        },
        None => Completion::Complete,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    fn archive(path: Utf8PathBuf) -> OutputDescriptor {
        OutputDescriptor::SingleFile {
            path,
            extension: "tar",
            non_empty: true,
        }
    }

    fn tsv_manifest(path: Utf8PathBuf, require_entries: bool) -> OutputDescriptor {
        OutputDescriptor::Manifest {
            path,
            listing_extension: "tsv",
            non_empty: true,
            require_entries,
        }
    }

    #[test]
    fn single_file_rules() {
        let (_temp, root) = utf8_temp();
        let path = root.join("GSE1_RAW.tar");
        assert_matches!(check(&archive(path.clone())), Completion::Missing { .. });

        fs::write(path.as_std_path(), b"").unwrap();
        assert_matches!(check(&archive(path.clone())), Completion::Empty { .. });

        fs::write(path.as_std_path(), b"payload").unwrap();
        assert!(is_complete(&archive(path)));

        let wrong = root.join("GSE1_RAW.tar.gz");
        fs::write(wrong.as_std_path(), b"payload").unwrap();
        assert_matches!(check(&archive(wrong)), Completion::WrongExtension { .. });

        let dir = root.join("dir.tar");
        fs::create_dir(dir.as_std_path()).unwrap();
        assert_matches!(check(&archive(dir)), Completion::NotAFile { .. });
    }

    #[test]
    fn manifest_short_circuits_on_bad_entry() {
        let (_temp, root) = utf8_temp();
        let good = root.join("Probes.tsv");
        let empty = root.join("Controls.tsv");
        fs::write(good.as_std_path(), "ID\n1\n").unwrap();
        fs::write(empty.as_std_path(), "").unwrap();

        let manifest = root.join("tmp_tsv.txt");
        fs::write(manifest.as_std_path(), format!("{good}\n")).unwrap();
        assert!(is_complete(&tsv_manifest(manifest.clone(), true)));

        fs::write(manifest.as_std_path(), format!("{good}\n{empty}\n")).unwrap();
        let verdict = check(&tsv_manifest(manifest.clone(), true));
        assert_matches!(verdict, Completion::EntryInvalid { ref entry, .. } if *entry == empty);

        fs::remove_file(good.as_std_path()).unwrap();
        let verdict = check(&tsv_manifest(manifest, true));
        assert_matches!(verdict, Completion::EntryInvalid { ref entry, .. } if *entry == good);
    }

    #[test]
    fn empty_manifest_follows_policy() {
        let (_temp, root) = utf8_temp();
        let manifest = root.join("tmp_tsv.txt");
        fs::write(manifest.as_std_path(), "\n").unwrap();

        assert!(is_complete(&tsv_manifest(manifest.clone(), false)));
        assert_matches!(
            check(&tsv_manifest(manifest, true)),
            Completion::NoEntries { .. }
        );
    }

    #[test]
    fn report_needs_every_marker() {
        let (_temp, root) = utf8_temp();
        let path = root.join("readme.txt");
        let descriptor = OutputDescriptor::Report {
            path: path.clone(),
            markers: vec!["Created files:".to_string(), "Removed:".to_string()],
        };
        fs::write(path.as_std_path(), "Created files:\n").unwrap();
        assert_matches!(check(&descriptor), Completion::MarkerMissing { .. });

        fs::write(path.as_std_path(), "Created files:\nRemoved:\n").unwrap();
        assert!(is_complete(&descriptor));
    }

    #[test]
    fn unreadable_report_is_not_missing() {
        let (_temp, root) = utf8_temp();
        let path = root.join("readme.txt");
        let descriptor = OutputDescriptor::Report {
            path: path.clone(),
            markers: vec!["Created files:".to_string()],
        };
        assert_matches!(check(&descriptor), Completion::Missing { .. });

        fs::write(path.as_std_path(), b"Created files:\n\xff\xfe\n").unwrap();
        assert_matches!(check(&descriptor), Completion::Unreadable { .. });

        fs::remove_file(path.as_std_path()).unwrap();
        fs::create_dir(path.as_std_path()).unwrap();
        assert_matches!(check(&descriptor), Completion::NotAFile { .. });
    }
}

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::KiraError;

/// A regular-file member of a tar archive after it was written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMember {
    /// Member file name with its last extension removed.
    pub base: String,
    /// Where the member landed: `{member_dir}/{member path}`.
    pub path: Utf8PathBuf,
}

/// Extracts each regular-file member into its own `{target_dir}/{base}` directory.
pub fn extract_tar_members(
    tar_path: &Utf8Path,
    target_dir: &Utf8Path,
) -> Result<Vec<ExtractedMember>, KiraError> {
    let file = File::open(tar_path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open tar {tar_path}: {err}")))?;
    let mut archive = Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|err| KiraError::Archive(format!("{tar_path}: {err}")))?;

    let mut members = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|err| KiraError::Archive(format!("{tar_path}: {err}")))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let member_path = entry
            .path()
            .map_err(|err| KiraError::Archive(err.to_string()))?
            .into_owned();
        let member_path = Utf8PathBuf::from_path_buf(member_path)
            .map_err(|_| KiraError::Archive("non-utf8 member path in archive".to_string()))?;
        let file_name = member_path
            .file_name()
            .ok_or_else(|| KiraError::Archive(format!("member without file name: {member_path}")))?;
        let base = strip_last_extension(file_name).to_string();

        let member_dir = target_dir.join(&base);
        fs::create_dir_all(member_dir.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {member_dir}: {err}")))?;
        let unpacked = entry
            .unpack_in(member_dir.as_std_path())
            .map_err(|err| KiraError::Archive(format!("{member_path}: {err}")))?;
        if !unpacked {
            return Err(KiraError::Archive(format!(
                "member path traversal detected: {member_path}"
            )));
        }

        members.push(ExtractedMember {
            base,
            path: member_dir.join(&member_path),
        });
    }
    Ok(members)
}

/// Decompresses a gzip file to `destination` and deletes the compressed copy.
pub fn gunzip_in_place(source: &Utf8Path, destination: &Utf8Path) -> Result<(), KiraError> {
    let input = File::open(source.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open {source}: {err}")))?;
    let mut decoder = GzDecoder::new(input);
    let mut output = File::create(destination.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("create {destination}: {err}")))?;

    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = decoder
            .read(&mut buffer)
            .map_err(|err| KiraError::Decompress(format!("{source}: {err}")))?;
        if read == 0 {
            break;
        }
        output
            .write_all(&buffer[..read])
            .map_err(|err| KiraError::Filesystem(format!("write {destination}: {err}")))?;
    }
    output
        .flush()
        .map_err(|err| KiraError::Filesystem(format!("write {destination}: {err}")))?;
    drop(output);

    fs::remove_file(source.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("remove {source}: {err}")))?;
    Ok(())
}

/// Writes `content` next to `path` and renames it into place.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
    }
    let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
    fs::write(tmp_path.as_std_path(), content)
        .map_err(|err| KiraError::Filesystem(format!("write {tmp_path}: {err}")))?;
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("rename {tmp_path}: {err}")))?;
    Ok(())
}

/// Deletes every file below `root` whose extension is `ext`, returning the
/// deleted paths sorted.
pub fn remove_files_with_extension(root: &Path, ext: &str) -> Result<Vec<PathBuf>, KiraError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = walk_dir(root)?
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|value| value.to_str())
                .map(|value| value == ext)
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    for path in &files {
        fs::remove_file(path)
            .map_err(|err| KiraError::Filesystem(format!("remove {}: {err}", path.display())))?;
    }
    Ok(files)
}

pub fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, KiraError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path)
            .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}

fn strip_last_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn utf8_temp() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    fn gzip(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    fn write_tar(path: &Utf8Path, members: &[(&str, &[u8])]) {
        let file = File::create(path.as_std_path()).unwrap();
        let mut builder = tar::Builder::new(file);
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.finish().unwrap();
    }

    #[test]
    fn strips_only_last_extension() {
        assert_eq!(strip_last_extension("GSM1_probes.txt.gz"), "GSM1_probes.txt");
        assert_eq!(strip_last_extension("README"), "README");
        assert_eq!(strip_last_extension(".hidden"), ".hidden");
    }

    #[test]
    fn members_land_in_per_member_directories() {
        let (_temp, root) = utf8_temp();
        let tar_path = root.join("GSE1_RAW.tar");
        let compressed = gzip(b"[Heading]\na\tb\n");
        write_tar(
            &tar_path,
            &[
                ("GSM1_data.txt.gz", &compressed[..]),
                ("GSM2_notes.txt", &b"plain"[..]),
            ],
        );

        let target = root.join("GSE1");
        let members = extract_tar_members(&tar_path, &target).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].base, "GSM1_data.txt");
        assert_eq!(members[0].path, target.join("GSM1_data.txt/GSM1_data.txt.gz"));
        assert_eq!(members[1].path, target.join("GSM2_notes/GSM2_notes.txt"));

        let decompressed = target.join("GSM1_data.txt/GSM1_data.txt");
        gunzip_in_place(&members[0].path, &decompressed).unwrap();
        assert!(!members[0].path.as_std_path().exists());
        assert_eq!(
            fs::read_to_string(decompressed.as_std_path()).unwrap(),
            "[Heading]\na\tb\n"
        );
    }

    #[test]
    fn corrupt_gzip_is_a_decompress_error() {
        let (_temp, root) = utf8_temp();
        let source = root.join("bad.txt.gz");
        fs::write(source.as_std_path(), b"definitely not gzip").unwrap();
        let err = gunzip_in_place(&source, &root.join("bad.txt")).unwrap_err();
        assert_matches!(err, KiraError::Decompress(_));
    }

    #[test]
    fn truncated_tar_is_an_archive_error() {
        let (_temp, root) = utf8_temp();
        let tar_path = root.join("GSE1_RAW.tar");
        let mut bytes = vec![0u8; 100];
        bytes.extend_from_slice(b"garbage");
        fs::write(tar_path.as_std_path(), bytes).unwrap();
        let err = extract_tar_members(&tar_path, &root.join("out")).unwrap_err();
        assert_matches!(err, KiraError::Archive(_));
    }

    #[test]
    fn removes_only_matching_extension() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join("tmp.txt"), b"x").unwrap();
        fs::write(nested.join("raw.txt"), b"x").unwrap();
        fs::write(nested.join("Probes.tsv"), b"x").unwrap();

        let removed = remove_files_with_extension(temp.path(), "txt").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(nested.join("Probes.tsv").exists());
        assert!(!nested.join("raw.txt").exists());
    }
}

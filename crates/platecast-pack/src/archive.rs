//! Stored-mode ZIP assembly with atomic output (spec.md §4.6 "Atomic output").

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::{Error, Result};

/// One named byte-blob destined for an archive entry.
pub struct ArchiveEntry<'a> {
    pub name: String,
    pub data: &'a [u8],
}

/// Writes `entries` into a stored-mode ZIP at `output_path`, via a sibling
/// `.tmp` file that is fsynced then renamed into place. Any existing file at
/// `output_path` is removed first; a failure leaves no `output_path` behind.
pub fn write_archive(output_path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let tmp_path: PathBuf = {
        let mut p = output_path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    if output_path.exists() {
        fs::remove_file(output_path).map_err(|source| Error::Io {
            path: output_path.to_path_buf(),
            source,
        })?;
    }

    let write_result = (|| -> Result<()> {
        let file = File::create(&tmp_path).map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        let mut writer = ZipWriter::new(file);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Stored);

        for entry in entries {
            writer.start_file(entry.name.clone(), options)?;
            writer.write_all(entry.data).map_err(|source| Error::Io {
                path: tmp_path.clone(),
                source,
            })?;
        }

        let mut file = writer.finish()?;
        file.sync_all().map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, output_path).map_err(|source| Error::Io {
        path: output_path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_entries_and_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("plate.nanodlp");

        let plate_json = br#"{"ok":true}"#;
        let layer_png = [0xAAu8; 4];
        let entries = vec![
            ArchiveEntry {
                name: "plate.json".into(),
                data: plate_json,
            },
            ArchiveEntry {
                name: "1.png".into(),
                data: &layer_png,
            },
        ];

        write_archive(&output, &entries).unwrap();
        assert!(output.exists());
        assert!(!dir.path().join("plate.nanodlp.tmp").exists());

        let file = File::open(&output).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut contents = String::new();
        zip.by_name("plate.json")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, r#"{"ok":true}"#);
    }

    #[test]
    fn existing_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("plate.nanodlp");
        fs::write(&output, b"stale").unwrap();

        let entries = vec![ArchiveEntry {
            name: "plate.json".into(),
            data: b"{}",
        }];
        write_archive(&output, &entries).unwrap();

        let mut buf = Vec::new();
        File::open(&output).unwrap().read_to_end(&mut buf).unwrap();
        assert_ne!(buf, b"stale");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unpacking of firmware zip archives.

use std::fs::File;
use std::path::Path;

use tempfile::TempDir;

use crate::error::CombineError;

/// Creates a scratch directory and unpacks the archive at `zip_path` into it.
/// The directory and everything in it goes away when the returned `TempDir`
/// is dropped.
pub fn expand_to_temp(zip_path: &Path) -> Result<TempDir, CombineError> {
    let dir = tempfile::Builder::new()
        .prefix("mgos-combine-")
        .tempdir()
        .map_err(|e| {
            CombineError::io("failed to create temporary directory", e)
        })?;

    let count = expand(zip_path, dir.path())?;
    log::info!(
        "extracted {} files from {} to {}",
        count,
        zip_path.display(),
        dir.path().display(),
    );
    Ok(dir)
}

/// Writes every file in the archive at `zip_path` directly into `dest`,
/// dropping any directory structure. Returns the number of files written.
///
/// Only the base name of each entry is used, so two entries with the same
/// name in different directories end up as one file (the later entry wins).
/// Unix permissions recorded in the archive are applied to the extracted
/// files.
pub fn expand(zip_path: &Path, dest: &Path) -> Result<usize, CombineError> {
    let file = File::open(zip_path).map_err(|e| {
        CombineError::io(
            format!("failed to open firmware archive {}", zip_path.display()),
            e,
        )
    })?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = match Path::new(entry.name()).file_name() {
            Some(name) => name.to_owned(),
            None => {
                log::warn!("skipping archive entry with no file name: {:?}", entry.name());
                continue;
            }
        };
        let path = dest.join(name);

        let mut out = File::create(&path).map_err(|e| {
            CombineError::io(format!("failed to create {}", path.display()), e)
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            CombineError::io(format!("failed to extract {}", path.display()), e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Some(mode) = entry.unix_mode() {
                let perms = std::fs::Permissions::from_mode(mode);
                std::fs::set_permissions(&path, perms).map_err(|e| {
                    CombineError::io(
                        format!("failed to set permissions on {}", path.display()),
                        e,
                    )
                })?;
            }
        }

        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, FileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn flattens_directories() {
        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("fw.zip");
        write_zip(&zip_path, &[
            ("fw/", b""),
            ("fw/manifest.json", b"{}"),
            ("fw/bin/boot.bin", b"boot"),
            ("top.bin", b"top"),
        ]);

        let dest = tempfile::tempdir().unwrap();
        let count = expand(&zip_path, dest.path()).unwrap();

        assert_eq!(count, 3);
        assert_eq!(std::fs::read(dest.path().join("manifest.json")).unwrap(), b"{}");
        assert_eq!(std::fs::read(dest.path().join("boot.bin")).unwrap(), b"boot");
        assert_eq!(std::fs::read(dest.path().join("top.bin")).unwrap(), b"top");
        assert!(!dest.path().join("fw").exists());
    }

    #[test]
    fn later_entry_with_same_name_wins() {
        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("fw.zip");
        write_zip(&zip_path, &[
            ("a/fw.bin", b"first"),
            ("b/fw.bin", b"second"),
        ]);

        let dest = tempfile::tempdir().unwrap();
        expand(&zip_path, dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("fw.bin")).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn keeps_unix_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("fw.zip");
        let mut zip = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        zip.start_file(
            "tool.sh",
            FileOptions::default().unix_permissions(0o750),
        ).unwrap();
        zip.write_all(b"#!/bin/sh\n").unwrap();
        zip.finish().unwrap();

        let dest = tempfile::tempdir().unwrap();
        expand(&zip_path, dest.path()).unwrap();
        let mode = std::fs::metadata(dest.path().join("tool.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn missing_archive_is_io_failure() {
        let scratch = tempfile::tempdir().unwrap();
        assert!(matches!(
            expand(&scratch.path().join("nope.zip"), scratch.path()),
            Err(CombineError::Io { .. }),
        ));
    }

    #[test]
    fn garbage_archive_is_an_archive_error() {
        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("fw.zip");
        std::fs::write(&zip_path, b"this is not a zip file").unwrap();
        assert!(matches!(
            expand(&zip_path, scratch.path()),
            Err(CombineError::Archive(_)),
        ));
    }

    #[test]
    fn temp_dir_is_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("fw.zip");
        write_zip(&zip_path, &[("manifest.json", b"{}")]);

        let dir = expand_to_temp(&zip_path).unwrap();
        let path = dir.path().to_owned();
        assert!(path.join("manifest.json").is_file());
        drop(dir);
        assert!(!path.exists());
    }
}

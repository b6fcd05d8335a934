//! Zip extraction and packaging for source bundles.
//!
//! Extraction refuses entries whose names would resolve outside the
//! destination directory; a hostile archive cannot write through the
//! bundle root.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::BuildError;

/// Unpack an uploaded archive into `dest`, preserving relative paths.
///
/// `dest` must not yet exist; it is created by this call. Returns
/// `BuildError::Archive` for streams that are not a readable zip and
/// `BuildError::PathEscape` for entries using parent-directory traversal.
pub fn extract_archive(data: &[u8], dest: &Path) -> crate::error::Result<()> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| BuildError::Archive(e.to_string()))?;

    fs::create_dir(dest).map_err(|e| BuildError::BundleIo {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| BuildError::Archive(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(BuildError::PathEscape(entry.name().to_string()));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| BuildError::BundleIo {
                path: out_path.clone(),
                source: e,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::BundleIo {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut out = File::create(&out_path).map_err(|e| BuildError::BundleIo {
            path: out_path.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| BuildError::BundleIo {
            path: out_path.clone(),
            source: e,
        })?;
    }

    Ok(())
}

/// Package the files under `root` into a zip at `archive_path`.
///
/// Entry names are relative to `root`. The archive file itself is skipped
/// when it lives inside the tree being packaged.
pub fn pack_directory(root: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)
        .with_context(|| format!("failed to create archive: {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);
    add_directory(&mut writer, root, root, archive_path)?;
    writer
        .finish()
        .context("failed to finalize archive")?
        .flush()
        .context("failed to flush archive")?;
    Ok(())
}

fn add_directory(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
    archive_path: &Path,
) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path == archive_path {
            continue;
        }
        if path.is_dir() {
            add_directory(writer, root, &path, archive_path)?;
            continue;
        }
        let name = path
            .strip_prefix(root)
            .with_context(|| format!("entry {} outside archive root", path.display()))?
            .to_string_lossy()
            .replace('\\', "/");
        writer
            .start_file(name, SimpleFileOptions::default())
            .with_context(|| format!("failed to start archive entry for {}", path.display()))?;
        let mut source = File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        io::copy(&mut source, writer)
            .with_context(|| format!("failed to write archive entry for {}", path.display()))?;
    }
    Ok(())
}

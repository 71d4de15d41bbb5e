//! Folder packaging
//!
//! Zips a task folder into a single artifact. Symlinks and the submission
//! marker are never included; entry names are `/`-separated paths relative
//! to the folder root.

use crate::error::{Error, Result};
use crate::tracker::MARKER_FILE_NAME;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Summary of a written archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Number of file entries written
    pub entries: usize,
    /// Size of the artifact on disk, in bytes
    pub size_bytes: u64,
}

/// Leading entries of a folder, as they would be packed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePreview {
    /// Entry names, in archive order
    pub names: Vec<String>,
    /// Entries left out of `names`
    pub remaining: usize,
}

fn is_packed(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && entry.file_name() != MARKER_FILE_NAME
}

/// Regular files under `folder` in archive order, minus symlinks and the marker
fn packed_entries(folder: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.path_is_symlink())
        .filter(|entry| entry.as_ref().map_or(true, is_packed))
}

/// List the first `limit` entries `pack_folder` would write
pub fn preview(folder: &Path, limit: usize) -> Result<FilePreview> {
    if !folder.is_dir() {
        return Err(Error::NotFound(format!(
            "folder does not exist: {}",
            folder.display()
        )));
    }

    let mut preview = FilePreview::default();
    for entry in packed_entries(folder) {
        let entry = entry?;
        if preview.names.len() < limit {
            preview.names.push(entry_name(folder, entry.path())?);
        } else {
            preview.remaining += 1;
        }
    }
    Ok(preview)
}

/// Zip every regular file under `folder` into `output`
pub fn pack_folder(folder: &Path, output: &Path) -> Result<ArchiveStats> {
    if !folder.exists() {
        return Err(Error::NotFound(format!(
            "folder does not exist: {}",
            folder.display()
        )));
    }
    if !folder.is_dir() {
        return Err(Error::InvalidInput(format!(
            "path is not a directory: {}",
            folder.display()
        )));
    }

    let file = File::create(output)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut entries = 0;

    for entry in packed_entries(folder) {
        let entry = entry?;
        let path = entry.path();

        if path == output {
            continue;
        }

        let name = entry_name(folder, path)?;
        debug!(entry = %name, "adding archive entry");

        zip.start_file(name, options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
        entries += 1;
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    drop(writer);

    let size_bytes = std::fs::metadata(output)?.len();
    Ok(ArchiveStats {
        entries,
        size_bytes,
    })
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        Error::Internal(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;

    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::DateTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CollectionError;

pub const ARCHIVE_PREFIX: &str = "appd_logs_";

/// Name of the final download, e.g. `appd_logs_20250102_150405.zip`.
pub fn archive_file_name<Tz: chrono::TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}.zip", ARCHIVE_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

/// Zip the contents of `src` into `dest`, returning the number of entries written.
///
/// Entry names are relative to `src` and use `/` separators. Directories get their own
/// entries so that empty ones survive. `dest` may live inside `src`, it is never added
/// to itself.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<usize, CollectionError> {
    let file = File::create(dest).map_err(|e| CollectionError::io("creating", dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = |mode: u32| {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode)
    };

    let mut entries = Vec::new();
    collect_entries(src, src, dest, &mut entries)?;

    let archive_err = |source: zip::result::ZipError| CollectionError::Archive {
        path: dest.to_path_buf(),
        source,
    };

    for entry in &entries {
        match entry {
            Entry::Dir(name) => {
                zip.add_directory(name.as_str(), options(0o755))
                    .map_err(archive_err)?;
            }
            Entry::File(name, path) => {
                zip.start_file(name.as_str(), options(0o644)).map_err(archive_err)?;
                let mut input =
                    File::open(path).map_err(|e| CollectionError::io("reading", path, e))?;
                io::copy(&mut input, &mut zip)
                    .map_err(|e| CollectionError::io("compressing", path, e))?;
            }
        }
    }

    let mut writer = zip.finish().map_err(archive_err)?;
    io::Write::flush(&mut writer).map_err(|e| CollectionError::io("flushing", dest, e))?;

    Ok(entries.len())
}

enum Entry {
    Dir(String),
    File(String, PathBuf),
}

// Depth first, sorted by name so archives are reproducible.
fn collect_entries(
    root: &Path,
    dir: &Path,
    skip: &Path,
    entries: &mut Vec<Entry>,
) -> Result<(), CollectionError> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| CollectionError::io("listing", dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(|e| CollectionError::io("listing", dir, e))?;
    children.sort();

    for path in children {
        if path == skip {
            continue;
        }

        let name = entry_name(root, &path);
        let file_type = fs::symlink_metadata(&path)
            .map_err(|e| CollectionError::io("inspecting", &path, e))?
            .file_type();

        if file_type.is_dir() {
            entries.push(Entry::Dir(format!("{}/", name)));
            collect_entries(root, &path, skip, entries)?;
        } else if file_type.is_file() {
            entries.push(Entry::File(name, path));
        } else {
            tracing::debug!("Skipping non-regular file {}", path.display());
        }
    }

    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

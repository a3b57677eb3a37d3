//! Zip archives of directory trees.
//!
//! [`zip_tree`] stores a file or directory under its own base name, so
//! zipping `/data/run1` yields entries `run1/`, `run1/out.txt`, ...
//! [`unzip_archive`] extracts an archive below a destination directory and
//! refuses entries that would land outside it.

use std::fs::{self, File, OpenOptions};
use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("invalid file path: {0} escapes the destination")]
    PathTraversal(String),
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

fn io_err(path: &Utf8Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Default permissions for extracted files whose entry carries no mode.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Archive `source` (a file or a directory tree) into a new zip at `target`.
///
/// Entry names are relative to the parent of `source`; directories get a
/// trailing `/`. File contents are deflated. Any error while walking the
/// tree aborts the whole operation.
pub fn zip_tree(source: &Utf8Path, target: &Utf8Path) -> Result<(), ArchiveError> {
    // Lexical, not canonical: a symlinked source keeps its own name.
    let source = absolute_clean(source)?;
    let base = source.parent().unwrap_or(source.as_path()).to_path_buf();

    let mut entries = Vec::new();
    walk(&source, &mut entries)?;

    let file = File::create(target).map_err(io_err(target))?;
    let mut writer = ZipWriter::new(file);

    for entry in &entries {
        let name = entry_name(&base, &entry.path, entry.is_dir);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(entry.mode & 0o777)
            .large_file(needs_zip64(entry.len));

        if entry.is_dir {
            writer.add_directory(name, options)?;
            continue;
        }

        writer.start_file(name, options)?;
        let mut input = File::open(&entry.path).map_err(io_err(&entry.path))?;
        io::copy(&mut input, &mut writer).map_err(io_err(&entry.path))?;
    }

    writer.finish()?;
    tracing::debug!(%source, %target, entries = entries.len(), "archive written");
    Ok(())
}

/// Extract every entry of the zip at `source` below `destination`.
///
/// Directories are created as needed and existing files are truncated. An
/// entry whose resolved path is not strictly below `destination` fails with
/// [`ArchiveError::PathTraversal`] before anything is written for it. The
/// first bad entry aborts extraction; earlier entries stay on disk.
pub fn unzip_archive(source: &Utf8Path, destination: &Utf8Path) -> Result<(), ArchiveError> {
    let file = File::open(source).map_err(io_err(source))?;
    let mut archive = ZipArchive::new(file)?;

    let destination = absolute_clean(destination)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let target = contained_path(&destination, entry.name())?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mode = entry.unix_mode().map(|m| m & 0o777).unwrap_or(DEFAULT_FILE_MODE);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let mut output = options.open(&target).map_err(io_err(&target))?;
        io::copy(&mut entry, &mut output).map_err(io_err(&target))?;
    }

    tracing::debug!(%source, %destination, entries = archive.len(), "archive extracted");
    Ok(())
}

struct WalkEntry {
    path: Utf8PathBuf,
    is_dir: bool,
    mode: u32,
    len: u64,
}

/// Entries this large need zip64 headers.
fn needs_zip64(len: u64) -> bool {
    len >= u64::from(u32::MAX)
}

/// Depth-first, name-ordered walk that lists `path` before its children.
///
/// Symlinks to files are stored as the file they point at; symlinks to
/// directories are skipped so a link cycle cannot recurse forever.
fn walk(path: &Utf8Path, out: &mut Vec<WalkEntry>) -> Result<(), ArchiveError> {
    let link = path.symlink_metadata().map_err(io_err(path))?;
    let meta = path.metadata().map_err(io_err(path))?;

    if link.file_type().is_symlink() && meta.is_dir() && !out.is_empty() {
        tracing::warn!(%path, "skipping symlinked directory");
        return Ok(());
    }

    out.push(WalkEntry {
        path: path.to_path_buf(),
        is_dir: meta.is_dir(),
        mode: file_mode(&meta),
        len: meta.len(),
    });

    if !meta.is_dir() {
        return Ok(());
    }

    let mut children = Vec::new();
    for entry in path.read_dir_utf8().map_err(io_err(path))? {
        let entry = entry.map_err(io_err(path))?;
        children.push(entry.into_path());
    }
    children.sort();

    for child in children {
        walk(&child, out)?;
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() { 0o755 } else { DEFAULT_FILE_MODE }
}

/// Zip entry name of `path` relative to `base`, `/`-separated.
fn entry_name(base: &Utf8Path, path: &Utf8Path, is_dir: bool) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let mut name = relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/");
    if is_dir {
        name.push('/');
    }
    name
}

fn absolute_clean(path: &Utf8Path) -> Result<Utf8PathBuf, ArchiveError> {
    let absolute = std::path::absolute(path).map_err(io_err(path))?;
    let absolute = Utf8PathBuf::try_from(absolute)
        .map_err(|e| ArchiveError::NonUtf8Path(e.into_path_buf().display().to_string()))?;
    Ok(lexical_clean(&absolute))
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_clean(path: &Utf8Path) -> Utf8PathBuf {
    let mut cleaned = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                // ".." at the root stays at the root.
                cleaned.pop();
            }
            other => cleaned.push(other.as_str()),
        }
    }
    cleaned
}

/// Join an entry name onto `destination`, rejecting anything not strictly below it.
fn contained_path(destination: &Utf8Path, name: &str) -> Result<Utf8PathBuf, ArchiveError> {
    let resolved = lexical_clean(&destination.join(name));
    if resolved.as_path() == destination || !resolved.starts_with(destination) {
        return Err(ArchiveError::PathTraversal(name.to_string()));
    }
    Ok(resolved)
}

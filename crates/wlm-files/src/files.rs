//! Plain file accessors.

use std::fs::{self, File};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("file is not found: {0}")]
    NotFound(Utf8PathBuf),
    #[error("could not open {path}: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not create {path}: {source}")]
    Create {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not watch {path}: {source}")]
    Watch {
        path: Utf8PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl FileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FileError::NotFound(_))
    }
}

/// Open a file read-only.
///
/// A missing file is reported as [`FileError::NotFound`] so callers can
/// tell it apart from other I/O failures.
pub fn open(path: &Utf8Path) -> Result<File, FileError> {
    File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FileError::NotFound(path.to_path_buf())
        } else {
            FileError::Open {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Create (or truncate) a file for writing, creating parent directories first.
pub fn create(path: &Utf8Path) -> Result<File, FileError> {
    let create_err = |source| FileError::Create {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(create_err)?;
    }
    File::create(path).map_err(create_err)
}

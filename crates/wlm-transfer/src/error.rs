use camino::Utf8PathBuf;
use thiserror::Error;
use wlm_files::{ArchiveError, FileError};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("failed to connect to agent at {path}: {source}")]
    Connect {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind agent socket {path}: {source}")]
    Bind {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("agent reported an error: {0}")]
    Remote(String),
    #[error("connection closed before {0}")]
    UnexpectedEof(&'static str),
    #[error("unexpected message: {0}")]
    Protocol(String),
    #[error("path {0} has no file name")]
    InvalidPath(Utf8PathBuf),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

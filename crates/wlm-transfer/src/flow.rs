//! Whole-tree upload and download built on the agent's four operations.
//!
//! Every step must succeed; the first failure is returned and nothing that
//! was already written is cleaned up.

use camino::{Utf8Path, Utf8PathBuf};
use wlm_files::{unzip_archive, zip_tree};

use crate::client::TransferClient;
use crate::error::TransferError;

/// `<name>.zip` for the last component of `path`.
fn archive_name(path: &Utf8Path) -> Result<String, TransferError> {
    path.file_name()
        .map(|name| format!("{name}.zip"))
        .ok_or_else(|| TransferError::InvalidPath(path.to_path_buf()))
}

/// `<path>.zip`, next to `path`.
fn sibling_archive(path: &Utf8Path) -> Result<Utf8PathBuf, TransferError> {
    Ok(path.with_file_name(archive_name(path)?))
}

/// Push the local tree `from` into the agent's directory `to`.
///
/// The tree is archived to `<from>.zip` locally, uploaded as
/// `<to>/<name>.zip` and extracted by the agent into `to`. Returns the
/// remote archive path.
pub async fn upload(
    client: &TransferClient,
    from: &Utf8Path,
    to: &Utf8Path,
) -> Result<Utf8PathBuf, TransferError> {
    let local_archive = sibling_archive(from)?;
    let remote_archive = to.join(archive_name(from)?);

    tracing::info!("archiving {} into {}", from, local_archive);
    let (source, target) = (from.to_path_buf(), local_archive.clone());
    tokio::task::spawn_blocking(move || zip_tree(&source, &target)).await??;

    tracing::info!("uploading {} to {}", local_archive, remote_archive);
    let file = tokio::fs::File::open(&local_archive).await?;
    let sent = client.create_file(&remote_archive, file).await?;
    tracing::info!(bytes = sent, "upload finished");

    tracing::info!("extracting {} on the agent", remote_archive);
    client.unzip(&remote_archive, to).await?;
    Ok(remote_archive)
}

/// Pull the agent's tree `from` into the local directory `to`.
///
/// The agent archives `from` into `<from>.zip`, the archive is downloaded
/// to `<to>/<name>.zip` and extracted into `to`. Returns the local archive
/// path.
pub async fn download(
    client: &TransferClient,
    from: &Utf8Path,
    to: &Utf8Path,
) -> Result<Utf8PathBuf, TransferError> {
    let remote_archive = sibling_archive(from)?;
    let local_archive = to.join(archive_name(from)?);

    tracing::info!("archiving {} on the agent", from);
    client.zip(from, &remote_archive).await?;

    tracing::info!("downloading {} to {}", remote_archive, local_archive);
    tokio::fs::create_dir_all(to).await?;
    let mut file = tokio::fs::File::create(&local_archive).await?;
    let received = client.open_file(&remote_archive, &mut file).await?;
    drop(file);
    tracing::info!(bytes = received, "download finished");

    tracing::info!("extracting {} into {}", local_archive, to);
    let (source, dest) = (local_archive.clone(), to.to_path_buf());
    tokio::task::spawn_blocking(move || unzip_archive(&source, &dest)).await??;
    Ok(local_archive)
}

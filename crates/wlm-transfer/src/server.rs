//! Agent side of the transfer protocol.

use std::io;
use std::time::Duration;

use camino::Utf8Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use wlm_files::{create, open, unzip_archive, zip_tree};

use crate::conn::Connection;
use crate::error::TransferError;
use crate::proto::{Chunk, Request, Response};

/// Default number of file bytes carried by one chunk message.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Pause after an accept error caused by resource exhaustion.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Largest chunk that still fits a frame once base64 encoded.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferConfig {
    pub(crate) fn buffer(&self) -> Vec<u8> {
        vec![0u8; self.chunk_size.clamp(1, MAX_CHUNK_SIZE)]
    }
}

/// Serves archive and file requests against the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct Agent {
    config: TransferConfig,
}

impl Agent {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Bind the agent's socket, replacing a stale socket file left behind by
    /// an earlier run and creating the parent directory when needed.
    pub fn bind(socket_path: &Utf8Path) -> Result<UnixListener, TransferError> {
        let bind_err = |source| TransferError::Bind {
            path: socket_path.to_path_buf(),
            source,
        };

        if let Some(parent) = socket_path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(socket_path).map_err(bind_err)?;
        tracing::info!("agent listening on {}", socket_path);
        Ok(listener)
    }

    /// Accept connections forever, one request per connection.
    ///
    /// A failed accept is logged and retried; running out of descriptors or
    /// memory backs off for a moment first.
    pub async fn serve(&self, listener: UnixListener) -> Result<(), TransferError> {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    tracing::warn!("failed to accept connection: {}", e);
                    let delay = accept_backoff(&e);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
            };
            let config = self.config;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, config).await {
                    tracing::error!("transfer connection failed: {}", e);
                }
            });
        }
    }
}

/// Pause before the next accept. Errors tied to one peer retry at once;
/// anything else (EMFILE, ENFILE, ENOMEM) is resource pressure.
fn accept_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}

async fn handle_connection(stream: UnixStream, config: TransferConfig) -> Result<(), TransferError> {
    let mut conn = Connection::new(stream);
    let Some(request) = conn.recv::<Request>().await? else {
        tracing::debug!("client disconnected before sending a request");
        return Ok(());
    };
    tracing::debug!(?request, "handling request");

    match request {
        Request::Zip { path, target } => {
            let result = tokio::task::spawn_blocking(move || zip_tree(&path, &target)).await?;
            reply(&mut conn, result.map_err(TransferError::from)).await
        }
        Request::Unzip { source, path } => {
            let result = tokio::task::spawn_blocking(move || unzip_archive(&source, &path)).await?;
            reply(&mut conn, result.map_err(TransferError::from)).await
        }
        Request::CreateFile { path } => {
            let result = receive_file(&mut conn, &path).await;
            reply(&mut conn, result.map(|_| ())).await
        }
        Request::OpenFile { path } => send_file(&mut conn, &path, config).await,
    }
}

/// Send the final status of a request and close the sending side.
async fn reply(conn: &mut Connection, result: Result<(), TransferError>) -> Result<(), TransferError> {
    let response = match result {
        Ok(()) => Response::Ok,
        Err(e) => {
            tracing::warn!("request failed: {}", e);
            Response::error(e)
        }
    };
    conn.send(&response).await?;
    conn.finish().await
}

/// Write incoming chunks to `path` until the client closes its side.
async fn receive_file(conn: &mut Connection, path: &Utf8Path) -> Result<u64, TransferError> {
    let target = path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || create(&target)).await??;
    let mut file = tokio::fs::File::from_std(file);

    let mut written = 0u64;
    while let Some(chunk) = conn.recv::<Chunk>().await? {
        file.write_all(&chunk.content).await?;
        written += chunk.content.len() as u64;
    }
    file.flush().await?;

    tracing::info!(%path, bytes = written, "file received");
    Ok(written)
}

/// Stream `path` back in chunks, ending with a status trailer.
async fn send_file(
    conn: &mut Connection,
    path: &Utf8Path,
    config: TransferConfig,
) -> Result<(), TransferError> {
    let source = path.to_path_buf();
    let file = match tokio::task::spawn_blocking(move || open(&source)).await? {
        Ok(file) => file,
        Err(e) => return reply(conn, Err(e.into())).await,
    };
    let mut file = tokio::fs::File::from_std(file);

    let mut buf = config.buffer();
    let mut sent = 0u64;
    loop {
        let n = match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return reply(conn, Err(e.into())).await,
        };
        conn.send(&Response::Chunk {
            content: buf[..n].to_vec(),
        })
        .await?;
        sent += n as u64;
    }

    tracing::info!(%path, bytes = sent, "file sent");
    reply(conn, Ok(())).await
}

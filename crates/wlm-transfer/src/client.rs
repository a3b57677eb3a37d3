//! Client side of the transfer protocol.

use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::conn::Connection;
use crate::error::TransferError;
use crate::proto::{Chunk, Request, Response};
use crate::server::TransferConfig;

/// Talks to an agent over its unix socket, one connection per call.
#[derive(Debug, Clone)]
pub struct TransferClient {
    socket: Utf8PathBuf,
    config: TransferConfig,
}

impl TransferClient {
    pub fn new(socket: impl Into<Utf8PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            config: TransferConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    pub fn socket(&self) -> &Utf8Path {
        &self.socket
    }

    async fn connect(&self) -> Result<Connection, TransferError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|source| TransferError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        Ok(Connection::new(stream))
    }

    async fn call(&self, request: Request) -> Result<(), TransferError> {
        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        read_status(&mut conn, "the agent replied").await
    }

    /// Ask the agent to archive `path` into `target` on its filesystem.
    pub async fn zip(&self, path: &Utf8Path, target: &Utf8Path) -> Result<(), TransferError> {
        self.call(Request::Zip {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
        })
        .await
    }

    /// Ask the agent to extract `source` into `path` on its filesystem.
    pub async fn unzip(&self, source: &Utf8Path, path: &Utf8Path) -> Result<(), TransferError> {
        self.call(Request::Unzip {
            source: source.to_path_buf(),
            path: path.to_path_buf(),
        })
        .await
    }

    /// Upload everything `content` yields into `path` on the agent.
    ///
    /// Returns the number of bytes sent once the agent confirms the file was
    /// written.
    pub async fn create_file<R>(&self, path: &Utf8Path, mut content: R) -> Result<u64, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let mut conn = self.connect().await?;
        conn.send(&Request::CreateFile {
            path: path.to_path_buf(),
        })
        .await?;

        let mut buf = self.config.buffer();
        let mut sent = 0u64;
        let mut interrupted = false;
        loop {
            let n = content.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            // The agent stops reading when it cannot write the file; its
            // reply carries the reason.
            if let Err(e) = conn.send(&Chunk { content: buf[..n].to_vec() }).await {
                tracing::debug!("upload interrupted: {}", e);
                interrupted = true;
                break;
            }
            sent += n as u64;
        }
        if !interrupted {
            if let Err(e) = conn.finish().await {
                tracing::debug!("upload interrupted: {}", e);
                interrupted = true;
            }
        }

        read_status(&mut conn, "the upload was confirmed").await?;
        if interrupted {
            return Err(TransferError::Protocol(
                "agent confirmed an interrupted upload".to_string(),
            ));
        }
        tracing::debug!(%path, bytes = sent, "upload complete");
        Ok(sent)
    }

    /// Download `path` from the agent into `out`, returning the byte count.
    pub async fn open_file<W>(&self, path: &Utf8Path, out: &mut W) -> Result<u64, TransferError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut conn = self.connect().await?;
        conn.send(&Request::OpenFile {
            path: path.to_path_buf(),
        })
        .await?;

        let mut received = 0u64;
        loop {
            match conn.recv::<Response>().await? {
                Some(Response::Chunk { content }) => {
                    out.write_all(&content).await?;
                    received += content.len() as u64;
                }
                Some(Response::Ok) => break,
                Some(Response::Error { message }) => return Err(TransferError::Remote(message)),
                None => return Err(TransferError::UnexpectedEof("the download completed")),
            }
        }
        out.flush().await?;

        tracing::debug!(%path, bytes = received, "download complete");
        Ok(received)
    }
}

async fn read_status(conn: &mut Connection, expected: &'static str) -> Result<(), TransferError> {
    match conn.recv::<Response>().await? {
        Some(Response::Ok) => Ok(()),
        Some(Response::Error { message }) => Err(TransferError::Remote(message)),
        Some(Response::Chunk { .. }) => Err(TransferError::Protocol(
            "file content where a status was expected".to_string(),
        )),
        None => Err(TransferError::UnexpectedEof(expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Agent;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    fn utf8_dir(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
    }

    fn start_agent(dir: &Utf8Path, chunk_size: usize) -> TransferClient {
        let sock = dir.join("run/agent.sock");
        let listener = Agent::bind(&sock).unwrap();
        let config = TransferConfig { chunk_size };
        let agent = Agent::new(config);
        tokio::spawn(async move {
            let _ = agent.serve(listener).await;
        });
        TransferClient::new(sock).with_config(config)
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_upload_then_download_reassembles_chunks() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let client = start_agent(&dir, 7);
        let data = payload(1000);

        let remote = dir.join("remote/nested/blob.bin");
        let sent = client.create_file(&remote, data.as_slice()).await.unwrap();
        assert_eq!(sent, 1000);
        assert_eq!(std::fs::read(&remote).unwrap(), data);

        let mut out = Vec::new();
        let received = client.open_file(&remote, &mut out).await.unwrap();
        assert_eq!(received, 1000);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_empty_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let client = start_agent(&dir, 16);

        let remote = dir.join("empty");
        assert_eq!(client.create_file(&remote, &b""[..]).await.unwrap(), 0);
        assert!(remote.exists());

        let mut out = Vec::new();
        assert_eq!(client.open_file(&remote, &mut out).await.unwrap(), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_still_transfers() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let client = start_agent(&dir, 0);

        let remote = dir.join("small.txt");
        client.create_file(&remote, &b"abc"[..]).await.unwrap();
        let mut out = Vec::new();
        client.open_file(&remote, &mut out).await.unwrap();
        assert_eq!(out, b"abc");
    }

    #[tokio::test]
    async fn test_download_missing_file_is_remote_error() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let client = start_agent(&dir, 64);

        let mut out = Vec::new();
        let err = client
            .open_file(&dir.join("nope.zip"), &mut out)
            .await
            .unwrap_err();
        match err {
            TransferError::Remote(message) => assert!(message.contains("not found")),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_into_unwritable_path_is_remote_error() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        std::fs::write(dir.join("blocker"), "a file, not a directory").unwrap();
        let client = start_agent(&dir, 64);

        let err = client
            .create_file(&dir.join("blocker/out.bin"), &b"data"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Remote(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_remote_zip_and_unzip() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        std::fs::create_dir_all(dir.join("results/sub")).unwrap();
        std::fs::write(dir.join("results/sub/a.txt"), "alpha").unwrap();
        let client = start_agent(&dir, 64);

        let archive = dir.join("results.zip");
        client.zip(&dir.join("results"), &archive).await.unwrap();
        assert!(archive.exists());

        let out = dir.join("restored");
        client.unzip(&archive, &out).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(out.join("results/sub/a.txt")).unwrap(),
            "alpha"
        );
    }

    #[tokio::test]
    async fn test_remote_zip_of_missing_tree_fails() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let client = start_agent(&dir, 64);

        let err = client
            .zip(&dir.join("missing"), &dir.join("missing.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Remote(_)));
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket() {
        let temp = TempDir::new().unwrap();
        let client = TransferClient::new(utf8_dir(&temp).join("absent.sock"));
        let err = client
            .zip(Utf8Path::new("a"), Utf8Path::new("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_download_without_trailer_fails() {
        let temp = TempDir::new().unwrap();
        let sock = utf8_dir(&temp).join("broken.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let _request: Option<Request> = conn.recv().await.unwrap();
            conn.send(&Response::Chunk {
                content: b"partial".to_vec(),
            })
            .await
            .unwrap();
        });

        let client = TransferClient::new(sock);
        let mut out = Vec::new();
        let err = client
            .open_file(Utf8Path::new("/any"), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnexpectedEof(_)), "{err:?}");
        assert_eq!(out, b"partial");
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let temp = TempDir::new().unwrap();
        let sock = utf8_dir(&temp).join("agent.sock");
        std::fs::write(&sock, "stale").unwrap();

        let listener = Agent::bind(&sock).unwrap();
        drop(listener);
        assert!(Agent::bind(&sock).is_ok());
    }
}

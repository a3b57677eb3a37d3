//! Length-prefixed JSON framing over a unix stream.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::TransferError;

/// One end of an RPC connection. Each frame carries exactly one message.
pub(crate) struct Connection {
    reader: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    writer: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
}

impl Connection {
    pub(crate) fn new(stream: UnixStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: FramedRead::new(read, LengthDelimitedCodec::new()),
            writer: FramedWrite::new(write, LengthDelimitedCodec::new()),
        }
    }

    pub(crate) async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), TransferError> {
        let payload = serde_json::to_vec(message)?;
        self.writer.send(Bytes::from(payload)).await?;
        Ok(())
    }

    /// Next message, or `None` once the peer has closed its sending side.
    pub(crate) async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransferError> {
        match self.reader.next().await {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame?)?)),
            None => Ok(None),
        }
    }

    /// Flush and shut down the sending side; the peer sees end-of-stream.
    pub(crate) async fn finish(&mut self) -> Result<(), TransferError> {
        SinkExt::<Bytes>::close(&mut self.writer).await?;
        Ok(())
    }
}

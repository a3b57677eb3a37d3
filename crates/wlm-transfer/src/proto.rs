//! Messages exchanged between the transfer client and the agent.
//!
//! Every RPC opens its own connection and starts with one [`Request`].
//!
//! - `Zip` / `Unzip`: the agent answers with a single [`Response::Ok`] or
//!   [`Response::Error`].
//! - `CreateFile`: the client follows up with [`Chunk`]s and closes its
//!   sending side; the agent answers once it has seen the stream end.
//! - `OpenFile`: the agent sends [`Response::Chunk`]s, then `Ok` or `Error`
//!   as a trailer, then closes. A stream ending without a trailer is broken.
//!
//! Chunk boundaries mean nothing; receivers concatenate contents in order.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Archive `path` on the agent's filesystem into `target`.
    Zip { path: Utf8PathBuf, target: Utf8PathBuf },
    /// Extract the archive `source` into the directory `path`.
    Unzip { source: Utf8PathBuf, path: Utf8PathBuf },
    /// Upload: create `path` and fill it with the chunks that follow.
    CreateFile { path: Utf8PathBuf },
    /// Download: stream the contents of `path`.
    OpenFile { path: Utf8PathBuf },
}

/// A piece of file content sent by the client during `CreateFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// A piece of file content sent by the agent during `OpenFile`.
    Chunk {
        #[serde(with = "base64_bytes")]
        content: Vec<u8>,
    },
    Ok,
    Error { message: String },
}

impl Response {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Response::Error {
            message: err.to_string(),
        }
    }
}

/// Binary payloads travel as standard base64 strings inside JSON.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

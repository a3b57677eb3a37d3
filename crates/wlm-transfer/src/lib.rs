//! File transfer between a workstation and a remote Slurm login node.
//!
//! An [`Agent`] runs next to the cluster and serves four operations over a
//! unix socket; a [`TransferClient`] calls them, and [`flow`] chains them
//! into whole-tree [`upload`] and [`download`].

mod conn;

pub mod client;
pub mod error;
pub mod flow;
pub mod proto;
pub mod server;

pub use client::TransferClient;
pub use error::TransferError;
pub use flow::{download, upload};
pub use proto::{Chunk, Request, Response};
pub use server::{Agent, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, TransferConfig};

//! Filesystem plumbing shared by the scheduler client and the transfer agent.
//!
//! - [`archive`]: zip a directory tree, unzip with path-traversal checks
//! - [`files`]: open/create with a distinguished not-found error
//! - [`tail`]: follow a file that is still growing

pub mod archive;
pub mod files;
pub mod tail;

pub use archive::{ArchiveError, unzip_archive, zip_tree};
pub use files::{FileError, create, open};
pub use tail::TailReader;

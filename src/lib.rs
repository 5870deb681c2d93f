//! A user-space filesystem backed by fixed-size segment container files.
//!
//! See [`fs::Filesystem`] for the public entry point; the remaining
//! modules implement the on-disk engine beneath it, leaves first:
//! segment store, bitmap allocator, inode table, data block store,
//! directory layer, file block map, then path/tree operations.

pub mod bitmap;
pub mod block;
pub mod dir;
pub mod error;
pub mod filemap;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod ops;
pub mod path;
pub mod segment;

pub use error::{FsError, Result};
pub use fs::Filesystem;

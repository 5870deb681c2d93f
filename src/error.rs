use std::path::PathBuf;

use thiserror::Error;

/// Errors recognised by the core engine.
///
/// Every public operation in this crate returns one of these instead of
/// panicking; the binary is responsible for turning them into the stderr
/// diagnostics and exit codes described by the command-line surface.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("segment i/o error at {path}: {source}")]
    Segment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory is full (direct block fan-out exhausted)")]
    DirectoryFull,

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("path component is not a directory: {0}")]
    NotADirectory(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

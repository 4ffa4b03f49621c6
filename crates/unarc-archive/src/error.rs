use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format: '{name}'")]
    UnsupportedFormat { name: String },

    #[error("entry '{entry}' escapes the archive root")]
    UnsafePath { entry: String },

    #[error("entry path is empty or contains a null byte: '{entry}'")]
    InvalidPath { entry: String },

    #[error("archive '{path}' is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("failed to read entry '{entry}': {reason}")]
    EntryRead { entry: String, reason: String },

    #[error("failed to open archive '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Archive container variants understood by [`crate::ArchiveReader`].
///
/// The variant is chosen from the file extension, never from content, so an
/// unrecognized name is rejected before anything is downloaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    /// Classify an object or file name by its extension (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = extension(name).map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("zip") => Ok(Self::Zip),
            Some("7z") => Ok(Self::SevenZip),
            _ => Err(Error::UnsupportedFormat {
                name: name.to_string(),
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_name(&path.to_string_lossy())
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::SevenZip => write!(f, "7z"),
        }
    }
}

/// Base name of an archive with its extension removed: `dir/data.zip` -> `data`.
pub fn archive_stem(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    }
}

fn extension(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next()?;
    match base.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&base[dot + 1..]),
    }
}

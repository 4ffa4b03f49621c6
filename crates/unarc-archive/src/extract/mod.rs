//! Entry readers for the supported container formats.
//!
//! Both variants expose the same capability: entry metadata up front, then an
//! ordered pass that hands each entry's decompressed bytes to a visitor.
//! Solid 7z blocks can only be decoded front to back, so the pass is the one
//! streaming primitive shared by every format.

use std::fs::File;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;

use crate::entry::ArchiveEntry;
use crate::error::{Error, Result};
use crate::format::ArchiveFormat;

#[cfg(feature = "7z")]
mod sevenz;
#[cfg(feature = "zip")]
mod zip;

#[cfg(feature = "7z")]
pub use sevenz::SevenZipSource;
#[cfg(feature = "zip")]
pub use zip::ZipSource;

/// Options applied while reading entry names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Treat `\` in zip member names as a directory separator.
    pub legacy_separators: bool,
}

impl OpenOptions {
    pub fn legacy_separators(mut self, yes: bool) -> Self {
        self.legacy_separators = yes;
        self
    }
}

/// Archive-specific entry source.
pub trait EntrySource {
    fn format(&self) -> ArchiveFormat;

    /// All entries in archive order.
    fn entries(&self) -> &[ArchiveEntry];

    /// Stream every entry, in archive order, through `visit`.
    ///
    /// Directory entries are visited with an empty reader. Returning
    /// `ControlFlow::Break` stops the pass early without error.
    fn for_each_entry<E, F>(&mut self, visit: F) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnMut(&ArchiveEntry, &mut dyn Read) -> std::result::Result<ControlFlow<()>, E>;
}

/// An opened archive of any supported format.
pub enum ArchiveReader {
    #[cfg(feature = "zip")]
    Zip(ZipSource<File>),
    #[cfg(feature = "7z")]
    SevenZip(SevenZipSource<File>),
}

impl ArchiveReader {
    /// Open `path`, picking the format from its extension.
    pub fn open(path: &Path, options: &OpenOptions) -> Result<Self> {
        let format = ArchiveFormat::from_path(path)?;
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), %format, "opening archive");
        match format {
            #[cfg(feature = "zip")]
            ArchiveFormat::Zip => Ok(Self::Zip(ZipSource::new(file, path, options)?)),
            #[cfg(feature = "7z")]
            ArchiveFormat::SevenZip => Ok(Self::SevenZip(SevenZipSource::new(file, path)?)),
            #[allow(unreachable_patterns)]
            _ => Err(Error::UnsupportedFormat {
                name: path.display().to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&ArchiveEntry> {
        self.entries().get(index)
    }

    /// Largest file entry accepted by `keep`, if any.
    pub fn largest_file(
        &self,
        mut keep: impl FnMut(&ArchiveEntry) -> bool,
    ) -> Option<&ArchiveEntry> {
        self.entries()
            .iter()
            .filter(|e| e.is_file() && keep(e))
            .fold(None, |best: Option<&ArchiveEntry>, e| match best {
                Some(b) if b.size >= e.size => Some(b),
                _ => Some(e),
            })
    }
}

impl EntrySource for ArchiveReader {
    fn format(&self) -> ArchiveFormat {
        match self {
            #[cfg(feature = "zip")]
            Self::Zip(source) => source.format(),
            #[cfg(feature = "7z")]
            Self::SevenZip(source) => source.format(),
        }
    }

    fn entries(&self) -> &[ArchiveEntry] {
        match self {
            #[cfg(feature = "zip")]
            Self::Zip(source) => source.entries(),
            #[cfg(feature = "7z")]
            Self::SevenZip(source) => source.entries(),
        }
    }

    fn for_each_entry<E, F>(&mut self, visit: F) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnMut(&ArchiveEntry, &mut dyn Read) -> std::result::Result<ControlFlow<()>, E>,
    {
        match self {
            #[cfg(feature = "zip")]
            Self::Zip(source) => source.for_each_entry(visit),
            #[cfg(feature = "7z")]
            Self::SevenZip(source) => source.for_each_entry(visit),
        }
    }
}

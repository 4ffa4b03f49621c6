use std::io::{Read, Seek};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::entry::{ArchiveEntry, EntryKind};
use crate::error::{Error, Result};
use crate::extract::{EntrySource, OpenOptions};
use crate::format::ArchiveFormat;
use crate::sanitize::{normalize_separators, sanitize_entry_name};

pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
    path: PathBuf,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R, path: &Path, options: &OpenOptions) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader).map_err(|e| Error::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            // Raw access reads only the central directory record, nothing is inflated.
            let file = archive.by_index_raw(index).map_err(|e| Error::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

            let mut name = decode_name(file.name_raw(), file.name());
            if options.legacy_separators {
                name = normalize_separators(&name);
            }
            let kind = if file.is_dir() || name.ends_with('/') {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(ArchiveEntry::new(sanitize_entry_name(&name)?, file.size(), kind));
        }

        Ok(Self {
            archive,
            entries,
            path: path.to_path_buf(),
        })
    }

    /// Random access to a single entry's content.
    pub fn open_entry(&mut self, index: usize) -> Result<impl Read + '_> {
        let entry = self.entries.get(index).ok_or_else(|| Error::Corrupted {
            path: self.path.clone(),
            reason: format!("no entry at index {index}"),
        })?;
        self.archive.by_index(index).map_err(|e| Error::EntryRead {
            entry: entry.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    fn for_each_entry<E, F>(&mut self, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnMut(&ArchiveEntry, &mut dyn Read) -> std::result::Result<ControlFlow<()>, E>,
    {
        for (index, entry) in self.entries.iter().enumerate() {
            let mut file = self.archive.by_index(index).map_err(|e| Error::EntryRead {
                entry: entry.path.clone(),
                reason: e.to_string(),
            })?;
            if visit(entry, &mut file)?.is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// Member names without the UTF-8 flag are often Shift-JIS from older
/// Japanese Windows tools; fall back to the crate's CP437 decoding otherwise.
fn decode_name(raw: &[u8], fallback: &str) -> String {
    if let Ok(name) = std::str::from_utf8(raw) {
        return name.to_string();
    }
    match encoding_rs::SHIFT_JIS.decode_without_bom_handling_and_without_replacement(raw) {
        Some(name) => name.into_owned(),
        None => fallback.to_string(),
    }
}

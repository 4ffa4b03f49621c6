use std::io::{self, Read, Seek, SeekFrom};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};

use crate::entry::{ArchiveEntry, EntryKind};
use crate::error::{Error, Result};
use crate::extract::EntrySource;
use crate::format::ArchiveFormat;
use crate::sanitize::sanitize_entry_name;

pub struct SevenZipSource<R: Read + Seek> {
    reader: SevenZReader<R>,
    entries: Vec<ArchiveEntry>,
    path: PathBuf,
}

impl<R: Read + Seek> SevenZipSource<R> {
    pub fn new(mut reader: R, path: &Path) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.rewind()?;

        let reader =
            SevenZReader::new(reader, len, Password::empty()).map_err(|e| Error::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let entries = reader
            .archive()
            .files
            .iter()
            .map(to_entry)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            reader,
            entries,
            path: path.to_path_buf(),
        })
    }
}

impl<R: Read + Seek> EntrySource for SevenZipSource<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Solid blocks are decoded front to back, so entries arrive in block
    /// order followed by empty files and directories.
    ///
    /// Entries in a solid block share one decoder stream: whatever the visitor
    /// leaves unread is drained before the next entry is handed out.
    fn for_each_entry<E, F>(&mut self, mut visit: F) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnMut(&ArchiveEntry, &mut dyn Read) -> std::result::Result<ControlFlow<()>, E>,
    {
        let mut failure: Option<E> = None;
        // A block stopping early does not stop the blocks after it.
        let mut stopped = false;
        let pass = self.reader.for_each_entries(|file, content| {
            if stopped {
                return Ok(false);
            }
            let step = to_entry(file).map_err(E::from).and_then(|entry| {
                let flow = visit(&entry, content)?;
                if flow.is_continue() {
                    drain(&entry, content)?;
                }
                Ok(flow)
            });
            match step {
                Ok(ControlFlow::Continue(())) => Ok(true),
                Ok(ControlFlow::Break(())) => {
                    stopped = true;
                    Ok(false)
                }
                Err(e) => {
                    failure = Some(e);
                    stopped = true;
                    Ok(false)
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        pass.map_err(|e| {
            Error::Corrupted {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Read the rest of `content` so the shared block stream lines up with the
/// next entry. Also runs the entry's CRC check.
fn drain(entry: &ArchiveEntry, content: &mut dyn Read) -> Result<()> {
    io::copy(content, &mut io::sink()).map_err(|e| Error::EntryRead {
        entry: entry.path.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn to_entry(file: &SevenZArchiveEntry) -> Result<ArchiveEntry> {
    let kind = if file.is_directory() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Ok(ArchiveEntry::new(sanitize_entry_name(file.name())?, file.size(), kind))
}

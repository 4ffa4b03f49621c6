//! Entry selection and destination layout.
//!
//! Everything here is pure: the extraction stage asks [`Layout::admits`] and
//! [`Layout::rewrite`] for each entry and never inspects the policy flags itself.

use std::collections::HashMap;

use crate::entry::ArchiveEntry;
use crate::format::archive_stem;

const JUNK_DIRS: &[&str] = &["__MACOSX"];
const JUNK_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "__MACOSX"];

/// User-facing toggles that shape which entries are kept and where they land.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryPolicy {
    /// Keep OS-generated metadata such as `__MACOSX/` and `Thumbs.db`.
    pub include_junk: bool,
    /// Drop a top-level directory that repeats the archive name.
    pub skip_top: bool,
}

impl EntryPolicy {
    pub fn include_junk(mut self, yes: bool) -> Self {
        self.include_junk = yes;
        self
    }

    pub fn skip_top(mut self, yes: bool) -> Self {
        self.skip_top = yes;
        self
    }
}

/// True when `path` is OS-generated metadata rather than user content.
pub fn is_junk(path: &str) -> bool {
    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            return JUNK_FILES.contains(&component);
        }
        if JUNK_DIRS.contains(&component) {
            return true;
        }
    }
    false
}

/// Resolved layout for one archive: every kept entry is placed under a
/// directory named after the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: String,
    strip_top: bool,
    include_junk: bool,
}

impl Layout {
    /// Decide the layout for `entries` of the archive called `archive_name`.
    ///
    /// With `skip_top`, the leading directory is stripped only when every kept
    /// file already lives under a directory named like the archive.
    pub fn plan(archive_name: &str, entries: &[ArchiveEntry], policy: &EntryPolicy) -> Self {
        let root = archive_stem(archive_name).to_string();
        let include_junk = policy.include_junk;
        let strip_top = policy.skip_top
            && entries
                .iter()
                .filter(|e| e.is_file() && (include_junk || !is_junk(&e.path)))
                .all(|e| e.path.split_once('/').map(|(top, _)| top) == Some(root.as_str()));

        Self {
            root,
            strip_top,
            include_junk,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn strips_top(&self) -> bool {
        self.strip_top
    }

    pub fn admits(&self, path: &str) -> bool {
        self.include_junk || !is_junk(path)
    }

    /// First admitted entry whose destination path an earlier entry already
    /// claims. Directories may repeat; anything involving a file may not.
    pub fn find_duplicate<'a>(&self, entries: &'a [ArchiveEntry]) -> Option<&'a ArchiveEntry> {
        let mut claimed: HashMap<String, bool> = HashMap::new();
        entries.iter().filter(|e| self.admits(&e.path)).find(|e| {
            match claimed.insert(self.rewrite(&e.path), e.is_directory()) {
                Some(was_directory) => !(was_directory && e.is_directory()),
                None => false,
            }
        })
    }

    /// Destination-relative path for an archive-relative `path`.
    pub fn rewrite(&self, path: &str) -> String {
        let rest = if self.strip_top {
            match path.strip_prefix(self.root.as_str()) {
                Some("") => "",
                Some(tail) if tail.starts_with('/') => &tail[1..],
                _ => path,
            }
        } else {
            path
        };

        if rest.is_empty() {
            self.root.clone()
        } else {
            format!("{}/{}", self.root, rest)
        }
    }
}

use std::path::{Path, PathBuf};

/// One file or directory record inside an archive.
///
/// `path` is archive-relative, already sanitized, and always uses `/` as the
/// separator so it can be joined onto an object-name prefix as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub kind: EntryKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, size: u64, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            size,
            kind,
        }
    }

    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self::new(path, size, EntryKind::File)
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, 0, EntryKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Local location of this entry below `root`.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        local_path(root, &self.path)
    }
}

/// Join a `/`-separated relative path onto a local directory.
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(relative.split('/').filter(|part| !part.is_empty()));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kinds() {
        let file = ArchiveEntry::file("b/c.txt", 20);
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert_eq!(file.size, 20);

        let dir = ArchiveEntry::directory("b");
        assert!(dir.is_directory());
        assert_eq!(dir.size, 0);
    }

    #[test]
    fn local_path_uses_platform_separators() {
        let root = Path::new("staging");
        let entry = ArchiveEntry::file("data/b/c.txt", 1);
        assert_eq!(
            entry.local_path(root),
            Path::new("staging").join("data").join("b").join("c.txt")
        );
    }
}

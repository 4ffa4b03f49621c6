use std::collections::BTreeMap;
use std::path::PathBuf;

use unarc_archive::{EntryPolicy, OpenOptions};

use crate::transcode::GzipPolicy;

pub const DEFAULT_WORKERS: usize = 24;
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_DISK_LIMIT: u64 = 50 * 1024 * 1024 * 1024;

/// Settings for one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Concurrent uploads.
    pub workers: usize,
    /// Copy buffer used for staging and uploading.
    pub buffer_size: usize,
    /// Chunk size handed to the destination store.
    pub chunk_size: usize,
    /// Upper bound on bytes staged on local disk at once.
    pub disk_limit: u64,
    /// Parent for the run's scratch directory; the system temp dir if unset.
    pub staging_dir: Option<PathBuf>,
    pub gzip: GzipPolicy,
    /// Attached to every uploaded object.
    pub metadata: BTreeMap<String, String>,
    pub entries: EntryPolicy,
    pub open: OpenOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            disk_limit: DEFAULT_DISK_LIMIT,
            staging_dir: None,
            gzip: GzipPolicy::default(),
            metadata: BTreeMap::new(),
            entries: EntryPolicy::default(),
            open: OpenOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn disk_limit(mut self, bytes: u64) -> Self {
        self.disk_limit = bytes;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn gzip(mut self, policy: GzipPolicy) -> Self {
        self.gzip = policy;
        self
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn include_junk(mut self, yes: bool) -> Self {
        self.entries = self.entries.include_junk(yes);
        self
    }

    pub fn skip_top(mut self, yes: bool) -> Self {
        self.entries = self.entries.skip_top(yes);
        self
    }

    pub fn legacy_separators(mut self, yes: bool) -> Self {
        self.open = self.open.legacy_separators(yes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.workers, 24);
        assert_eq!(config.buffer_size, 512 * 1024);
        assert_eq!(config.chunk_size, 16 * 1024 * 1024);
        assert_eq!(config.disk_limit, 50 << 30);
        assert!(!config.entries.include_junk);
        assert!(!config.open.legacy_separators);
    }

    #[test]
    fn builder_clamps_counts() {
        let config = PipelineConfig::default().workers(0).buffer_size(0).skip_top(true);
        assert_eq!(config.workers, 1);
        assert_eq!(config.buffer_size, 1);
        assert!(config.entries.skip_top);
    }
}

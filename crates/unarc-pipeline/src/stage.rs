//! Sequential extraction of archive entries into the staging directory.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unarc_archive::{ArchiveEntry, EntrySource, Layout, local_path};

use crate::error::{PipelineError, Result};
use crate::metrics::RunMetrics;
use crate::quota::{AcquireError, DiskQuota, QuotaReservation};

/// A staged file ready for upload.
///
/// Owns the quota reservation for its bytes until the upload finishes.
#[derive(Debug)]
pub struct StagingJob {
    /// Destination-relative path, `/`-separated.
    pub relative: String,
    pub local: PathBuf,
    pub reservation: QuotaReservation,
}

/// Walks an archive in order, staging each admitted file under quota.
///
/// Runs on a blocking thread; quota waits are driven through `runtime`.
pub(crate) struct Producer {
    pub root: PathBuf,
    pub layout: Layout,
    pub quota: Arc<DiskQuota>,
    pub cancel: CancellationToken,
    pub jobs: mpsc::Sender<StagingJob>,
    pub buffer_size: usize,
    pub runtime: Handle,
    pub metrics: Arc<RunMetrics>,
}

impl Producer {
    pub fn run<S: EntrySource>(self, source: &mut S) -> Result<()> {
        let mut buffer = vec![0u8; self.buffer_size.max(1)];
        source.for_each_entry(|entry, content| {
            if self.cancel.is_cancelled() {
                return Ok(ControlFlow::Break(()));
            }
            if !self.layout.admits(&entry.path) {
                tracing::debug!(entry = %entry.path, "skipping junk entry");
                return Ok(ControlFlow::Continue(()));
            }

            let relative = self.layout.rewrite(&entry.path);
            let local = local_path(&self.root, &relative);
            if entry.is_directory() {
                fs::create_dir_all(&local).map_err(|e| PipelineError::staging(&local, e))?;
                return Ok(ControlFlow::Continue(()));
            }

            let acquired = self.runtime.block_on(self.quota.acquire(entry.size, &self.cancel));
            let reservation = match acquired {
                Ok(reservation) => reservation,
                Err(AcquireError::Cancelled) => return Ok(ControlFlow::Break(())),
                Err(AcquireError::ExceedsLimit { limit, .. }) => {
                    return Err(PipelineError::InsufficientQuota {
                        entry: entry.path.clone(),
                        size: entry.size,
                        limit,
                    });
                }
            };
            if self.cancel.is_cancelled() {
                return Ok(ControlFlow::Break(()));
            }

            if let Err(e) = stage_file(entry, content, &local, &mut buffer) {
                let _ = fs::remove_file(&local);
                return Err(e);
            }
            self.metrics.record_staged();
            tracing::trace!(entry = %entry.path, size = entry.size, "staged");

            let job = StagingJob {
                relative,
                local,
                reservation,
            };
            if let Err(mpsc::error::SendError(job)) = self.jobs.blocking_send(job) {
                // Upload side is gone; the run is being torn down.
                let _ = fs::remove_file(&job.local);
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })
    }
}

/// Copy one entry to `local`, refusing to write more than its declared size.
fn stage_file(
    entry: &ArchiveEntry,
    content: &mut dyn Read,
    local: &Path,
    buffer: &mut [u8],
) -> Result<()> {
    let staging = |e: io::Error| PipelineError::staging(local, e);
    let mut file = create_with_parents(local).map_err(staging)?;

    let mut written = 0u64;
    loop {
        let n = match content.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(staging(e)),
        };
        written += n as u64;
        if written > entry.size {
            return Err(staging(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry '{}' is larger than its declared {} bytes", entry.path, entry.size),
            )));
        }
        file.write_all(&buffer[..n]).map_err(staging)?;
    }
    Ok(())
}

fn create_with_parents(path: &Path) -> io::Result<File> {
    match File::create(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(path)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_are_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("b").join("c.txt");
        let entry = ArchiveEntry::file("b/c.txt", 5);
        let mut buffer = [0u8; 2];

        stage_file(&entry, &mut &b"hello"[..], &path, &mut buffer).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn oversized_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liar.bin");
        let entry = ArchiveEntry::file("liar.bin", 3);
        let mut buffer = [0u8; 8];

        let err = stage_file(&entry, &mut &b"too long"[..], &path, &mut buffer).unwrap_err();
        assert!(matches!(err, PipelineError::Staging { .. }));
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Run-scoped counters, shared by the producer and the upload workers.
#[derive(Debug, Default)]
pub struct RunMetrics {
    staged: AtomicU64,
    uploaded: AtomicU64,
    bytes_uploaded: AtomicU64,
    skipped: AtomicU64,
    download_nanos: AtomicU64,
    transfer_nanos: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_staged(&self) {
        self.staged.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one finished upload; returns how many have finished so far.
    pub(crate) fn record_uploaded(&self, bytes: u64) -> u64 {
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
        self.uploaded.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_download(&self, elapsed: Duration) {
        self.download_nanos.store(nanos(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn record_transfer(&self, elapsed: Duration) {
        self.transfer_nanos.store(nanos(elapsed), Ordering::Relaxed);
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            files_staged: self.staged.load(Ordering::Relaxed),
            files_uploaded: self.uploaded.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            download: Duration::from_nanos(self.download_nanos.load(Ordering::Relaxed)),
            transfer: Duration::from_nanos(self.transfer_nanos.load(Ordering::Relaxed)),
            peak_staged_bytes: 0,
        }
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Snapshot of a finished (or failed) run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub files_staged: u64,
    pub files_uploaded: u64,
    /// Bytes written to the destination, after any transcoding.
    pub bytes_uploaded: u64,
    /// Uploads that found the run already cancelled and did nothing.
    pub skipped: u64,
    pub download: Duration,
    pub transfer: Duration,
    /// Largest amount of quota held at once.
    pub peak_staged_bytes: u64,
}

impl RunReport {
    pub fn total(&self) -> Duration {
        self.download + self.transfer
    }

    /// Upload throughput over the staging+upload phase, in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.transfer.as_secs_f64();
        if secs > 0.0 {
            self.bytes_uploaded as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "download:  {:.3}s", self.download.as_secs_f64())?;
        writeln!(
            f,
            "transfer:  {:.3}s ({} files, {} bytes, {:.2} MiB/s)",
            self.transfer.as_secs_f64(),
            self.files_uploaded,
            self.bytes_uploaded,
            self.throughput() / (1024.0 * 1024.0)
        )?;
        if self.skipped > 0 {
            writeln!(f, "skipped:   {} files", self.skipped)?;
        }
        writeln!(f, "peak disk: {} bytes", self.peak_staged_bytes)?;
        write!(f, "total:     {:.3}s", self.total().as_secs_f64())
    }
}

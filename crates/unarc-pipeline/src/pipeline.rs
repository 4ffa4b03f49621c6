use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use flate2::Compress;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use unarc_archive::{ArchiveFormat, ArchiveReader, EntrySource, Layout};
use unarc_store::{ObjectLocation, ObjectSink, ObjectSource};

use crate::config::PipelineConfig;
use crate::error::{ErrorSlot, PipelineError, Result};
use crate::metrics::{RunMetrics, RunReport};
use crate::pool::Pool;
use crate::quota::DiskQuota;
use crate::stage::Producer;
use crate::transcode::new_compressor;
use crate::upload::{Uploader, WorkerPool};

const STAGED_DIR: &str = "staged";

/// Stages of a run, in order. A run ends in `Done` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Transferring,
    Draining,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Downloading => "downloading",
            Self::Transferring => "staging+uploading",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Unpacks one archive from `S` into `D`, keeping staged bytes under the
/// configured disk limit.
pub struct Pipeline<S, D> {
    source: S,
    sink: Arc<D>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl<S, D> Pipeline<S, D>
where
    S: ObjectSource,
    D: ObjectSink + 'static,
{
    pub fn new(source: S, sink: D, config: PipelineConfig) -> Self {
        Self {
            source,
            sink: Arc::new(sink),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the run from outside, e.g. on Ctrl-C.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Extract `archive` below the `dest` prefix.
    ///
    /// The archive's own name, minus its extension, becomes the top directory
    /// under `dest`. The scratch directory is removed whatever the outcome.
    pub async fn run(&self, archive: &ObjectLocation, dest: &ObjectLocation) -> Result<RunReport> {
        let name = archive.file_name();
        ArchiveFormat::from_name(name)?;

        let workdir = self.scratch_dir()?;
        let result = self.run_in(workdir.path(), archive, dest).await;

        let scratch = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            tracing::warn!(
                path = %scratch.display(),
                error = %e,
                "failed to remove staging directory"
            );
        }

        match &result {
            Ok(report) => {
                tracing::info!(phase = %Phase::Done, files = report.files_uploaded, "run finished")
            }
            Err(e) => tracing::info!(phase = %Phase::Failed, error = %e, "run finished"),
        }
        result
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("unarc-");
        match &self.config.staging_dir {
            Some(dir) => builder.tempdir_in(dir).map_err(|e| PipelineError::staging(dir, e)),
            None => builder
                .tempdir()
                .map_err(|e| PipelineError::staging(std::env::temp_dir(), e)),
        }
    }

    async fn run_in(
        &self,
        workdir: &Path,
        archive: &ObjectLocation,
        dest: &ObjectLocation,
    ) -> Result<RunReport> {
        let metrics = Arc::new(RunMetrics::new());
        let config = &self.config;

        tracing::info!(phase = %Phase::Downloading, %archive, "starting");
        let started = Instant::now();
        let local_archive = workdir.join(archive.file_name());
        tokio::select! {
            downloaded = download(&self.source, archive, &local_archive) => {
                let bytes = downloaded?;
                tracing::debug!(bytes, path = %local_archive.display(), "archive downloaded");
            }
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
        }
        metrics.record_download(started.elapsed());

        let (mut reader, layout) = {
            let path = local_archive.clone();
            let name = archive.file_name().to_string();
            let open = config.open;
            let policy = config.entries;
            tokio::task::spawn_blocking(move || -> Result<_> {
                let reader = ArchiveReader::open(&path, &open)?;
                let layout = Layout::plan(&name, reader.entries(), &policy);
                Ok((reader, layout))
            })
            .await??
        };

        if let Some(duplicate) = layout.find_duplicate(reader.entries()) {
            return Err(PipelineError::DuplicatePath {
                entry: duplicate.path.clone(),
                path: layout.rewrite(&duplicate.path),
            });
        }
        if let Some(largest) = reader.largest_file(|e| layout.admits(&e.path)) {
            if largest.size > config.disk_limit {
                return Err(PipelineError::InsufficientQuota {
                    entry: largest.path.clone(),
                    size: largest.size,
                    limit: config.disk_limit,
                });
            }
        }
        let files = reader
            .entries()
            .iter()
            .filter(|e| e.is_file() && layout.admits(&e.path))
            .count();
        tracing::info!(
            entries = reader.len(),
            files,
            root = layout.root(),
            strip_top = layout.strips_top(),
            "archive opened"
        );

        tracing::info!(phase = %Phase::Transferring, workers = config.workers, "starting");
        let started = Instant::now();
        let cancel = self.cancel.child_token();
        let errors = Arc::new(ErrorSlot::new(cancel.clone()));
        let quota = DiskQuota::new(config.disk_limit);
        let (jobs, intake) = mpsc::channel(files.max(1));

        let buffer_size = config.buffer_size;
        let uploader = Uploader {
            sink: Arc::clone(&self.sink),
            dest: dest.clone(),
            chunk_size: config.chunk_size,
            buffer_size,
            gzip: config.gzip.clone(),
            metadata: config.metadata.clone(),
            buffers: Pool::new(
                config.workers * 2,
                move || Vec::with_capacity(buffer_size),
                Vec::clear,
            ),
            encoders: Pool::new(config.workers, new_compressor, Compress::reset),
            cancel: cancel.clone(),
        };
        let workers = WorkerPool {
            uploader: Arc::new(uploader),
            workers: config.workers,
            errors: Arc::clone(&errors),
            metrics: Arc::clone(&metrics),
        };
        let dispatcher = tokio::spawn(workers.run(intake));

        let producer = Producer {
            root: workdir.join(STAGED_DIR),
            layout,
            quota: Arc::clone(&quota),
            cancel: cancel.clone(),
            jobs,
            buffer_size,
            runtime: Handle::current(),
            metrics: Arc::clone(&metrics),
        };
        let staged = tokio::task::spawn_blocking(move || producer.run(&mut reader)).await;
        match staged {
            Ok(Ok(())) => {}
            Ok(Err(e)) => errors.record(e),
            Err(e) => errors.record(e.into()),
        }

        tracing::info!(phase = %Phase::Draining, "extraction finished");
        if let Err(e) = dispatcher.await {
            errors.record(e.into());
        }
        metrics.record_transfer(started.elapsed());

        if let Some(e) = errors.take() {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut report = metrics.report();
        report.peak_staged_bytes = quota.peak();
        Ok(report)
    }
}

/// Copy the archive object to `path`, returning its size.
async fn download<S: ObjectSource>(
    source: &S,
    archive: &ObjectLocation,
    path: &Path,
) -> Result<u64> {
    let body = source
        .get(archive)
        .await
        .map_err(|e| PipelineError::download(archive.to_string(), e))?;

    let file = File::create(path)
        .await
        .map_err(|e| PipelineError::staging(path, e))?;
    let mut file = BufWriter::new(file);
    let mut body = StreamReader::new(body);
    let bytes = tokio::io::copy(&mut body, &mut file)
        .await
        .map_err(|e| PipelineError::download(archive.to_string(), e))?;
    file.shutdown().await.map_err(|e| PipelineError::staging(path, e))?;
    Ok(bytes)
}

//! Bounded-concurrency upload of staged files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use flate2::Compress;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use unarc_store::{ObjectLocation, ObjectSink, PutOptions};

use crate::error::{ErrorSlot, PipelineError, Result};
use crate::metrics::RunMetrics;
use crate::pool::Pool;
use crate::stage::StagingJob;
use crate::transcode::{GzipEncoder, GzipPolicy, SNIFF_LEN, sniff_content_type};

/// What a single upload attempt did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object was written; carries the bytes sent.
    Uploaded(u64),
    /// The run was already cancelled, so nothing was sent.
    Skipped,
}

pub(crate) struct Uploader<D> {
    pub sink: Arc<D>,
    pub dest: ObjectLocation,
    pub chunk_size: usize,
    pub buffer_size: usize,
    pub gzip: GzipPolicy,
    pub metadata: BTreeMap<String, String>,
    pub buffers: Arc<Pool<Vec<u8>>>,
    pub encoders: Arc<Pool<Compress>>,
    pub cancel: CancellationToken,
}

impl<D: ObjectSink> Uploader<D> {
    /// Upload one staged file, then remove it and give back its quota.
    ///
    /// Cleanup happens whatever the outcome; a failed removal is only logged.
    pub async fn upload(&self, job: StagingJob) -> Result<UploadOutcome> {
        let StagingJob {
            relative,
            local,
            reservation,
        } = job;

        let outcome = if self.cancel.is_cancelled() {
            Ok(UploadOutcome::Skipped)
        } else {
            self.transfer(&relative, &local).await.map(UploadOutcome::Uploaded)
        };

        if let Err(e) = tokio::fs::remove_file(&local).await {
            tracing::warn!(path = %local.display(), error = %e, "failed to remove staged file");
        }
        drop(reservation);

        if let Ok(UploadOutcome::Skipped) = outcome {
            tracing::debug!(file = %relative, "upload skipped after cancellation");
        }
        outcome
    }

    async fn transfer(&self, relative: &str, local: &Path) -> Result<u64> {
        let location = self.dest.join(relative);
        let staging = |e: std::io::Error| PipelineError::staging(local, e);
        let failed = |e: std::io::Error| PipelineError::upload(location.to_string(), e);

        let mut file = File::open(local).await.map_err(staging)?;
        let mut buffer = self.buffers.checkout();
        buffer.resize(self.buffer_size.max(SNIFF_LEN), 0);

        let gzip = self.gzip.applies(relative);
        let mut filled = fill(&mut file, &mut buffer[..SNIFF_LEN]).await.map_err(staging)?;

        let mut options = PutOptions::default()
            .chunk_size(self.chunk_size)
            .metadata(self.metadata.clone());
        if gzip {
            options = options
                .content_type(sniff_content_type(&buffer[..filled]))
                .content_encoding("gzip");
        }

        let mut writer = self
            .sink
            .put(&location, &options)
            .await
            .map_err(|e| PipelineError::upload(location.to_string(), e))?;

        let mut deflate = gzip.then(|| self.encoders.checkout());
        let mut encoder = deflate.as_deref_mut().map(GzipEncoder::new);
        let mut out = self.buffers.checkout();
        let mut sent = 0u64;

        while filled > 0 {
            match encoder.as_mut() {
                Some(encoder) => {
                    out.clear();
                    encoder.encode(&buffer[..filled], &mut out).map_err(failed)?;
                    writer.write_all(&out).await.map_err(failed)?;
                    sent += out.len() as u64;
                }
                None => {
                    writer.write_all(&buffer[..filled]).await.map_err(failed)?;
                    sent += filled as u64;
                }
            }
            filled = file.read(&mut buffer[..]).await.map_err(staging)?;
        }

        if let Some(encoder) = encoder {
            out.clear();
            encoder.finish(&mut out).map_err(failed)?;
            writer.write_all(&out).await.map_err(failed)?;
            sent += out.len() as u64;
        }

        writer.shutdown().await.map_err(failed)?;
        Ok(sent)
    }
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Dispatches staging jobs onto at most `workers` concurrent uploads.
pub(crate) struct WorkerPool<D> {
    pub uploader: Arc<Uploader<D>>,
    pub workers: usize,
    pub errors: Arc<ErrorSlot>,
    pub metrics: Arc<RunMetrics>,
}

impl<D: ObjectSink + 'static> WorkerPool<D> {
    /// Consume jobs until the producer closes the intake, then wait for every
    /// accepted upload to finish.
    pub async fn run(self, mut jobs: mpsc::Receiver<StagingJob>) {
        let permits = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut tasks = JoinSet::new();

        while let Some(job) = jobs.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let uploader = Arc::clone(&self.uploader);
            let errors = Arc::clone(&self.errors);
            let metrics = Arc::clone(&self.metrics);
            tasks.spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                let location = uploader.dest.join(&job.relative);
                let size = job.reservation.bytes();
                match uploader.upload(job).await {
                    Ok(UploadOutcome::Uploaded(bytes)) => {
                        let count = metrics.record_uploaded(bytes);
                        tracing::info!(
                            count,
                            %location,
                            size,
                            elapsed = ?started.elapsed(),
                            "uploaded"
                        );
                    }
                    Ok(UploadOutcome::Skipped) => metrics.record_skipped(),
                    Err(e) => errors.record(e),
                }
            });

            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    self.errors.record(e.into());
                }
            }
        }

        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                self.errors.record(e.into());
            }
        }
    }
}

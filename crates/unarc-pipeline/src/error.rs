//! Error types for unarc-pipeline.

use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("entry '{entry}' is {size} bytes, which exceeds the disk limit of {limit} bytes")]
    InsufficientQuota { entry: String, size: u64, limit: u64 },

    #[error("entry '{entry}' lands on '{path}', which another entry already uses")]
    DuplicatePath { entry: String, path: String },

    #[error("unsupported archive format: {name}")]
    UnsupportedFormat { name: String },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("failed to download '{locator}': {source}")]
    Download {
        locator: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("staging failed for '{path}': {source}")]
    Staging { path: PathBuf, source: io::Error },

    #[error("upload failed for '{name}': {source}")]
    Upload {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("archive error: {0}")]
    Archive(#[source] unarc_archive::Error),

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    pub(crate) fn staging(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn download(
        locator: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Download {
            locator: locator.into(),
            source: source.into(),
        }
    }

    pub(crate) fn upload(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Upload {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<unarc_archive::Error> for PipelineError {
    fn from(e: unarc_archive::Error) -> Self {
        match e {
            unarc_archive::Error::UnsupportedFormat { name } => Self::UnsupportedFormat { name },
            other => Self::Archive(other),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Keeps the first real failure of a run and cancels the run's scope.
#[derive(Debug)]
pub(crate) struct ErrorSlot {
    first: Mutex<Option<PipelineError>>,
    cancel: CancellationToken,
}

impl ErrorSlot {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            first: Mutex::new(None),
            cancel,
        }
    }

    pub fn record(&self, error: PipelineError) {
        if !error.is_cancelled() {
            let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
            if first.is_none() {
                tracing::error!(error = %error, "run failed, cancelling");
                *first = Some(error);
            } else {
                tracing::debug!(error = %error, "further failure after cancellation");
            }
        }
        self.cancel.cancel();
    }

    pub fn take(&self) -> Option<PipelineError> {
        self.first.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

//! Bounded staging-and-upload pipeline.
//!
//! An archive is downloaded once, its entries are extracted one at a time into
//! a scratch directory, and each staged file is uploaded and deleted as soon
//! as possible. Local disk use is bounded by a byte quota rather than by the
//! archive size.
//!
//! # Architecture
//!
//! - [`quota`] - byte-weighted admission gate shared by producer and uploaders
//! - `stage` - sequential extraction producer running on a blocking thread
//! - `upload` - semaphore-gated worker pool streaming staged files out
//! - [`Pipeline`] - wires the stages under one cancellation scope
//!
//! The first failure anywhere cancels the run; uploads already in flight
//! finish, queued ones are skipped, and the first real error is returned.

mod config;
mod error;
mod metrics;
mod pipeline;
mod pool;
pub mod quota;
mod stage;
pub mod transcode;
mod upload;

pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_DISK_LIMIT, DEFAULT_WORKERS, PipelineConfig,
};
pub use error::{PipelineError, Result};
pub use metrics::{RunMetrics, RunReport};
pub use pipeline::{Phase, Pipeline};
pub use pool::{Pool, Pooled};
pub use quota::{AcquireError, DiskQuota, QuotaReservation};
pub use stage::StagingJob;
pub use transcode::GzipPolicy;
pub use upload::UploadOutcome;

//! Object store seams for streaming archives in and extracted files out.
//!
//! # Key Features
//!
//! - **Locators**: `scheme://bucket/object` parsed once into [`ObjectLocation`]
//! - **Streaming Reads**: [`ObjectSource::get`] yields the body as a byte stream
//! - **Finalizing Writes**: an [`ObjectWriter`] only becomes visible on `shutdown`
//! - **Bounded Retry**: transient failures are retried per [`RetryPolicy`]

mod error;
mod fs;
#[cfg(feature = "reqwest")]
mod http;
mod location;
mod memory;
mod retry;
mod store;

pub use error::{Result, StoreError};
pub use fs::FsStore;
#[cfg(feature = "reqwest")]
pub use http::HttpSource;
pub use location::ObjectLocation;
pub use memory::{MemoryStore, StoredObject};
pub use retry::{RetryPolicy, retry_delay, with_retry};
pub use store::{
    BoxStream, ByteStream, ObjectAttributes, ObjectSink, ObjectSource, ObjectWriter, PutOptions,
};

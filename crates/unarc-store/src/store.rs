use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::location::ObjectLocation;

/// A boxed stream type for object bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Body of an object being read.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Sink for an object being written.
///
/// Bytes become a visible object only once `shutdown` completes; dropping the
/// writer earlier abandons the object.
pub type ObjectWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Per-object write settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Size of each buffered chunk handed to the backend. Zero lets the store choose.
    pub chunk_size: usize,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Descriptive attributes stored next to the object body, if any are set.
    pub fn attributes(&self) -> Option<ObjectAttributes> {
        if self.content_type.is_none()
            && self.content_encoding.is_none()
            && self.metadata.is_empty()
        {
            return None;
        }
        Some(ObjectAttributes {
            content_type: self.content_type.clone(),
            content_encoding: self.content_encoding.clone(),
            metadata: self.metadata.clone(),
        })
    }
}

/// Content hints and user metadata persisted with an object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Read side of an object store.
///
/// # Implementations
///
/// - [`crate::FsStore`]: objects laid out below a local directory
/// - [`crate::HttpSource`]: plain HTTP(S) downloads
/// - [`crate::MemoryStore`]: in-process map, used by tests
pub trait ObjectSource: Send + Sync {
    /// Open the object at `location` as a byte stream.
    fn get(&self, location: &ObjectLocation) -> impl Future<Output = Result<ByteStream>> + Send;
}

/// Write side of an object store.
///
/// Implementations own their retry behaviour for transient failures.
pub trait ObjectSink: Send + Sync {
    /// Open a writer for a new object at `location`.
    fn put(
        &self,
        location: &ObjectLocation,
        options: &PutOptions,
    ) -> impl Future<Output = Result<ObjectWriter>> + Send;
}

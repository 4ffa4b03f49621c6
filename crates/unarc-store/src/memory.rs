use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::AsyncWrite;

use crate::error::{Result, StoreError};
use crate::location::ObjectLocation;
use crate::store::{ByteStream, ObjectSink, ObjectSource, ObjectWriter, PutOptions};

/// An object held by [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub options: PutOptions,
}

#[derive(Debug, Default)]
struct Shared {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: AtomicUsize,
}

/// In-process object store keyed by `scheme://bucket/name`.
///
/// Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &ObjectLocation, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            options: PutOptions::default(),
        };
        self.lock().insert(location.to_string(), object);
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.lock().get(&location.to_string()).cloned()
    }

    /// Keys of every stored object, in order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of writers opened through [`ObjectSink::put`].
    pub fn put_count(&self) -> usize {
        self.shared.puts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.shared.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectSource for MemoryStore {
    async fn get(&self, location: &ObjectLocation) -> Result<ByteStream> {
        let object = self
            .object(location)
            .ok_or_else(|| StoreError::NotFound(location.to_string()))?;
        Ok(Box::pin(futures_util::stream::iter([Ok::<_, io::Error>(object.data)])))
    }
}

impl ObjectSink for MemoryStore {
    async fn put(&self, location: &ObjectLocation, options: &PutOptions) -> Result<ObjectWriter> {
        self.shared.puts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(MemoryWriter {
            store: self.clone(),
            key: location.to_string(),
            options: options.clone(),
            buf: Vec::new(),
            closed: false,
        }))
    }
}

struct MemoryWriter {
    store: MemoryStore,
    key: String,
    options: PutOptions,
    buf: Vec<u8>,
    closed: bool,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Err(io::Error::other("write after shutdown")));
        }
        this.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.closed {
            this.closed = true;
            let object = StoredObject {
                data: Bytes::from(std::mem::take(&mut this.buf)),
                options: this.options.clone(),
            };
            this.store.lock().insert(std::mem::take(&mut this.key), object);
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn object_appears_on_shutdown_only() {
        let store = MemoryStore::new();
        let loc = ObjectLocation::parse("mem://b/out/a.txt").unwrap();

        let mut writer = store.put(&loc, &PutOptions::default()).await.unwrap();
        writer.write_all(b"hello").await.unwrap();
        assert!(store.object(&loc).is_none());

        writer.shutdown().await.unwrap();
        assert_eq!(store.object(&loc).unwrap().data, Bytes::from_static(b"hello"));
        assert_eq!(store.put_count(), 1);

        let body: Vec<_> = store.get(&loc).await.unwrap().try_collect().await.unwrap();
        assert_eq!(body.concat(), b"hello");
    }

    #[tokio::test]
    async fn abandoned_writer_leaves_nothing() {
        let store = MemoryStore::new();
        let loc = ObjectLocation::parse("mem://b/gone").unwrap();
        let mut writer = store.put(&loc, &PutOptions::default()).await.unwrap();
        writer.write_all(b"x").await.unwrap();
        drop(writer);
        assert!(store.keys().is_empty());
    }
}

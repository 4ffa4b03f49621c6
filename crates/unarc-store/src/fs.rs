//! Object store backed by a local directory tree.
//!
//! `bucket/name` maps to `<root>/<bucket>/<name>`. Writes land in a hidden
//! sibling file and are renamed into place on shutdown, so a reader never sees
//! a partially written object. Attributes, when present, go to a
//! `<name>.meta.json` sidecar.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};
use tokio_util::io::ReaderStream;

use crate::error::{Result, StoreError};
use crate::location::ObjectLocation;
use crate::retry::{RetryPolicy, with_retry};
use crate::store::{
    ByteStream, ObjectAttributes, ObjectSink, ObjectSource, ObjectWriter, PutOptions,
};

const DEFAULT_WRITE_BUFFER: usize = 64 * 1024;
const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
    retry: RetryPolicy,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file backing `location`.
    pub fn object_path(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let mut path = self.root.join(location.bucket());
        for part in location.name().split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    return Err(StoreError::InvalidLocator {
                        locator: location.to_string(),
                        reason: "object name climbs above its bucket".to_string(),
                    });
                }
                part => path.push(part),
            }
        }
        Ok(path)
    }

    /// Attributes written alongside `location`, if any.
    pub async fn attributes(&self, location: &ObjectLocation) -> Result<Option<ObjectAttributes>> {
        let path = sidecar_path(&self.object_path(location)?);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl ObjectSource for FsStore {
    async fn get(&self, location: &ObjectLocation) -> Result<ByteStream> {
        let path = self.object_path(location)?;
        let file = File::open(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(location.to_string()),
            _ => StoreError::io(&path, e),
        })?;
        Ok(Box::pin(ReaderStream::new(file)))
    }
}

impl ObjectSink for FsStore {
    async fn put(&self, location: &ObjectLocation, options: &PutOptions) -> Result<ObjectWriter> {
        let path = self.object_path(location)?;
        let writer = with_retry(&self.retry, location, || {
            FsObjectWriter::create(path.clone(), options)
        })
        .await?;
        Ok(Box::pin(writer))
    }
}

type Finalize = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

enum State {
    Writing,
    Finalizing(Finalize),
    Done,
}

struct FsObjectWriter {
    file: BufWriter<File>,
    partial_path: PathBuf,
    final_path: PathBuf,
    sidecar: Option<(PathBuf, Vec<u8>)>,
    state: State,
}

impl FsObjectWriter {
    async fn create(final_path: PathBuf, options: &PutOptions) -> Result<Self> {
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let sidecar = match options.attributes() {
            Some(attrs) => Some((sidecar_path(&final_path), serde_json::to_vec_pretty(&attrs)?)),
            None => None,
        };

        let partial_path = partial_path(&final_path);
        let file = File::create(&partial_path)
            .await
            .map_err(|e| StoreError::io(&partial_path, e))?;
        let capacity = match options.chunk_size {
            0 => DEFAULT_WRITE_BUFFER,
            n => n,
        };

        Ok(Self {
            file: BufWriter::with_capacity(capacity, file),
            partial_path,
            final_path,
            sidecar,
            state: State::Writing,
        })
    }
}

impl AsyncWrite for FsObjectWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match this.state {
            State::Writing => Pin::new(&mut this.file).poll_write(cx, buf),
            _ => Poll::Ready(Err(io::Error::other("write after shutdown"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Writing => {
                    ready!(Pin::new(&mut this.file).poll_shutdown(cx))?;
                    let partial = this.partial_path.clone();
                    let target = this.final_path.clone();
                    let sidecar = this.sidecar.take();
                    this.state = State::Finalizing(Box::pin(async move {
                        if let Some((path, body)) = sidecar {
                            tokio::fs::write(path, body).await?;
                        }
                        tokio::fs::rename(partial, target).await
                    }));
                }
                State::Finalizing(finalize) => {
                    ready!(finalize.as_mut().poll(cx))?;
                    this.state = State::Done;
                }
                State::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl Drop for FsObjectWriter {
    fn drop(&mut self) {
        if !matches!(self.state, State::Done) {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use tokio::io::AsyncWriteExt;

    fn location(s: &str) -> ObjectLocation {
        ObjectLocation::parse(s).unwrap()
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let loc = location("gs://bucket/out/data/a.txt");

        let mut writer = store.put(&loc, &PutOptions::default().chunk_size(4)).await.unwrap();
        writer.write_all(b"0123456789").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("bucket/out/data/a.txt")).unwrap(),
            b"0123456789"
        );
        let chunks: Vec<_> = store.get(&loc).await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"0123456789");
        assert_eq!(store.attributes(&loc).await.unwrap(), None);
    }

    #[tokio::test]
    async fn object_is_invisible_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let loc = location("gs://bucket/x.bin");

        let mut writer = store.put(&loc, &PutOptions::default()).await.unwrap();
        writer.write_all(b"partial").await.unwrap();
        writer.flush().await.unwrap();
        assert!(!dir.path().join("bucket/x.bin").exists());

        drop(writer);
        assert!(!dir.path().join("bucket/x.bin").exists());
        assert!(!dir.path().join("bucket/.x.bin.partial").exists());
    }

    #[tokio::test]
    async fn attributes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let loc = location("gs://bucket/page.html");
        let options = PutOptions::default()
            .content_type("text/html")
            .content_encoding("gzip")
            .metadata([("owner".to_string(), "ops".to_string())].into());

        let mut writer = store.put(&loc, &options).await.unwrap();
        writer.write_all(b"<html>").await.unwrap();
        writer.shutdown().await.unwrap();

        let attrs = store.attributes(&loc).await.unwrap().unwrap();
        assert_eq!(attrs.content_type.as_deref(), Some("text/html"));
        assert_eq!(attrs.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(attrs.metadata.get("owner").map(String::as_str), Some("ops"));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let result = store.get(&location("gs://bucket/absent.zip")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn parent_components_are_rejected() {
        let store = FsStore::new("/srv/objects");
        let result = store.object_path(&location("gs://bucket/a/..%2F..%2Fetc"));
        assert!(matches!(result, Err(StoreError::InvalidLocator { .. })));
    }
}

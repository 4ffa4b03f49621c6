use std::path::PathBuf;

use unarc_store::{ByteStream, FsStore, HttpSource, ObjectLocation, ObjectSource, Result};

/// Archive source picked from the locator scheme.
pub enum AnySource {
    Fs(FsStore),
    Http(HttpSource),
}

impl AnySource {
    pub fn for_location(location: &ObjectLocation, store_root: impl Into<PathBuf>) -> Self {
        match location.scheme() {
            "http" | "https" => Self::Http(HttpSource::new()),
            _ => Self::Fs(FsStore::new(store_root)),
        }
    }
}

impl ObjectSource for AnySource {
    async fn get(&self, location: &ObjectLocation) -> Result<ByteStream> {
        match self {
            Self::Fs(store) => store.get(location).await,
            Self::Http(source) => source.get(location).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_backend() {
        let http = ObjectLocation::parse("https://example.com/a.zip").unwrap();
        assert!(matches!(AnySource::for_location(&http, "."), AnySource::Http(_)));

        let gs = ObjectLocation::parse("gs://bucket/a.zip").unwrap();
        assert!(matches!(AnySource::for_location(&gs, "."), AnySource::Fs(_)));
    }
}

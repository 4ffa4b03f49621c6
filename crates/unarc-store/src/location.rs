use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{Result, StoreError};

/// A `scheme://bucket/object` locator.
///
/// The object name is kept percent-decoded and without a leading `/`; it may be
/// empty when the locator names a whole bucket or a prefix root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    url: Url,
    bucket: String,
    name: String,
}

impl ObjectLocation {
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = |reason: &str| StoreError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(locator).map_err(|e| invalid(&e.to_string()))?;
        let bucket = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid("missing bucket")),
        };
        let name = percent_decode_str(url.path().trim_start_matches('/'))
            .decode_utf8()
            .map_err(|e| invalid(&e.to_string()))?
            .into_owned();

        Ok(Self { url, bucket, name })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Last `/`-separated component of the object name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Treat this location as a prefix and append a relative object path.
    pub fn join(&self, relative: &str) -> Self {
        let prefix = self.name.trim_end_matches('/');
        let relative = relative.trim_start_matches('/');
        let name = match (prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => prefix.to_string(),
            (false, false) => format!("{prefix}/{relative}"),
        };

        let mut url = self.url.clone();
        url.set_path(&format!("/{name}"));
        Self {
            url,
            bucket: self.bucket.clone(),
            name,
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme(), self.bucket, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bucket_and_name() {
        let loc = ObjectLocation::parse("gs://my-bucket/archives/data.zip").unwrap();
        assert_eq!(loc.scheme(), "gs");
        assert_eq!(loc.bucket(), "my-bucket");
        assert_eq!(loc.name(), "archives/data.zip");
        assert_eq!(loc.file_name(), "data.zip");
        assert_eq!(loc.to_string(), "gs://my-bucket/archives/data.zip");
    }

    #[test]
    fn names_are_percent_decoded() {
        let loc = ObjectLocation::parse("gs://b/dir/with%20space.zip").unwrap();
        assert_eq!(loc.name(), "dir/with space.zip");
    }

    #[test]
    fn missing_bucket_is_rejected() {
        assert!(matches!(
            ObjectLocation::parse("file:///tmp/data.zip"),
            Err(StoreError::InvalidLocator { .. })
        ));
        assert!(ObjectLocation::parse("not a url").is_err());
    }

    #[test]
    fn join_under_prefix() {
        let dest = ObjectLocation::parse("gs://out/extracted/").unwrap();
        let joined = dest.join("data/b/c.txt");
        assert_eq!(joined.bucket(), "out");
        assert_eq!(joined.name(), "extracted/data/b/c.txt");
        assert_eq!(joined.to_string(), "gs://out/extracted/data/b/c.txt");
    }

    #[test]
    fn join_onto_bucket_root() {
        let dest = ObjectLocation::parse("gs://out").unwrap();
        assert_eq!(dest.name(), "");
        assert_eq!(dest.join("data/a.txt").name(), "data/a.txt");
    }
}

use futures_util::StreamExt;

use crate::error::{Result, StoreError};
use crate::location::ObjectLocation;
use crate::retry::{RetryPolicy, with_retry};
use crate::store::{ByteStream, ObjectSource};

/// Read-only source for archives served over plain HTTP(S).
///
/// Connection failures and 5xx responses are retried per the [`RetryPolicy`];
/// a 404 maps to [`StoreError::NotFound`].
#[derive(Clone, Debug, Default)]
pub struct HttpSource {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(&self, location: &ObjectLocation) -> Result<reqwest::Response> {
        let url = location.url().as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(location.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl ObjectSource for HttpSource {
    async fn get(&self, location: &ObjectLocation) -> Result<ByteStream> {
        let response = with_retry(&self.retry, location, || self.open(location)).await?;
        tracing::debug!(%location, length = ?response.content_length(), "download started");
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(stream))
    }
}

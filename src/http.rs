use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};

use crate::error::TransportError;

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// HTTP operations the download engine needs.
///
/// Implementations are shared by every fetch task of a download, so they
/// must be safe for concurrent use.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Size of the resource from a HEAD request, 0 when the server does not
    /// report a usable `Content-Length`.
    async fn probe_size(&self, url: &str) -> Result<u64, TransportError>;

    /// Stream the bytes in `[start, end)`.
    async fn fetch_range(&self, url: &str, start: u64, end: u64) -> Result<ByteStream, TransportError>;
}

pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("segdl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), TransportError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(TransportError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

/// `Range` header value for the half-open span `[start, end)`.
fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end - 1)
}

/// Status check for a ranged GET. A full `200 OK` body only matches the
/// request when the range starts at offset 0.
fn check_range_status(url: &str, status: StatusCode, start: u64, end: u64) -> Result<(), TransportError> {
    check_status(url, status)?;
    if status == StatusCode::OK && start > 0 {
        return Err(TransportError::RangeIgnored { start, end });
    }
    Ok(())
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn probe_size(&self, url: &str) -> Result<u64, TransportError> {
        let response = self.client.head(url).send().await?;
        check_status(url, response.status())?;

        // content_length() reports the (empty) body of a HEAD response, read the header instead
        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(size)
    }

    async fn fetch_range(&self, url: &str, start: u64, end: u64) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .get(url)
            .header(header::RANGE, range_header(start, end))
            .send()
            .await?;
        check_range_status(url, response.status(), start, end)?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://mirror.test/archive.bin";

    #[test]
    fn test_range_header_is_inclusive() {
        assert_eq!(range_header(0, 250), "bytes=0-249");
        assert_eq!(range_header(750, 1000), "bytes=750-999");
        assert_eq!(range_header(9, 10), "bytes=9-9");
    }

    #[test]
    fn test_partial_content_is_accepted() {
        assert!(check_range_status(URL, StatusCode::PARTIAL_CONTENT, 250, 500).is_ok());
        assert!(check_range_status(URL, StatusCode::PARTIAL_CONTENT, 0, 250).is_ok());
    }

    #[test]
    fn test_full_body_only_accepted_from_offset_zero() {
        assert!(check_range_status(URL, StatusCode::OK, 0, 250).is_ok());

        let err = check_range_status(URL, StatusCode::OK, 250, 500).unwrap_err();
        assert!(matches!(err, TransportError::RangeIgnored { start: 250, end: 500 }));
    }

    #[test]
    fn test_error_status_is_reported() {
        let err = check_range_status(URL, StatusCode::SERVICE_UNAVAILABLE, 0, 250).unwrap_err();
        match err {
            TransportError::Status { status, url } => {
                assert_eq!(status, 503);
                assert_eq!(url, URL);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = check_range_status(URL, StatusCode::RANGE_NOT_SATISFIABLE, 250, 500).unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 416, .. }));
    }
}

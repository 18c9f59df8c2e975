use futures::stream::StreamExt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::util::atomic_write;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while downloading the legacy feed.
///
/// Every variant is terminal: the download is attempted exactly once.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request and body download exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Downloaded body could not be saved
    #[error("Failed to save feed to '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads `url` and replaces `dest` with the response body, verbatim.
///
/// The whole exchange (request, status, body) is bounded by `timeout`. `dest`
/// is only touched once the complete body is in memory, and is then replaced
/// atomically, so any failure leaves the previous file as it was.
///
/// # Returns
///
/// The number of bytes written.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - no complete response within `timeout`
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::HttpStatus`] - non-2xx response
/// - [`FetchError::ResponseTooLarge`] - body over 10MB
/// - [`FetchError::IncompleteResponse`] - body shorter than Content-Length
/// - [`FetchError::Io`] - the file could not be written
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    dest: &Path,
) -> Result<usize, FetchError> {
    tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "Downloading feed");

    let bytes = tokio::time::timeout(timeout, download(client, url))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    atomic_write(dest, &bytes).map_err(|source| FetchError::Io {
        path: dest.display().to_string(),
        source,
    })?;

    tracing::info!(url = %url, bytes = bytes.len(), path = %dest.display(), "Feed saved");
    Ok(bytes.len())
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        tracing::warn!(url = %url, status = %response.status(), "Feed download rejected");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><guid>1</guid><title>Test</title></item>
</channel></rss>"#;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("podmerge_fetch_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_fetch_success_writes_body_verbatim() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = test_dir("success");
        let dest = dir.join("legacy.xml");
        std::fs::write(&dest, "stale").unwrap();

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let written = fetch_feed(&client, &url, Duration::from_secs(5), &dest)
            .await
            .unwrap();

        assert_eq!(written, VALID_RSS.len());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), VALID_RSS);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_404_leaves_file_untouched() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = test_dir("not_found");
        let dest = dir.join("legacy.xml");
        std::fs::write(&dest, "previous").unwrap();

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let result = fetch_feed(&client, &url, Duration::from_secs(5), &dest).await;

        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = test_dir("server_error");
        let dest = dir.join("legacy.xml");

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let result = fetch_feed(&client, &url, Duration::from_secs(5), &dest).await;

        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
        assert!(!dest.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_timeout_writes_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let dir = test_dir("timeout");
        let dest = dir.join("legacy.xml");

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let result = fetch_feed(&client, &url, Duration::from_millis(200), &dest).await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert!(!dest.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let dir = test_dir("refused");
        let dest = dir.join("legacy.xml");

        // Nothing listens on port 1
        let client = reqwest::Client::new();
        let result = fetch_feed(
            &client,
            "http://127.0.0.1:1/feed",
            Duration::from_secs(5),
            &dest,
        )
        .await;

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert!(!dest.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}

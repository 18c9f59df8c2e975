use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates an absolute http(s) URL taken from configuration.
///
/// Used for both the URL the legacy feed is downloaded from and the public
/// URL written into the merged feed's self link. Unlike a subscription
/// validator, local and private hosts are accepted: the operator chose them.
///
/// # Examples
///
/// ```
/// use podmerge::util::validate_http_url;
///
/// assert!(validate_http_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_http_url("http://127.0.0.1:8080/rss").is_ok());
/// assert!(validate_http_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_http_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

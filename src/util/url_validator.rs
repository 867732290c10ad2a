use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed as an absolute URI.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL parsed but carries no host (e.g. `mailto:` or `file:///`).
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Validates a URL string for use as a feed source.
///
/// A feed URL must be absolute: it needs a scheme followed by `://` and a
/// host. Relative paths (`/feed.xml`), scheme-less strings
/// (`example.com/rss`), authority-less forms (`https:example.com`) and
/// host-less URIs (`file:///tmp/feed.xml`) are rejected. Surrounding
/// whitespace is ignored.
///
/// No scheme allow-list or address filtering is applied here; any absolute
/// URI with a host is accepted and the HTTP layer decides whether it can be
/// fetched.
///
/// # Examples
///
/// ```
/// use feedshelf::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("example.com/feed.xml").is_err());
/// assert!(validate_url("/feed.xml").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    let url = Url::parse(trimmed)?;

    // `https:example.com` parses with a host, but has no authority part
    let has_authority = trimmed
        .get(url.scheme().len()..)
        .is_some_and(|rest| rest.starts_with("://"));
    if !has_authority {
        return Err(UrlValidationError::MissingHost(url_str.to_owned()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost(url_str.to_owned())),
    }
}

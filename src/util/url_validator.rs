use thiserror::Error;
use url::Url;

/// Errors from validating provider base URLs and article URLs.
#[derive(Error, Debug, PartialEq)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// A plain-HTTP base URL pointing somewhere other than localhost.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
}

/// Validate a provider base URL.
///
/// API keys travel with every request, so the base must be HTTPS. Plain HTTP
/// is accepted only for `localhost`/`127.0.0.1`, which is where test servers
/// listen. A trailing slash is stripped so paths can be appended with `/`.
pub fn validate_base_url(base: &str) -> Result<String, UrlValidationError> {
    let url = Url::parse(base)?;
    match url.scheme() {
        "https" => {}
        "http" => {
            let local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if !local {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS provider base URL");
                return Err(UrlValidationError::Insecure);
            }
            tracing::warn!(base_url = %base, "Using non-HTTPS provider base URL (localhost only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
    Ok(base.trim_end_matches('/').to_string())
}

/// Validate an article URL used as a detail-view key.
pub fn validate_article_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

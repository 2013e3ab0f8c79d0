//! HTTP clients for the two upstream content providers.
//!
//! - [`news`] - article headlines and keyword search
//! - [`tmdb`] - trending movies, title search and movie detail
//!
//! Both clients share the HTTP plumbing in this module: one configured
//! `reqwest::Client`, a per-request timeout, bounded body reads, and mapping
//! of non-2xx responses to [`ProviderError`] with the provider's own message
//! when the error body carries one.

pub mod news;
pub mod tmdb;

pub use news::{FeedQuery, NewsClient};
pub use tmdb::{movie_page_url, poster_url, PosterSize, TmdbClient};

use futures::StreamExt;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::util::UrlValidationError;

/// Upper bound on a provider response body.
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Upper bound on an error body we try to read a message out of.
const MAX_ERROR_BODY_SIZE: usize = 64 * 1024;

/// Errors from a single provider request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response; `message` is the provider's explanation if it sent one
    #[error("HTTP error: status {status}")]
    HttpStatus { status: u16, message: Option<String> },
    /// The requested record does not exist
    #[error("Not found")]
    NotFound,
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Body was not the JSON shape we expect
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Invalid provider URL: {0}")]
    InvalidBaseUrl(#[from] UrlValidationError),
}

impl ProviderError {
    /// The provider-supplied message, if the response carried one.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ProviderError::HttpStatus {
                message: Some(m), ..
            } => Some(m.as_str()),
            _ => None,
        }
    }
}

/// Error payload shape shared by both providers (`message` for news,
/// `status_message` for movies).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status_message: Option<String>,
}

/// Build the HTTP client shared by both providers.
///
/// Redirects are capped at 3 hops with loop detection; the API key must not
/// be replayed along an unbounded chain.
pub fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    let policy = Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }
        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev == url) {
            return attempt.error("Redirect loop detected");
        }
        tracing::debug!(host = ?url.host_str(), hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    });

    let client = reqwest::Client::builder()
        .redirect(policy)
        .user_agent(concat!("glance/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Send `request` and decode a JSON body of type `T`.
///
/// `timeout` bounds the whole exchange, body included; a provider that sends
/// headers and then stalls is reported as [`ProviderError::Timeout`].
///
/// 404 maps to [`ProviderError::NotFound`]; other non-2xx statuses to
/// [`ProviderError::HttpStatus`] carrying the provider's message. URLs are
/// stripped from network errors because the movie provider takes its key as
/// a query parameter.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<T, ProviderError> {
    tokio::time::timeout(timeout, exchange(request))
        .await
        .map_err(|_| ProviderError::Timeout)?
}

async fn exchange<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.without_url()))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound);
    }
    if !status.is_success() {
        let message = read_limited(response, MAX_ERROR_BODY_SIZE)
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ErrorBody>(&bytes).ok())
            .and_then(|body| body.message.or(body.status_message))
            .filter(|m| !m.trim().is_empty());
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = read_limited(response, MAX_RESPONSE_SIZE).await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ProviderError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ProviderError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProviderError::Network(e.without_url()))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ProviderError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Ping {
        ok: bool,
    }

    async fn ping(server: &MockServer) -> Result<Ping, ProviderError> {
        let client = build_http_client().unwrap();
        get_json(
            client.get(format!("{}/ping", server.uri())),
            Duration::from_secs(5),
        )
        .await
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok": true}"#))
            .mount(&server)
            .await;

        assert!(ping(&server).await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_error_body_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#,
            ))
            .mount(&server)
            .await;

        let err = ping(&server).await.unwrap_err();
        assert!(matches!(err, ProviderError::HttpStatus { status: 401, .. }));
        assert_eq!(err.provider_message(), Some("Your API key is invalid."));
    }

    #[tokio::test]
    async fn test_status_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string(
                r#"{"status_code":7,"status_message":"Invalid API key: You must be granted a valid key."}"#,
            ))
            .mount(&server)
            .await;

        let err = ping(&server).await.unwrap_err();
        assert_eq!(
            err.provider_message(),
            Some("Invalid API key: You must be granted a valid key.")
        );
    }

    #[tokio::test]
    async fn test_error_without_body_has_no_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = ping(&server).await.unwrap_err();
        assert!(err.provider_message().is_none());
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(matches!(
            ping(&server).await.unwrap_err(),
            ProviderError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(matches!(
            ping(&server).await.unwrap_err(),
            ProviderError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ok": true}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = build_http_client().unwrap();
        let result: Result<Ping, _> = get_json(
            client.get(format!("{}/ping", server.uri())),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn test_timeout_covers_stalled_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"ok\": true,")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            // Hold the connection open without finishing the body.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client = build_http_client().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            get_json::<Ping>(
                client.get(format!("http://{}/ping", addr)),
                Duration::from_millis(200),
            ),
        )
        .await
        .expect("request outlived its timeout");
        assert!(matches!(result, Err(ProviderError::Timeout)));
        server.abort();
    }
}

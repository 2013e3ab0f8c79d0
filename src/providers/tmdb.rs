//! Movie provider client (TMDB v3).
//!
//! List and search endpoints return abbreviated records; only the detail
//! endpoint fills in genres, runtime and tagline. Poster paths are relative
//! and stay that way in the store; [`poster_url`] resolves them for display.
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{get_json, ProviderError};
use crate::model::Movie;
use crate::util::validate_base_url;

/// Image host for poster paths.
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// Rendered poster widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    /// Card thumbnails.
    W500,
    /// Detail view.
    W780,
}

impl PosterSize {
    fn as_str(self) -> &'static str {
        match self {
            PosterSize::W500 => "w500",
            PosterSize::W780 => "w780",
        }
    }
}

/// Resolve a poster path for display.
///
/// Absolute URLs pass through untouched, so favorites snapshotted from either
/// provider can go through the same call.
pub fn poster_url(path: &str, size: PosterSize) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}/{}", IMAGE_BASE_URL, size.as_str(), path)
}

/// Public page for a movie on the provider's site.
pub fn movie_page_url(id: u64) -> String {
    format!("https://www.themoviedb.org/movie/{}", id)
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    #[serde(default)]
    results: Vec<Movie>,
}

/// Client for the movie provider. Cheap to clone.
#[derive(Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl TmdbClient {
    /// Create a client against `base_url` (HTTPS, or localhost for tests).
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: SecretString,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http,
            base_url: validate_base_url(base_url)?,
            api_key,
            timeout: Duration::from_secs(20),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(&[("api_key", self.api_key.expose_secret())])
    }

    /// One page of this week's trending movies.
    pub async fn trending(&self, page: u32) -> Result<Vec<Movie>, ProviderError> {
        let page = page.max(1).to_string();
        let request = self
            .get("trending/movie/week")
            .query(&[("page", page.as_str())]);
        let response: ResultsPage = get_json(request, self.timeout).await?;
        tracing::debug!(page = %page, count = response.results.len(), "Fetched trending page");
        Ok(response.results)
    }

    /// Search movies by title.
    pub async fn search(&self, query: &str) -> Result<Vec<Movie>, ProviderError> {
        let request = self.get("search/movie").query(&[("query", query)]);
        let response: ResultsPage = get_json(request, self.timeout).await?;
        Ok(response.results)
    }

    /// Full detail record for one movie.
    pub async fn movie(&self, id: u64) -> Result<Movie, ProviderError> {
        get_json(self.get(&format!("movie/{}", id)), self.timeout).await
    }
}

//! News provider client.
//!
//! The personalized feed asks for articles matching *any* of the selected
//! category tags in a single query (`a OR b OR c`), sorted newest first. With
//! no tags selected it degrades to unfiltered top headlines. Entries the
//! provider has taken down come back with the title `[Removed]`; they are
//! dropped here so they never reach the store.
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{get_json, ProviderError};
use crate::model::NewsArticle;
use crate::util::validate_base_url;

/// Title the provider substitutes for removed articles.
pub const REMOVED_SENTINEL: &str = "[Removed]";

/// Category tags offered in settings.
pub const CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

/// Which endpoint a feed page is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    /// No categories selected: unfiltered headlines.
    Headlines,
    /// OR-joined keyword query over all articles.
    Keywords(String),
}

impl FeedQuery {
    pub fn for_categories(categories: &[String]) -> Self {
        let tags: Vec<&str> = categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if tags.is_empty() {
            FeedQuery::Headlines
        } else {
            FeedQuery::Keywords(tags.join(" OR "))
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    articles: Vec<WireArticle>,
}

#[derive(Debug, Default, Deserialize)]
struct WireSource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireArticle {
    #[serde(default)]
    source: WireSource,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

impl WireArticle {
    /// Convert to a store record, or `None` for removed or unusable entries.
    fn normalize(self) -> Option<NewsArticle> {
        let title = self.title.filter(|t| t != REMOVED_SENTINEL && !t.trim().is_empty())?;
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        let published_at = match self
            .published_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
        {
            Some(Ok(ts)) => ts.with_timezone(&Utc),
            _ => {
                tracing::debug!(url = %url, "Dropping article without a valid publish time");
                return None;
            }
        };

        Some(NewsArticle {
            source_name: self.source.name.unwrap_or_default(),
            author: self.author,
            title,
            description: self.description,
            url,
            image_url: self.url_to_image,
            published_at,
            body: self.content,
        })
    }
}

fn normalize_all(response: ArticlesResponse) -> Vec<NewsArticle> {
    let total = response.articles.len();
    let articles: Vec<NewsArticle> = response
        .articles
        .into_iter()
        .filter_map(WireArticle::normalize)
        .collect();
    if articles.len() < total {
        tracing::debug!(
            dropped = total - articles.len(),
            kept = articles.len(),
            "Filtered removed articles"
        );
    }
    articles
}

// ============================================================================
// Client
// ============================================================================

/// Client for the news provider. Cheap to clone.
#[derive(Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    language: String,
    page_size: u32,
    timeout: Duration,
}

impl NewsClient {
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
            language: "en".to_string(),
            page_size: 20,
            timeout: Duration::from_secs(20),
        })
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 100);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/{}", self.base_url, endpoint))
            .header("X-Api-Key", self.api_key.expose_secret())
            .query(&[("language", self.language.as_str())])
    }

    /// One page of the personalized feed.
    pub async fn feed_page(
        &self,
        categories: &[String],
        page: u32,
    ) -> Result<Vec<NewsArticle>, ProviderError> {
        let page = page.max(1).to_string();
        let page_size = self.page_size.to_string();
        let request = match FeedQuery::for_categories(categories) {
            FeedQuery::Headlines => self.get("top-headlines"),
            FeedQuery::Keywords(q) => self
                .get("everything")
                .query(&[("q", q.as_str()), ("sortBy", "publishedAt")]),
        }
        .query(&[("page", page.as_str()), ("pageSize", page_size.as_str())]);

        let response: ArticlesResponse = get_json(request, self.timeout).await?;
        let articles = normalize_all(response);
        tracing::debug!(page = %page, count = articles.len(), "Fetched news page");
        Ok(articles)
    }

    /// Keyword search across all articles (single page, newest first).
    pub async fn search(&self, query: &str) -> Result<Vec<NewsArticle>, ProviderError> {
        let page_size = self.page_size.to_string();
        let request = self.get("everything").query(&[
            ("q", query),
            ("sortBy", "publishedAt"),
            ("pageSize", page_size.as_str()),
        ]);
        let response: ArticlesResponse = get_json(request, self.timeout).await?;
        Ok(normalize_all(response))
    }

    /// Look an article up by its URL.
    ///
    /// The search endpoint matches text, not identity, so only a result whose
    /// URL equals `url` counts; anything else is [`ProviderError::NotFound`].
    pub async fn find_by_url(&self, url: &str) -> Result<NewsArticle, ProviderError> {
        let quoted = format!("\"{}\"", url);
        let candidates = self.search(&quoted).await?;
        candidates
            .into_iter()
            .find(|a| a.url == url)
            .ok_or(ProviderError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::build_http_client;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article_json(url: &str, title: &str) -> serde_json::Value {
        serde_json::json!({
            "source": {"id": null, "name": "Wire"},
            "author": "A. Writer",
            "title": title,
            "description": "desc",
            "url": url,
            "urlToImage": "https://img.example.com/x.png",
            "publishedAt": "2024-05-01T12:00:00Z",
            "content": "body"
        })
    }

    fn client(server: &MockServer) -> NewsClient {
        NewsClient::new(
            build_http_client().unwrap(),
            &server.uri(),
            SecretString::from("test-key"),
        )
        .unwrap()
    }

    #[test]
    fn test_feed_query_for_categories() {
        assert_eq!(FeedQuery::for_categories(&[]), FeedQuery::Headlines);
        assert_eq!(
            FeedQuery::for_categories(&[" ".to_string()]),
            FeedQuery::Headlines
        );
        assert_eq!(
            FeedQuery::for_categories(&["science".to_string(), "health".to_string()]),
            FeedQuery::Keywords("science OR health".to_string())
        );
    }

    #[test]
    fn test_removed_sentinel_filtered() {
        let response: ArticlesResponse = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "articles": [
                article_json("https://example.com/1", "Kept"),
                article_json("https://removed.com", "[Removed]"),
            ]
        }))
        .unwrap();
        let articles = normalize_all(response);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Kept");
        assert_eq!(articles[0].source_name, "Wire");
        assert_eq!(articles[0].body.as_deref(), Some("body"));
    }

    #[test]
    fn test_article_without_url_or_date_dropped() {
        let mut no_url = article_json("x", "No URL");
        no_url["url"] = serde_json::Value::Null;
        let mut bad_date = article_json("https://example.com/2", "Bad date");
        bad_date["publishedAt"] = serde_json::json!("yesterday");
        let response: ArticlesResponse =
            serde_json::from_value(serde_json::json!({ "articles": [no_url, bad_date] })).unwrap();
        assert!(normalize_all(response).is_empty());
    }

    #[tokio::test]
    async fn test_feed_without_categories_uses_headlines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .and(query_param("page", "2"))
            .and(query_param("pageSize", "20"))
            .and(query_param("language", "en"))
            .and(header("X-Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [article_json("https://example.com/1", "One")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let articles = client(&server).feed_page(&[], 2).await.unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_with_categories_uses_or_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .and(query_param("q", "science OR sports"))
            .and(query_param("sortBy", "publishedAt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cats = vec!["science".to_string(), "sports".to_string()];
        let articles = client(&server).feed_page(&cats, 1).await.unwrap();
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_url_requires_exact_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    article_json("https://example.com/other", "Near miss"),
                    article_json("https://example.com/target", "Target"),
                ]
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let found = c.find_by_url("https://example.com/target").await.unwrap();
        assert_eq!(found.title, "Target");

        let missing = c.find_by_url("https://example.com/absent").await;
        assert!(matches!(missing, Err(ProviderError::NotFound)));
    }

    #[test]
    fn test_insecure_base_url_rejected() {
        let result = NewsClient::new(
            build_http_client().unwrap(),
            "http://news.example.com",
            SecretString::from("k"),
        );
        assert!(matches!(result, Err(ProviderError::InvalidBaseUrl(_))));
    }
}

//! Coordinator between user intents, the store and the providers.
//!
//! Every operation here is a short synchronous dispatch sequence. Provider
//! calls are spawned onto the runtime, tagged with the epoch of the slot they
//! will fill, and report back over a channel as a single completion action.
//! Nothing is aborted: a completion that outlived its slot (reset, a newer
//! search, a cleared detail view) is dropped by the reducer.
//!
//! Callers drive completions with [`Dashboard::next_completion`] or
//! [`Dashboard::settle`].
use futures::FutureExt;
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::model::{ContentKind, FavoriteItem, Favoritable, NewsArticle};
use crate::providers::{build_http_client, NewsClient, ProviderError, TmdbClient};
use crate::storage::PersistentBridge;
use crate::store::favorites;
use crate::store::{
    AppState, ContentAction, ContentError, Detail, FavoritesAction, Items, PersistenceHandle,
    PreferencesAction, Store,
};
use crate::util::validate_article_url;

/// Articles remembered for detail views when no capacity is configured.
pub const DEFAULT_ARTICLE_CACHE_CAPACITY: usize = 256;

/// The provider clients; `None` where no API key is configured.
#[derive(Clone, Default)]
pub struct Providers {
    pub news: Option<NewsClient>,
    pub movies: Option<TmdbClient>,
}

impl Providers {
    /// Build clients for every provider that has a key.
    ///
    /// A missing key is not an error here; it surfaces later as a
    /// configuration error on the operations that need it.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let http = build_http_client()?;
        let timeout = config.request_timeout();

        let news = match config.news_key() {
            Some(key) => Some(
                NewsClient::new(http.clone(), &config.news_base_url, key)?
                    .with_language(&config.language)
                    .with_page_size(config.page_size)
                    .with_timeout(timeout),
            ),
            None => {
                tracing::warn!("News API key not configured");
                None
            }
        };

        let movies = match config.tmdb_key() {
            Some(key) => {
                Some(TmdbClient::new(http, &config.tmdb_base_url, key)?.with_timeout(timeout))
            }
            None => {
                tracing::warn!("TMDB API key not configured");
                None
            }
        };

        Ok(Self { news, movies })
    }
}

/// What a fetch request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A provider call was spawned.
    Started,
    /// Skipped: the list already has a page in flight.
    AlreadyLoading,
    /// Skipped: the list has no more pages until it is reset.
    Exhausted,
    /// Served from the article cache without a provider call.
    Cached,
}

pub struct Dashboard {
    store: Store,
    providers: Providers,
    bridge: PersistentBridge,
    /// Every article seen in a list or search result, keyed by URL.
    articles: LruCache<String, NewsArticle>,
    completions_tx: mpsc::UnboundedSender<ContentAction>,
    completions_rx: mpsc::UnboundedReceiver<ContentAction>,
    /// Spawned provider calls whose completion has not been applied yet.
    outstanding: usize,
    persistence: Option<PersistenceHandle>,
}

impl Dashboard {
    pub fn new(providers: Providers, bridge: PersistentBridge) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            store: Store::new(),
            providers,
            bridge,
            articles: LruCache::new(cache_capacity(DEFAULT_ARTICLE_CACHE_CAPACITY)),
            completions_tx,
            completions_rx,
            outstanding: 0,
            persistence: None,
        }
    }

    pub fn from_config(config: &Config, bridge: PersistentBridge) -> Result<Self, ProviderError> {
        let providers = Providers::from_config(config)?;
        Ok(Self::new(providers, bridge).with_article_cache_capacity(config.article_cache_capacity))
    }

    pub fn with_article_cache_capacity(mut self, capacity: usize) -> Self {
        self.articles = LruCache::new(cache_capacity(capacity));
        self
    }

    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Provider calls still awaiting [`next_completion`](Self::next_completion).
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Providers that cannot be used, as the errors their operations report.
    pub fn configuration_issues(&self) -> Vec<ContentError> {
        let mut issues = Vec::new();
        if self.providers.news.is_none() {
            issues.push(ContentError::missing_key(ContentKind::News));
        }
        if self.providers.movies.is_none() {
            issues.push(ContentError::missing_key(ContentKind::Movie));
        }
        issues
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Load persisted preferences and favorites, then start persisting
    /// changes. Calling it again is a no-op.
    pub async fn bootstrap(&mut self) {
        if self.persistence.is_some() {
            tracing::debug!("Dashboard already bootstrapped");
            return;
        }

        let preferences = self.bridge.load_preferences().await;
        let favorites = self.bridge.load_favorites().await;
        tracing::info!(
            dark_mode = preferences.dark_mode,
            categories = preferences.favorite_categories.len(),
            favorites = favorites.len(),
            durable = self.bridge.is_durable(),
            "Restored saved state"
        );

        // Rehydrate before subscribing; the listeners ignore rehydrates anyway.
        self.store.dispatch(PreferencesAction::Rehydrate(preferences));
        self.store.dispatch(FavoritesAction::Rehydrate(favorites));
        self.persistence = Some(PersistenceHandle::install(
            &mut self.store,
            self.bridge.clone(),
        ));
    }

    /// Wait for the next provider call to finish and apply it.
    ///
    /// Returns `None` immediately when nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<ContentAction> {
        if self.outstanding == 0 {
            return None;
        }
        // `completions_tx` lives in self, so the channel never closes here.
        let action = self.completions_rx.recv().await?;
        self.outstanding -= 1;
        self.remember_articles(&action);
        self.store.dispatch(action.clone());
        Some(action)
    }

    /// Apply completions until no provider call is outstanding.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Stop persisting and wait for queued writes. Returns the number of
    /// writes made since bootstrap.
    pub async fn shutdown(mut self) -> usize {
        if self.outstanding > 0 {
            tracing::debug!(outstanding = self.outstanding, "Dropping unfinished provider calls");
        }
        match self.persistence.take() {
            Some(handle) => handle.teardown(&mut self.store).await,
            None => 0,
        }
    }

    // ------------------------------------------------------------------------
    // Paginated lists
    // ------------------------------------------------------------------------

    /// Request the next page of the news feed or the trending movies.
    ///
    /// At most one page per list is in flight; a second call while one is
    /// pending returns [`Dispatched::AlreadyLoading`] without a request.
    pub fn fetch_next_page(&mut self, kind: ContentKind) -> Result<Dispatched, ContentError> {
        let cursor = self.state().content.cursor(kind);
        if cursor.in_flight {
            tracing::debug!(kind = %kind, page = cursor.page, "Page already loading, skipping");
            return Ok(Dispatched::AlreadyLoading);
        }
        if !cursor.has_more {
            tracing::debug!(kind = %kind, "No more pages");
            return Ok(Dispatched::Exhausted);
        }

        let epoch = cursor.epoch;
        let page = cursor.page;
        let fail = move |error| ContentAction::PageFailed { kind, epoch, error };

        match kind {
            ContentKind::News => {
                let Some(client) = self.providers.news.clone() else {
                    return Err(self.reject(ContentError::missing_key(kind)));
                };
                let categories = self.state().preferences.favorite_categories.clone();
                self.store.dispatch(ContentAction::PagePending { kind, epoch });
                self.spawn(fail(network("Failed to fetch news")), async move {
                    match client.feed_page(&categories, page).await {
                        Ok(articles) => ContentAction::PageLoaded {
                            epoch,
                            items: Items::News(articles),
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, page, "News page failed");
                            fail(ContentError::from_provider(&e, "Failed to fetch news"))
                        }
                    }
                });
            }
            ContentKind::Movie => {
                let Some(client) = self.providers.movies.clone() else {
                    return Err(self.reject(ContentError::missing_key(kind)));
                };
                self.store.dispatch(ContentAction::PagePending { kind, epoch });
                self.spawn(fail(network("Failed to fetch trending movies")), async move {
                    match client.trending(page).await {
                        Ok(movies) => ContentAction::PageLoaded {
                            epoch,
                            items: Items::Movies(movies),
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, page, "Trending page failed");
                            fail(ContentError::from_provider(
                                &e,
                                "Failed to fetch trending movies",
                            ))
                        }
                    }
                });
            }
        }

        tracing::debug!(kind = %kind, page, epoch, "Requested page");
        Ok(Dispatched::Started)
    }

    /// Empty a list and rewind its cursor. A page still in flight for it
    /// will be discarded when it lands.
    pub fn reset(&mut self, kind: ContentKind) {
        self.store.dispatch(ContentAction::Reset(kind));
    }

    // ------------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------------

    pub fn toggle_dark_mode(&mut self) {
        self.store.dispatch(PreferencesAction::ToggleDarkMode);
    }

    /// Replace the category set, then rebuild the news feed from page 1.
    pub fn set_favorite_categories(
        &mut self,
        categories: Vec<String>,
    ) -> Result<Dispatched, ContentError> {
        self.store
            .dispatch(PreferencesAction::SetFavoriteCategories(categories));
        self.reset(ContentKind::News);
        self.fetch_next_page(ContentKind::News)
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// Search both providers. Fails only if neither search could start.
    ///
    /// A provider that cannot search leaves its error in state even when
    /// the other search started.
    pub fn search(&mut self, query: &str) -> Result<(), ContentError> {
        let query = self.validate_query(query, &[ContentKind::News, ContentKind::Movie])?;
        let news = self.start_news_search(query.clone());
        let movies = self.start_movie_search(query);
        match (news, movies) {
            (Err(e), Err(_)) => Err(self.reject(e)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => {
                self.reject(e);
                Ok(())
            }
            (Ok(_), Ok(_)) => Ok(()),
        }
    }

    pub fn search_news(&mut self, query: &str) -> Result<Dispatched, ContentError> {
        let query = self.validate_query(query, &[ContentKind::News])?;
        self.start_news_search(query).map_err(|e| self.reject(e))
    }

    pub fn search_movies(&mut self, query: &str) -> Result<Dispatched, ContentError> {
        let query = self.validate_query(query, &[ContentKind::Movie])?;
        self.start_movie_search(query).map_err(|e| self.reject(e))
    }

    fn start_news_search(&mut self, query: String) -> Result<Dispatched, ContentError> {
        let kind = ContentKind::News;
        let Some(client) = self.providers.news.clone() else {
            return Err(ContentError::missing_key(kind));
        };

        let epoch = self.state().content.next_search_epoch(kind);
        let fail = move |error| ContentAction::SearchFailed { kind, epoch, error };
        self.store.dispatch(ContentAction::SearchPending { kind, epoch });
        self.spawn(fail(network("Failed to search news")), async move {
            match client.search(&query).await {
                Ok(articles) => ContentAction::SearchLoaded {
                    epoch,
                    items: Items::News(articles),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "News search failed");
                    fail(ContentError::from_provider(&e, "Failed to search news"))
                }
            }
        });
        Ok(Dispatched::Started)
    }

    fn start_movie_search(&mut self, query: String) -> Result<Dispatched, ContentError> {
        let kind = ContentKind::Movie;
        let Some(client) = self.providers.movies.clone() else {
            return Err(ContentError::missing_key(kind));
        };

        let epoch = self.state().content.next_search_epoch(kind);
        let fail = move |error| ContentAction::SearchFailed { kind, epoch, error };
        self.store.dispatch(ContentAction::SearchPending { kind, epoch });
        self.spawn(fail(network("Failed to search movies")), async move {
            match client.search(&query).await {
                Ok(movies) => ContentAction::SearchLoaded {
                    epoch,
                    items: Items::Movies(movies),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Movie search failed");
                    fail(ContentError::from_provider(&e, "Failed to search movies"))
                }
            }
        });
        Ok(Dispatched::Started)
    }

    pub fn clear_search_results(&mut self) {
        self.store.dispatch(ContentAction::ClearSearchResults);
    }

    // ------------------------------------------------------------------------
    // Detail views
    // ------------------------------------------------------------------------

    /// Load the full record for one movie into the detail slot.
    pub fn load_movie(&mut self, id: u64) -> Result<Dispatched, ContentError> {
        let kind = ContentKind::Movie;
        let Some(client) = self.providers.movies.clone() else {
            return Err(self.reject(ContentError::missing_key(kind)));
        };

        let epoch = self.state().content.next_detail_epoch(kind);
        let fail = move |error| ContentAction::DetailFailed { kind, epoch, error };
        self.store.dispatch(ContentAction::DetailPending { kind, epoch });
        self.spawn(fail(network("Failed to fetch movie details")), async move {
            match client.movie(id).await {
                Ok(movie) => ContentAction::DetailLoaded {
                    epoch,
                    detail: Detail::Movie(movie),
                },
                Err(ProviderError::NotFound) => {
                    fail(ContentError::NotFound("Movie not found.".to_string()))
                }
                Err(e) => {
                    tracing::warn!(error = %e, id, "Movie detail failed");
                    fail(ContentError::from_provider(&e, "Failed to fetch movie details"))
                }
            }
        });
        Ok(Dispatched::Started)
    }

    /// Show an article by URL.
    ///
    /// Articles already seen in a list or search are served from the cache.
    /// Otherwise the provider is searched for that exact URL; a result set
    /// without an exact match is reported as not found.
    pub fn load_article(&mut self, url: &str) -> Result<Dispatched, ContentError> {
        let url = url.trim();
        if let Err(e) = validate_article_url(url) {
            tracing::debug!(error = %e, "Rejected article URL");
            return Err(self.reject(ContentError::Validation(
                "Invalid article URL.".to_string(),
            )));
        }

        let kind = ContentKind::News;
        let epoch = self.state().content.next_detail_epoch(kind);

        if let Some(article) = self.articles.get(url).cloned() {
            tracing::debug!(url, "Article served from cache");
            self.store.dispatch(ContentAction::DetailPending { kind, epoch });
            self.store.dispatch(ContentAction::DetailLoaded {
                epoch,
                detail: Detail::Article(article),
            });
            return Ok(Dispatched::Cached);
        }

        let Some(client) = self.providers.news.clone() else {
            return Err(self.reject(ContentError::missing_key(kind)));
        };

        let url = url.to_string();
        let fail = move |error| ContentAction::DetailFailed { kind, epoch, error };
        self.store.dispatch(ContentAction::DetailPending { kind, epoch });
        self.spawn(fail(network("Failed to fetch article")), async move {
            match client.find_by_url(&url).await {
                Ok(article) => ContentAction::DetailLoaded {
                    epoch,
                    detail: Detail::Article(article),
                },
                Err(ProviderError::NotFound) => {
                    fail(ContentError::NotFound("Article not found.".to_string()))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Article lookup failed");
                    fail(ContentError::from_provider(&e, "Failed to fetch article"))
                }
            }
        });
        Ok(Dispatched::Started)
    }

    pub fn clear_current_movie(&mut self) {
        self.store.dispatch(ContentAction::ClearDetail(ContentKind::Movie));
    }

    pub fn clear_current_article(&mut self) {
        self.store.dispatch(ContentAction::ClearDetail(ContentKind::News));
    }

    // ------------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------------

    pub fn add_favorite(&mut self, item: FavoriteItem) {
        self.store.dispatch(FavoritesAction::Add(item));
    }

    pub fn remove_favorite(&mut self, id: &str) {
        self.store.dispatch(FavoritesAction::Remove(id.to_string()));
    }

    /// Remove `item` if it is a favorite, else add a snapshot of it.
    /// Returns whether it is a favorite afterwards.
    pub fn toggle_favorite(&mut self, item: &impl Favoritable) -> bool {
        let id = item.favorite_id();
        if self.is_favorite(&id) {
            self.remove_favorite(&id);
            false
        } else {
            self.add_favorite(item.to_favorite());
            true
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        favorites::contains(&self.state().favorites, id)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Trim `query`; an empty one also empties the result sets of `kinds`.
    fn validate_query(&mut self, query: &str, kinds: &[ContentKind]) -> Result<String, ContentError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            for kind in kinds {
                self.store.dispatch(ContentAction::ClearSearch(*kind));
            }
            return Err(self.reject(ContentError::empty_query()));
        }
        Ok(trimmed.to_string())
    }

    /// Record a request that was refused before it started.
    fn reject(&mut self, error: ContentError) -> ContentError {
        tracing::warn!(error = %error, "Request rejected");
        self.store.dispatch(ContentAction::Rejected(error.clone()));
        error
    }

    /// Run a provider call in the background and queue its completion.
    ///
    /// If the task panics, `on_panic` is delivered instead so the slot it
    /// was filling still leaves the loading state.
    fn spawn<F>(&mut self, on_panic: ContentAction, task: F)
    where
        F: Future<Output = ContentAction> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let action = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(action) => action,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&'static str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(error = %message, "Provider task panicked");
                    on_panic
                }
            };
            if tx.send(action).is_err() {
                tracing::debug!("Dashboard dropped before provider call finished");
            }
        });
    }

    /// Cache every article a completion carries, stale or not.
    fn remember_articles(&mut self, action: &ContentAction) {
        let articles: &[NewsArticle] = match action {
            ContentAction::PageLoaded {
                items: Items::News(articles),
                ..
            }
            | ContentAction::SearchLoaded {
                items: Items::News(articles),
                ..
            } => articles.as_slice(),
            ContentAction::DetailLoaded {
                detail: Detail::Article(article),
                ..
            } => std::slice::from_ref(article),
            _ => return,
        };
        for article in articles {
            self.articles.put(article.url.clone(), article.clone());
        }
    }
}

fn network(message: &str) -> ContentError {
    ContentError::Network(message.to_string())
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Movie;
    use crate::store::LoadStatus;
    use pretty_assertions::assert_eq;

    fn unconfigured() -> Dashboard {
        Dashboard::new(Providers::default(), PersistentBridge::detached())
    }

    fn movie(id: u64) -> Movie {
        Movie {
            id,
            title: format!("Movie {id}"),
            overview: "Plot.".to_string(),
            poster_path: Some(format!("/{id}.jpg")),
            release_date: "2020-01-01".to_string(),
            vote_average: 6.5,
            genres: Vec::new(),
            runtime: None,
            tagline: None,
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let mut dash = unconfigured();
        let err = dash.fetch_next_page(ContentKind::Movie).unwrap_err();

        assert_eq!(err, ContentError::missing_key(ContentKind::Movie));
        assert!(!dash.state().content.loading());
        assert_eq!(dash.state().content.movies.status, LoadStatus::Idle);
        assert_eq!(dash.outstanding(), 0);
        assert_eq!(dash.state().content.error, Some(err));
    }

    #[tokio::test]
    async fn test_configuration_issues_lists_both_providers() {
        let dash = unconfigured();
        assert_eq!(
            dash.configuration_issues(),
            vec![
                ContentError::Configuration("News API Key is not configured.".to_string()),
                ContentError::Configuration("TMDB API Key is not configured.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_provider_check() {
        let mut dash = unconfigured();
        assert_eq!(dash.search("   "), Err(ContentError::empty_query()));
        assert_eq!(dash.state().content.error, Some(ContentError::empty_query()));
    }

    #[tokio::test]
    async fn test_invalid_article_url_rejected() {
        let mut dash = unconfigured();
        let err = dash.load_article("javascript:alert(1)").unwrap_err();
        assert!(matches!(err, ContentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let mut dash = unconfigured();
        let m = movie(42);
        assert!(dash.toggle_favorite(&m));
        assert!(dash.is_favorite("42"));
        assert!(!dash.toggle_favorite(&m));
        assert!(!dash.is_favorite("42"));
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let mut dash = unconfigured();
        dash.bootstrap().await;
        dash.bootstrap().await;
        assert_eq!(dash.store().listener_count(), 2);
        assert_eq!(dash.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_settle_without_outstanding_returns() {
        let mut dash = unconfigured();
        dash.settle().await;
        assert!(dash.next_completion().await.is_none());
    }
}

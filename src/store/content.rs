//! Content slice: the two paginated feeds, per-kind search results and
//! detail slots.
//!
//! Every asynchronous load goes through the same three steps: a pending
//! action stamped with an epoch, then exactly one loaded or failed action
//! carrying that same epoch. A completion whose epoch no longer matches its
//! slot, or that arrives when the slot is not loading, is stale and dropped.
use thiserror::Error;

use crate::model::{ContentKind, Movie, NewsArticle};
use crate::providers::ProviderError;

// ============================================================================
// Errors
// ============================================================================

/// User-visible failure recorded in state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    /// Missing API key. Not retried; shown as a persistent banner.
    #[error("{0}")]
    Configuration(String),
    /// Provider unreachable or non-2xx. Loaded pages are kept.
    #[error("{0}")]
    Network(String),
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),
    /// Detail lookup found no exact match.
    #[error("{0}")]
    NotFound(String),
}

impl ContentError {
    /// Provider message when the response carried one, else `fallback`.
    pub fn from_provider(err: &ProviderError, fallback: &str) -> Self {
        let message = err.provider_message().unwrap_or(fallback);
        ContentError::Network(message.to_string())
    }

    pub fn missing_key(kind: ContentKind) -> Self {
        match kind {
            ContentKind::News => {
                ContentError::Configuration("News API Key is not configured.".to_string())
            }
            ContentKind::Movie => {
                ContentError::Configuration("TMDB API Key is not configured.".to_string())
            }
        }
    }

    pub fn empty_query() -> Self {
        ContentError::Validation("Search query cannot be empty.".to_string())
    }
}

// ============================================================================
// Load Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

// ============================================================================
// Paginated List
// ============================================================================

/// An append-only list filled one page at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    /// Next page to request. Starts at 1.
    pub page: u32,
    pub has_more: bool,
    pub status: LoadStatus,
    /// Generation of the current request sequence; bumped by a reset that
    /// interrupts a load.
    pub epoch: u64,
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            has_more: true,
            status: LoadStatus::Idle,
            epoch: 0,
        }
    }
}

impl<T> PagedList<T> {
    pub fn in_flight(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    /// Back to an empty first page.
    ///
    /// Only a reset that interrupts a load needs a new epoch; with nothing
    /// pending the epoch stays put, so resetting twice equals resetting once.
    pub fn reset(&mut self) {
        if self.in_flight() {
            self.epoch += 1;
        }
        self.items.clear();
        self.page = 1;
        self.has_more = true;
        self.status = LoadStatus::Idle;
    }

    /// Returns false if the request must not start.
    fn begin(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.in_flight() || !self.has_more {
            return false;
        }
        self.status = LoadStatus::Loading;
        true
    }

    fn accepts(&self, epoch: u64) -> bool {
        self.in_flight() && epoch == self.epoch
    }

    fn append(&mut self, epoch: u64, page: Vec<T>) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.has_more = !page.is_empty();
        self.items.extend(page);
        self.page += 1;
        self.status = LoadStatus::Loaded;
        true
    }

    fn fail(&mut self, epoch: u64) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.has_more = false;
        self.status = LoadStatus::Failed;
        true
    }
}

// ============================================================================
// One-shot Slots
// ============================================================================

/// Search results for one kind: replaced wholesale by every search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<T> {
    pub items: Vec<T>,
    pub status: LoadStatus,
    pub epoch: u64,
}

impl<T> Default for SearchResults<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            status: LoadStatus::Idle,
            epoch: 0,
        }
    }
}

impl<T> SearchResults<T> {
    fn begin(&mut self, epoch: u64) {
        self.items.clear();
        self.status = LoadStatus::Loading;
        self.epoch = epoch;
    }

    fn accepts(&self, epoch: u64) -> bool {
        self.status == LoadStatus::Loading && epoch == self.epoch
    }

    fn replace(&mut self, epoch: u64, items: Vec<T>) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.items = items;
        self.status = LoadStatus::Loaded;
        true
    }

    fn fail(&mut self, epoch: u64) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.items.clear();
        self.status = LoadStatus::Failed;
        true
    }

    fn clear(&mut self) {
        if self.status == LoadStatus::Loading {
            self.epoch += 1;
        }
        self.items.clear();
        self.status = LoadStatus::Idle;
    }
}

/// The record shown by a detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailSlot<T> {
    pub current: Option<T>,
    pub status: LoadStatus,
    pub epoch: u64,
}

impl<T> Default for DetailSlot<T> {
    fn default() -> Self {
        Self {
            current: None,
            status: LoadStatus::Idle,
            epoch: 0,
        }
    }
}

impl<T> DetailSlot<T> {
    fn begin(&mut self, epoch: u64) {
        self.current = None;
        self.status = LoadStatus::Loading;
        self.epoch = epoch;
    }

    fn accepts(&self, epoch: u64) -> bool {
        self.status == LoadStatus::Loading && epoch == self.epoch
    }

    fn set(&mut self, epoch: u64, value: T) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.current = Some(value);
        self.status = LoadStatus::Loaded;
        true
    }

    fn fail(&mut self, epoch: u64) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        self.current = None;
        self.status = LoadStatus::Failed;
        true
    }

    fn clear(&mut self) {
        if self.status == LoadStatus::Loading {
            self.epoch += 1;
        }
        self.current = None;
        self.status = LoadStatus::Idle;
    }
}

// ============================================================================
// Content State
// ============================================================================

/// Cursor snapshot a coordinator needs to issue the next page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    pub page: u32,
    pub epoch: u64,
    pub has_more: bool,
    pub in_flight: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentState {
    pub news: PagedList<NewsArticle>,
    pub movies: PagedList<Movie>,
    pub search_news: SearchResults<NewsArticle>,
    pub search_movies: SearchResults<Movie>,
    pub current_article: DetailSlot<NewsArticle>,
    pub current_movie: DetailSlot<Movie>,
    /// Most recent failure; cleared whenever a new load starts.
    pub error: Option<ContentError>,
}

impl ContentState {
    /// True while any load is outstanding.
    pub fn loading(&self) -> bool {
        [
            self.news.status,
            self.movies.status,
            self.search_news.status,
            self.search_movies.status,
            self.current_article.status,
            self.current_movie.status,
        ]
        .contains(&LoadStatus::Loading)
    }

    pub fn cursor(&self, kind: ContentKind) -> ListCursor {
        match kind {
            ContentKind::News => cursor_of(&self.news),
            ContentKind::Movie => cursor_of(&self.movies),
        }
    }

    /// Epoch the next search of `kind` will be stamped with.
    pub fn next_search_epoch(&self, kind: ContentKind) -> u64 {
        match kind {
            ContentKind::News => self.search_news.epoch + 1,
            ContentKind::Movie => self.search_movies.epoch + 1,
        }
    }

    /// Epoch the next detail load of `kind` will be stamped with.
    pub fn next_detail_epoch(&self, kind: ContentKind) -> u64 {
        match kind {
            ContentKind::News => self.current_article.epoch + 1,
            ContentKind::Movie => self.current_movie.epoch + 1,
        }
    }
}

fn cursor_of<T>(list: &PagedList<T>) -> ListCursor {
    ListCursor {
        page: list.page,
        epoch: list.epoch,
        has_more: list.has_more,
        in_flight: list.in_flight(),
    }
}

// ============================================================================
// Actions
// ============================================================================

/// A batch of items from one provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    News(Vec<NewsArticle>),
    Movies(Vec<Movie>),
}

impl Items {
    pub fn kind(&self) -> ContentKind {
        match self {
            Items::News(_) => ContentKind::News,
            Items::Movies(_) => ContentKind::Movie,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Items::News(v) => v.len(),
            Items::Movies(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single detail record.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Article(NewsArticle),
    Movie(Movie),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentAction {
    Reset(ContentKind),
    PagePending { kind: ContentKind, epoch: u64 },
    PageLoaded { epoch: u64, items: Items },
    PageFailed { kind: ContentKind, epoch: u64, error: ContentError },
    SearchPending { kind: ContentKind, epoch: u64 },
    SearchLoaded { epoch: u64, items: Items },
    SearchFailed { kind: ContentKind, epoch: u64, error: ContentError },
    ClearSearchResults,
    /// Empty one search result set, dropping its in-flight request.
    ClearSearch(ContentKind),
    DetailPending { kind: ContentKind, epoch: u64 },
    DetailLoaded { epoch: u64, detail: Detail },
    DetailFailed { kind: ContentKind, epoch: u64, error: ContentError },
    ClearDetail(ContentKind),
    /// A request refused before it started (validation, configuration).
    Rejected(ContentError),
}

// ============================================================================
// Reducer
// ============================================================================

pub fn reduce(state: &mut ContentState, action: &ContentAction) {
    match action {
        ContentAction::Reset(kind) => {
            match kind {
                ContentKind::News => state.news.reset(),
                ContentKind::Movie => state.movies.reset(),
            }
            state.error = None;
        }
        ContentAction::PagePending { kind, epoch } => {
            let started = match kind {
                ContentKind::News => state.news.begin(*epoch),
                ContentKind::Movie => state.movies.begin(*epoch),
            };
            if started {
                state.error = None;
            } else {
                tracing::debug!(kind = %kind, epoch, "Ignoring page request for busy or exhausted list");
            }
        }
        ContentAction::PageLoaded { epoch, items } => {
            let kind = items.kind();
            let applied = match items.clone() {
                Items::News(v) => state.news.append(*epoch, v),
                Items::Movies(v) => state.movies.append(*epoch, v),
            };
            if !applied {
                tracing::debug!(kind = %kind, epoch, "Discarding stale page");
            }
        }
        ContentAction::PageFailed { kind, epoch, error } => {
            let applied = match kind {
                ContentKind::News => state.news.fail(*epoch),
                ContentKind::Movie => state.movies.fail(*epoch),
            };
            if applied {
                state.error = Some(error.clone());
            } else {
                tracing::debug!(kind = %kind, epoch, "Discarding stale page failure");
            }
        }
        ContentAction::SearchPending { kind, epoch } => {
            match kind {
                ContentKind::News => state.search_news.begin(*epoch),
                ContentKind::Movie => state.search_movies.begin(*epoch),
            }
            state.error = None;
        }
        ContentAction::SearchLoaded { epoch, items } => {
            let kind = items.kind();
            let applied = match items.clone() {
                Items::News(v) => state.search_news.replace(*epoch, v),
                Items::Movies(v) => state.search_movies.replace(*epoch, v),
            };
            if !applied {
                tracing::debug!(kind = %kind, epoch, "Discarding stale search results");
            }
        }
        ContentAction::SearchFailed { kind, epoch, error } => {
            let applied = match kind {
                ContentKind::News => state.search_news.fail(*epoch),
                ContentKind::Movie => state.search_movies.fail(*epoch),
            };
            if applied {
                state.error = Some(error.clone());
            }
        }
        ContentAction::ClearSearchResults => {
            state.search_news.clear();
            state.search_movies.clear();
            state.error = None;
        }
        ContentAction::ClearSearch(kind) => {
            match kind {
                ContentKind::News => state.search_news.clear(),
                ContentKind::Movie => state.search_movies.clear(),
            }
            state.error = None;
        }
        ContentAction::DetailPending { kind, epoch } => {
            match kind {
                ContentKind::News => state.current_article.begin(*epoch),
                ContentKind::Movie => state.current_movie.begin(*epoch),
            }
            state.error = None;
        }
        ContentAction::DetailLoaded { epoch, detail } => {
            let applied = match detail.clone() {
                Detail::Article(a) => state.current_article.set(*epoch, a),
                Detail::Movie(m) => state.current_movie.set(*epoch, m),
            };
            if !applied {
                tracing::debug!(epoch, "Discarding stale detail");
            }
        }
        ContentAction::DetailFailed { kind, epoch, error } => {
            let applied = match kind {
                ContentKind::News => state.current_article.fail(*epoch),
                ContentKind::Movie => state.current_movie.fail(*epoch),
            };
            if applied {
                state.error = Some(error.clone());
            }
        }
        ContentAction::ClearDetail(kind) => match kind {
            ContentKind::News => state.current_article.clear(),
            ContentKind::Movie => state.current_movie.clear(),
        },
        ContentAction::Rejected(error) => {
            state.error = Some(error.clone());
        }
    }
}

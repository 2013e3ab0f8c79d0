//! Content records shared by the providers, the store and the renderer.
//!
//! A news article is identified by its canonical URL; a movie by its numeric
//! provider id. Those ids are the only fields used for deduplication and for
//! matching favorites anywhere in the crate.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Content Kinds
// ============================================================================

/// Which provider a piece of content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    News,
    Movie,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Movie => "movie",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// News
// ============================================================================

/// A normalized news article.
///
/// `image_url` is absolute as delivered by the news provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub source_name: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Canonical URL, the article's identity.
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub body: Option<String>,
}

// ============================================================================
// Movies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// A movie as returned by the list, search or detail endpoints.
///
/// `poster_path` is the provider's relative path (e.g. `/abc.jpg`); resolving
/// it against the image host is the renderer's job. `genres`, `runtime` and
/// `tagline` are only populated by a detail fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub tagline: Option<String>,
}

impl Movie {
    /// Release year parsed from `release_date` (`YYYY-MM-DD`), if present.
    pub fn release_year(&self) -> Option<i32> {
        use chrono::Datelike;
        NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .ok()
            .map(|d| d.year())
    }

    pub fn display_year(&self) -> String {
        self.release_year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Runtime as `"N min"`.
    pub fn display_runtime(&self) -> String {
        match self.runtime {
            Some(minutes) if minutes > 0 => format!("{} min", minutes),
            _ => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn display_genres(&self) -> String {
        if self.genres.is_empty() {
            return NOT_AVAILABLE.to_string();
        }
        self.genres
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Vote average to one decimal.
    pub fn display_rating(&self) -> String {
        format!("{:.1}", self.vote_average)
    }
}

/// Placeholder for detail fields the provider left empty.
pub const NOT_AVAILABLE: &str = "N/A";

// ============================================================================
// Favorites
// ============================================================================

/// Denormalized snapshot of an item taken at the moment it was favorited.
///
/// Serialized with the field names the `favorites` blob has always used
/// (`type`, `imageUrl`), so previously saved collections load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Something that can be shown on a card and added to favorites.
pub trait Favoritable {
    /// Identity used for deduplication and favorite matching.
    fn favorite_id(&self) -> String;

    /// Snapshot the fields a favorite keeps.
    fn to_favorite(&self) -> FavoriteItem;
}

impl Favoritable for NewsArticle {
    fn favorite_id(&self) -> String {
        self.url.clone()
    }

    fn to_favorite(&self) -> FavoriteItem {
        FavoriteItem {
            id: self.favorite_id(),
            kind: ContentKind::News,
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            url: Some(self.url.clone()),
        }
    }
}

impl Favoritable for Movie {
    fn favorite_id(&self) -> String {
        self.id.to_string()
    }

    fn to_favorite(&self) -> FavoriteItem {
        FavoriteItem {
            id: self.favorite_id(),
            kind: ContentKind::Movie,
            title: self.title.clone(),
            description: (!self.overview.is_empty()).then(|| self.overview.clone()),
            image_url: self.poster_path.clone(),
            url: Some(crate::providers::tmdb::movie_page_url(self.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: u64) -> Movie {
        Movie {
            id,
            title: "Dune".to_string(),
            overview: "Sand.".to_string(),
            poster_path: Some("/dune.jpg".to_string()),
            release_date: "2021-10-22".to_string(),
            vote_average: 7.8,
            genres: Vec::new(),
            runtime: None,
            tagline: None,
        }
    }

    #[test]
    fn test_movie_identity_is_numeric_id() {
        let fav = movie(438631).to_favorite();
        assert_eq!(fav.id, "438631");
        assert_eq!(fav.kind, ContentKind::Movie);
        assert_eq!(fav.image_url.as_deref(), Some("/dune.jpg"));
        assert_eq!(
            fav.url.as_deref(),
            Some("https://www.themoviedb.org/movie/438631")
        );
    }

    #[test]
    fn test_article_identity_is_url() {
        let article = NewsArticle {
            source_name: "Wire".to_string(),
            author: None,
            title: "Headline".to_string(),
            description: None,
            url: "https://example.com/a".to_string(),
            image_url: Some("https://img.example.com/a.png".to_string()),
            published_at: Utc::now(),
            body: None,
        };
        assert_eq!(article.favorite_id(), "https://example.com/a");
        let fav = article.to_favorite();
        assert_eq!(fav.kind, ContentKind::News);
        assert_eq!(fav.url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_release_year() {
        assert_eq!(movie(1).release_year(), Some(2021));
        let mut m = movie(1);
        m.release_date = String::new();
        assert_eq!(m.release_year(), None);
    }

    #[test]
    fn test_detail_display_values() {
        let mut m = movie(1);
        assert_eq!(m.display_year(), "2021");
        assert_eq!(m.display_runtime(), "N/A");
        assert_eq!(m.display_genres(), "N/A");
        assert_eq!(m.display_rating(), "7.8");

        m.runtime = Some(155);
        m.genres = vec![
            Genre {
                id: 878,
                name: "Science Fiction".to_string(),
            },
            Genre {
                id: 12,
                name: "Adventure".to_string(),
            },
        ];
        m.vote_average = 8.0;
        assert_eq!(m.display_runtime(), "155 min");
        assert_eq!(m.display_genres(), "Science Fiction, Adventure");
        assert_eq!(m.display_rating(), "8.0");
    }

    #[test]
    fn test_favorite_serializes_legacy_field_names() {
        let json = serde_json::to_value(movie(7).to_favorite()).unwrap();
        assert_eq!(json["type"], "movie");
        assert_eq!(json["imageUrl"], "/dune.jpg");
    }

    #[test]
    fn test_movie_detail_fields_default_when_absent() {
        let m: Movie = serde_json::from_str(r#"{"id": 5, "title": "X"}"#).unwrap();
        assert!(m.genres.is_empty());
        assert_eq!(m.runtime, None);
        assert_eq!(m.vote_average, 0.0);
    }
}

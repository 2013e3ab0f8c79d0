use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use glance::config::Config;
use glance::dashboard::Dashboard;
use glance::model::{ContentKind, FavoriteItem, Movie, NewsArticle};
use glance::providers::news::CATEGORIES;
use glance::providers::{movie_page_url, poster_url, PosterSize};
use glance::storage::{Database, PersistentBridge};
use glance::store::AppState;
use glance::util::{sanitize_line, truncate_to_width};

/// Width of one-line cards, in columns.
const CARD_WIDTH: usize = 100;

/// Get the config directory path (~/.config/glance/)
fn default_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("glance"))
}

#[derive(Parser, Debug)]
#[command(name = "glance", about = "News headlines and trending movies in your terminal")]
struct Args {
    /// Directory holding config.toml and the saved-state database
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// News feed filtered by your favorite categories
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// This week's trending movies
    Trending {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Search news and movies
    Search { query: String },
    /// Movie details
    Movie { id: u64 },
    /// Article details by URL
    Article { url: String },
    /// List or edit favorites
    #[command(subcommand)]
    Favorites(FavoritesCommand),
    /// Toggle dark mode
    DarkMode,
    /// Replace favorite news categories (none clears the filter)
    Categories { tags: Vec<String> },
    /// Show preferences and provider status
    Settings,
}

#[derive(Subcommand, Debug)]
enum FavoritesCommand {
    List,
    /// Add or remove a movie
    ToggleMovie { id: u64 },
    /// Add or remove an article
    ToggleArticle { url: String },
    /// Remove by id (movie id or article URL)
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    prepare_data_dir(&data_dir)?;

    let config = Config::load(&data_dir.join("config.toml"))
        .context("Failed to load config.toml")?
        .with_env_overrides();
    tracing::debug!(?config, "Effective configuration");

    let bridge = open_bridge(&data_dir.join("glance.db")).await;
    let mut dashboard =
        Dashboard::from_config(&config, bridge).context("Failed to set up providers")?;
    dashboard.bootstrap().await;

    for issue in dashboard.configuration_issues() {
        eprintln!("! {}", issue);
    }

    let result = run(args.command, &mut dashboard).await;
    let writes = dashboard.shutdown().await;
    tracing::debug!(writes, "Saved state flushed");
    result
}

fn prepare_data_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(path = %dir.display(), error = %e, "Failed to restrict data directory");
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read data directory metadata");
            }
        }
    }
    Ok(())
}

/// Open the durable store, or run without one if it cannot be opened.
async fn open_bridge(path: &Path) -> PersistentBridge {
    let Some(path_str) = path.to_str() else {
        tracing::warn!(path = %path.display(), "Non UTF-8 database path, state will not be saved");
        return PersistentBridge::detached();
    };
    match Database::open(path_str).await {
        Ok(db) => PersistentBridge::new(db),
        Err(e) => {
            tracing::warn!(error = %e, "Could not open saved state, continuing without it");
            PersistentBridge::detached()
        }
    }
}

async fn run(command: Command, dash: &mut Dashboard) -> Result<()> {
    match command {
        Command::Feed { pages } => {
            load_pages(dash, ContentKind::News, pages).await?;
            let state = dash.state();
            let categories = &state.preferences.favorite_categories;
            if categories.is_empty() {
                println!("Top headlines");
            } else {
                println!("Headlines for {}", categories.join(", "));
            }
            print_articles(state, &state.content.news.items);
        }
        Command::Trending { pages } => {
            load_pages(dash, ContentKind::Movie, pages).await?;
            let state = dash.state();
            println!("Trending this week");
            print_movies(state, &state.content.movies.items);
        }
        Command::Search { query } => {
            dash.search(&query)?;
            dash.settle().await;
            let state = dash.state();
            println!("News matching \"{}\"", sanitize_line(&query));
            print_articles(state, &state.content.search_news.items);
            println!();
            println!("Movies matching \"{}\"", sanitize_line(&query));
            print_movies(state, &state.content.search_movies.items);
        }
        Command::Movie { id } => {
            dash.load_movie(id)?;
            dash.settle().await;
            match &dash.state().content.current_movie.current {
                Some(movie) => print_movie_detail(movie),
                None => report_error(dash.state()),
            }
            dash.clear_current_movie();
        }
        Command::Article { url } => {
            dash.load_article(&url)?;
            dash.settle().await;
            match &dash.state().content.current_article.current {
                Some(article) => print_article_detail(article),
                None => report_error(dash.state()),
            }
            dash.clear_current_article();
        }
        Command::Favorites(cmd) => run_favorites(cmd, dash).await?,
        Command::DarkMode => {
            dash.toggle_dark_mode();
            let on = dash.state().preferences.dark_mode;
            println!("Dark mode {}", if on { "on" } else { "off" });
        }
        Command::Categories { tags } => {
            let tags: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
            for tag in &tags {
                if !CATEGORIES.contains(&tag.as_str()) {
                    eprintln!("Note: '{}' is not one of {}", tag, CATEGORIES.join(", "));
                }
            }
            dash.set_favorite_categories(tags)?;
            dash.settle().await;
            let state = dash.state();
            println!(
                "Categories: {}",
                display_list(&state.preferences.favorite_categories)
            );
            print_articles(state, &state.content.news.items);
        }
        Command::Settings => {
            let state = dash.state();
            let prefs = &state.preferences;
            println!("Dark mode:   {}", if prefs.dark_mode { "on" } else { "off" });
            println!("Categories:  {}", display_list(&prefs.favorite_categories));
            println!("Available:   {}", CATEGORIES.join(", "));
            println!("Favorites:   {}", state.favorites.len());
            let issues = dash.configuration_issues();
            if issues.is_empty() {
                println!("Providers:   ready");
            } else {
                for issue in issues {
                    println!("Providers:   {}", issue);
                }
            }
        }
    }
    Ok(())
}

async fn run_favorites(cmd: FavoritesCommand, dash: &mut Dashboard) -> Result<()> {
    match cmd {
        FavoritesCommand::List => {
            let favorites = &dash.state().favorites;
            if favorites.is_empty() {
                println!("No favorites yet.");
            }
            for fav in favorites {
                println!("{}", favorite_line(fav));
            }
        }
        FavoritesCommand::ToggleMovie { id } => {
            dash.load_movie(id)?;
            dash.settle().await;
            let Some(movie) = dash.state().content.current_movie.current.clone() else {
                report_error(dash.state());
                return Ok(());
            };
            let added = dash.toggle_favorite(&movie);
            println!(
                "{} {}",
                if added { "Added" } else { "Removed" },
                sanitize_line(&movie.title)
            );
        }
        FavoritesCommand::ToggleArticle { url } => {
            dash.load_article(&url)?;
            dash.settle().await;
            let Some(article) = dash.state().content.current_article.current.clone() else {
                report_error(dash.state());
                return Ok(());
            };
            let added = dash.toggle_favorite(&article);
            println!(
                "{} {}",
                if added { "Added" } else { "Removed" },
                sanitize_line(&article.title)
            );
        }
        FavoritesCommand::Remove { id } => {
            if dash.is_favorite(&id) {
                dash.remove_favorite(&id);
                println!("Removed {}", sanitize_line(&id));
            } else {
                println!("{} is not a favorite", sanitize_line(&id));
            }
        }
    }
    Ok(())
}

/// Fetch up to `pages` pages, stopping early once the list is exhausted.
async fn load_pages(dash: &mut Dashboard, kind: ContentKind, pages: u32) -> Result<()> {
    for _ in 0..pages.max(1) {
        let before = dash.state().content.cursor(kind).page;
        dash.fetch_next_page(kind)?;
        dash.settle().await;
        let cursor = dash.state().content.cursor(kind);
        if cursor.page == before || !cursor.has_more {
            break;
        }
    }
    report_error(dash.state());
    Ok(())
}

fn report_error(state: &AppState) {
    if let Some(err) = &state.content.error {
        eprintln!("Error: {}", err);
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn star(state: &AppState, id: &str) -> &'static str {
    if state.favorites.iter().any(|f| f.id == id) {
        "*"
    } else {
        " "
    }
}

fn print_articles(state: &AppState, articles: &[NewsArticle]) {
    if articles.is_empty() {
        println!("  (nothing to show)");
    }
    for article in articles {
        let line = format!(
            "{} {}  [{}, {}]",
            star(state, &article.url),
            sanitize_line(&article.title),
            sanitize_line(&article.source_name),
            article.published_at.format("%Y-%m-%d %H:%M")
        );
        println!("{}", truncate_to_width(&line, CARD_WIDTH));
    }
}

fn print_movies(state: &AppState, movies: &[Movie]) {
    if movies.is_empty() {
        println!("  (nothing to show)");
    }
    for movie in movies {
        let line = format!(
            "{} {:>8}  {} ({})  {}",
            star(state, &movie.id.to_string()),
            movie.id,
            sanitize_line(&movie.title),
            movie.display_year(),
            movie.display_rating()
        );
        println!("{}", truncate_to_width(&line, CARD_WIDTH));
    }
}

fn print_movie_detail(movie: &Movie) {
    println!("{}", sanitize_line(&movie.title));
    if let Some(tagline) = movie.tagline.as_deref().filter(|t| !t.is_empty()) {
        println!("  \"{}\"", sanitize_line(tagline));
    }
    println!("  Year:    {}", movie.display_year());
    println!("  Runtime: {}", movie.display_runtime());
    println!("  Genres:  {}", movie.display_genres());
    println!("  Rating:  {}/10", movie.display_rating());
    if let Some(path) = &movie.poster_path {
        println!("  Poster:  {}", sanitize_line(&poster_url(path, PosterSize::W780)));
    }
    println!("  Page:    {}", movie_page_url(movie.id));
    if !movie.overview.is_empty() {
        println!();
        println!("{}", sanitize_line(&movie.overview));
    }
}

fn print_article_detail(article: &NewsArticle) {
    println!("{}", sanitize_line(&article.title));
    let by = article
        .author
        .as_deref()
        .map(|a| format!(" by {}", sanitize_line(a)))
        .unwrap_or_default();
    println!(
        "  {}{}, {}",
        sanitize_line(&article.source_name),
        by,
        article.published_at.format("%Y-%m-%d %H:%M")
    );
    println!("  {}", sanitize_line(&article.url));
    for text in [&article.description, &article.body].into_iter().flatten() {
        println!();
        println!("{}", sanitize_line(text));
    }
}

fn favorite_line(fav: &FavoriteItem) -> String {
    let image = fav
        .image_url
        .as_deref()
        .map(|path| sanitize_line(&poster_url(path, PosterSize::W500)).into_owned())
        .unwrap_or_default();
    let line = format!(
        "[{}] {}  {}  {}",
        fav.kind,
        sanitize_line(&fav.title),
        sanitize_line(fav.url.as_deref().unwrap_or(&fav.id)),
        image
    );
    truncate_to_width(&line, CARD_WIDTH).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favorite_line_strips_control_characters_from_links() {
        let fav = FavoriteItem {
            id: "https://example.com/a\x1b[2J".to_string(),
            kind: ContentKind::News,
            title: "Headline".to_string(),
            description: None,
            image_url: Some("https://img.example.com/a.png\x07".to_string()),
            url: Some("https://example.com/a\x1b[2J\nrest".to_string()),
        };
        let line = favorite_line(&fav);
        assert!(!line.chars().any(char::is_control), "{line:?}");
        assert!(line.contains("https://example.com/a [2J rest"));

        let bare = FavoriteItem { url: None, ..fav };
        assert!(!favorite_line(&bare).chars().any(char::is_control));
    }
}

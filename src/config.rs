//! Configuration file parser for ~/.config/glance/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `news_api_key`.
pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";
/// Environment variable that overrides `tmdb_api_key`.
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks both API keys to prevent secret leakage in logs,
/// error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// News provider API key (alternative to NEWS_API_KEY env var).
    pub news_api_key: Option<String>,

    /// Movie provider API key (alternative to TMDB_API_KEY env var).
    pub tmdb_api_key: Option<String>,

    /// News provider base URL.
    pub news_base_url: String,

    /// Movie provider base URL.
    pub tmdb_base_url: String,

    /// Items requested per news page.
    pub page_size: u32,

    /// Language filter passed to the news provider.
    pub language: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Number of articles remembered for detail views.
    pub article_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            news_api_key: None,
            tmdb_api_key: None,
            news_base_url: "https://newsapi.org/v2".to_string(),
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
            page_size: 20,
            language: "en".to_string(),
            request_timeout_secs: 20,
            article_cache_capacity: 256,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "news_api_key",
                &self.news_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "tmdb_api_key",
                &self.tmdb_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("news_base_url", &self.news_base_url)
            .field("tmdb_base_url", &self.tmdb_base_url)
            .field("page_size", &self.page_size)
            .field("language", &self.language)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("article_cache_capacity", &self.article_cache_capacity)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "news_api_key",
                "tmdb_api_key",
                "news_base_url",
                "tmdb_base_url",
                "page_size",
                "language",
                "request_timeout_secs",
                "article_cache_capacity",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Layer API keys from the environment over the file values.
    ///
    /// Env vars take precedence; empty values are treated as unset.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_env(NEWS_API_KEY_ENV) {
            self.news_api_key = Some(key);
        }
        if let Some(key) = non_empty_env(TMDB_API_KEY_ENV) {
            self.tmdb_api_key = Some(key);
        }
        self
    }

    /// The news key as a secret, or `None` when unconfigured.
    pub fn news_key(&self) -> Option<SecretString> {
        secret(self.news_api_key.as_deref())
    }

    /// The movie key as a secret, or `None` when unconfigured.
    pub fn tmdb_key(&self) -> Option<SecretString> {
        secret(self.tmdb_api_key.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn secret(value: Option<&str>) -> Option<SecretString> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.news_base_url, "https://newsapi.org/v2");
        assert_eq!(config.tmdb_base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.language, "en");
        assert!(config.news_api_key.is_none());
        assert!(config.tmdb_api_key.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/glance_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("glance_config_test_whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "en");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("glance_config_test_partial", "page_size = 10\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.language, "en"); // default
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
news_api_key = "news-key"
tmdb_api_key = "tmdb-key"
news_base_url = "https://news.example.com/v2"
tmdb_base_url = "https://movies.example.com/3"
page_size = 50
language = "de"
request_timeout_secs = 5
article_cache_capacity = 32
"#;
        let path = write_config("glance_config_test_full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.news_api_key.as_deref(), Some("news-key"));
        assert_eq!(config.tmdb_api_key.as_deref(), Some("tmdb-key"));
        assert_eq!(config.news_base_url, "https://news.example.com/v2");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.language, "de");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.article_cache_capacity, 32);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("glance_config_test_invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config(
            "glance_config_test_unknown",
            "page_size = 20\ntheme = \"dark\"\n",
        );
        assert!(Config::load(&path).is_ok());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("glance_config_test_too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_blank_keys_are_unconfigured() {
        let config = Config {
            news_api_key: Some("   ".to_string()),
            tmdb_api_key: Some("abc".to_string()),
            ..Config::default()
        };
        assert!(config.news_key().is_none());
        assert!(config.tmdb_key().is_some());
    }

    #[test]
    fn test_debug_masks_api_keys() {
        let config = Config {
            news_api_key: Some("super-secret-news".to_string()),
            tmdb_api_key: Some("super-secret-tmdb".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-news"));
        assert!(!debug_output.contains("super-secret-tmdb"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}

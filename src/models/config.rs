//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Target site description
    #[serde(default)]
    pub site: SiteConfig,

    /// Cascading selectors used for extraction
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Database location
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Ingest run settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        let base = Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::validation("site.base_url must be http(s)"));
        }
        if self.site.list_paths.is_empty() {
            return Err(AppError::validation("No site.list_paths defined"));
        }
        if self.site.listing_markers.is_empty() {
            return Err(AppError::validation("No site.listing_markers defined"));
        }
        if self.extractor.list_selectors.is_empty() {
            return Err(AppError::validation("No extractor.list_selectors defined"));
        }
        if self.extractor.article_path_markers.is_empty() {
            return Err(AppError::validation(
                "No extractor.article_path_markers defined",
            ));
        }
        if self.storage.db_path.as_os_str().is_empty() {
            return Err(AppError::validation("storage.db_path is empty"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for HTTP requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent article fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// The municipality site being crawled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root URL that listing paths and hrefs are resolved against
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Candidate listing paths, tried in order
    #[serde(default = "defaults::list_paths")]
    pub list_paths: Vec<String>,

    /// Case-insensitive substrings that mark a page as a news listing
    #[serde(default = "defaults::listing_markers")]
    pub listing_markers: Vec<String>,

    /// Tag stored with every article
    #[serde(default = "defaults::municipality")]
    pub municipality: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            list_paths: defaults::list_paths(),
            listing_markers: defaults::listing_markers(),
            municipality: defaults::municipality(),
        }
    }
}

/// Ordered selector lists, most specific first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Anchors on the listing page
    #[serde(default = "defaults::list_selectors")]
    pub list_selectors: Vec<String>,

    /// A link is an article only if its path contains one of these
    #[serde(default = "defaults::article_path_markers")]
    pub article_path_markers: Vec<String>,

    #[serde(default = "defaults::title_selectors")]
    pub title_selectors: Vec<String>,

    #[serde(default = "defaults::date_selectors")]
    pub date_selectors: Vec<String>,

    #[serde(default = "defaults::body_selectors")]
    pub body_selectors: Vec<String>,

    /// Removed from the body container before text extraction
    #[serde(default = "defaults::strip_selectors")]
    pub strip_selectors: Vec<String>,

    #[serde(default = "defaults::summary_selectors")]
    pub summary_selectors: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            list_selectors: defaults::list_selectors(),
            article_path_markers: defaults::article_path_markers(),
            title_selectors: defaults::title_selectors(),
            date_selectors: defaults::date_selectors(),
            body_selectors: defaults::body_selectors(),
            strip_selectors: defaults::strip_selectors(),
            summary_selectors: defaults::summary_selectors(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, created on first use
    #[serde(default = "defaults::db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

/// Ingest run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Max article links attempted per run; defaults to 20. The CLI's
    /// `--all` runs without a limit.
    #[serde(default = "defaults::ingest_limit")]
    pub default_limit: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::ingest_limit(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
            .into()
    }
    pub fn accept_language() -> String {
        "sv-SE,sv;q=0.9,en;q=0.8".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://www.uppsala.se/".into()
    }
    pub fn list_paths() -> Vec<String> {
        strings(&[
            "kommun-och-politik/nyheter-och-pressmeddelanden/",
            "kommun-och-politik/press-och-nyheter/nyheter/",
            "om-uppsala/nyheter/",
            "nyheter/",
        ])
    }
    pub fn listing_markers() -> Vec<String> {
        strings(&["/nyheter/", "news"])
    }
    pub fn municipality() -> String {
        crate::models::DEFAULT_MUNICIPALITY.into()
    }

    // Extractor defaults
    pub fn list_selectors() -> Vec<String> {
        strings(&[
            ".c-card a",
            "article a",
            "a.c-article-card__link",
            ".news-list a",
        ])
    }
    pub fn article_path_markers() -> Vec<String> {
        strings(&["/nyheter", "/news"])
    }
    pub fn title_selectors() -> Vec<String> {
        strings(&["h1", ".c-article__title", ".page-title"])
    }
    pub fn date_selectors() -> Vec<String> {
        strings(&["time", ".c-article__date", ".published", ".date"])
    }
    pub fn body_selectors() -> Vec<String> {
        strings(&[".c-rich-text", ".c-article__content", "article", "main"])
    }
    pub fn strip_selectors() -> Vec<String> {
        strings(&["nav", "aside", "footer", "script", "style"])
    }
    pub fn summary_selectors() -> Vec<String> {
        strings(&[".ingress", ".lead", ".c-article__lead"])
    }

    // Storage / server defaults
    pub fn db_path() -> PathBuf {
        PathBuf::from("data/news.db")
    }
    pub fn bind() -> String {
        "127.0.0.1:8000".into()
    }
    pub fn ingest_limit() -> Option<usize> {
        Some(20)
    }
}

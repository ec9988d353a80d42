//! Article data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Municipality tag used when none is configured.
pub const DEFAULT_MUNICIPALITY: &str = "Uppsala";

/// Number of hex characters kept from the URL digest.
///
/// Changing this (or the hash) invalidates every stored identity.
pub const ARTICLE_ID_LEN: usize = 24;

/// Compute the stable identity of an article from its source URL.
///
/// # Examples
/// ```
/// use kommun_news::models::article_id;
///
/// let id = article_id("https://www.uppsala.se/nyheter/a");
/// assert_eq!(id.len(), 24);
/// assert_eq!(id, article_id("https://www.uppsala.se/nyheter/a"));
/// ```
pub fn article_id(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ARTICLE_ID_LEN);
    id
}

/// An extracted article that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleDraft {
    /// Article headline, never empty
    pub title: String,

    /// Lead/ingress paragraph
    #[serde(default)]
    pub summary: Option<String>,

    /// Plain-text body
    #[serde(default)]
    pub body_text: Option<String>,

    /// Publication time, normalized to UTC
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Absolute URL the article was fetched from
    pub source_url: Url,

    /// Municipality tag
    #[serde(default = "default_municipality")]
    pub municipality: String,
}

fn default_municipality() -> String {
    DEFAULT_MUNICIPALITY.to_string()
}

impl ArticleDraft {
    /// Create a draft with only the required fields set.
    pub fn new(title: impl Into<String>, source_url: Url) -> Self {
        Self {
            title: title.into(),
            summary: None,
            body_text: None,
            published_at: None,
            source_url,
            municipality: default_municipality(),
        }
    }

    /// Identity this draft will be stored under.
    pub fn id(&self) -> String {
        article_id(self.source_url.as_str())
    }
}

/// A persisted article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredArticle {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_url: String,
    pub municipality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of search results plus the total match count.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchPage {
    pub total: i64,
    pub items: Vec<StoredArticle>,
}

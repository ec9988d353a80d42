//! Storage abstractions for article persistence.
//!
//! Articles are keyed by [`article_id`](crate::models::article_id) so that
//! re-ingesting a URL updates the existing row instead of duplicating it.
//! Every backend keeps its full-text index in step with the rows it stores.
//!
//! ## SQLite Layout
//!
//! ```text
//! news        # one row per source URL
//! news_fts    # FTS5 index over title/summary/body_text, trigger-maintained
//! ```

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArticleDraft, SearchPage, StoredArticle};

// Re-export for convenience
pub use sqlite::SqliteStore;

/// Trait for article storage backends.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Create tables and indexes if they do not exist. Safe to call on
    /// every startup.
    async fn initialize(&self) -> Result<()>;

    /// Insert or update each draft by identity. All-or-nothing per call.
    ///
    /// Returns the number of drafts processed.
    async fn upsert(&self, drafts: &[ArticleDraft]) -> Result<usize>;

    /// Newest first; articles without a publication date come last.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<StoredArticle>>;

    /// Full-text search over title, summary and body, best match first.
    async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchPage>;

    /// Fetch a single article by identity.
    async fn get(&self, id: &str) -> Result<Option<StoredArticle>>;

    /// Number of stored articles.
    async fn count(&self) -> Result<i64>;
}

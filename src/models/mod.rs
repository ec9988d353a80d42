// src/models/mod.rs

//! Domain models for the news crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod article;
mod config;

// Re-export all public types
pub use article::{
    ARTICLE_ID_LEN, ArticleDraft, DEFAULT_MUNICIPALITY, SearchPage, StoredArticle, article_id,
};
pub use config::{
    Config, CrawlerConfig, ExtractorConfig, IngestConfig, ServerConfig, SiteConfig, StorageConfig,
};

/// Summary of a crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Listing page the links were taken from
    pub list_url: String,
    /// Article links found on the listing page
    pub discovered: usize,
    /// Article links attempted (after limit truncation)
    pub attempted: usize,
    /// Articles skipped because their fetch or parse failed
    pub failures: usize,
    /// Extracted drafts, in link discovery order
    pub articles: Vec<ArticleDraft>,
}

/// Summary of one ingest run (crawl followed by upsert).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestSummary {
    /// Links found on the listing page, before the limit
    pub discovered: usize,
    /// Links fetched after applying the limit
    pub attempted: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub stored: usize,
}

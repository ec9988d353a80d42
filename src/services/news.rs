// src/services/news.rs

//! News crawler service.
//!
//! Resolves a working listing page, extracts article links and fetches
//! each article. A single broken article never aborts the run.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ArticleDraft, Config, CrawlOutcome};
use crate::services::ArticleExtractor;
use crate::utils::http::{HttpFetcher, PageFetcher};

/// Service for crawling a municipality news site.
pub struct NewsCrawler {
    base_url: Url,
    list_paths: Vec<String>,
    listing_markers: Vec<String>,
    concurrency: usize,
    extractor: Arc<ArticleExtractor>,
    fetcher: Arc<dyn PageFetcher>,
}

impl NewsCrawler {
    /// Create a crawler that fetches over HTTP.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config.crawler)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a crawler with a custom page source.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url)?;
        let extractor = ArticleExtractor::new(&config.extractor, &config.site.municipality)?;

        Ok(Self {
            base_url,
            list_paths: config.site.list_paths.clone(),
            listing_markers: config
                .site
                .listing_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            concurrency: config.crawler.max_concurrent.max(1),
            extractor: Arc::new(extractor),
            fetcher,
        })
    }

    /// Find the first candidate listing path that serves a news listing.
    ///
    /// When every candidate fails, the last fetch error is returned; if
    /// none failed outright (all were rejected), a resolution error.
    pub async fn resolve_list_url(&self) -> Result<Url> {
        let mut last_error: Option<AppError> = None;

        for path in &self.list_paths {
            let url = match self.base_url.join(path) {
                Ok(url) => url,
                Err(e) => {
                    log::warn!("Skipping invalid list path {path:?}: {e}");
                    last_error = Some(e.into());
                    continue;
                }
            };

            match self.fetcher.fetch(url.as_str()).await {
                Ok(html) if self.looks_like_listing(&html) => {
                    log::info!("Using listing page {url}");
                    return Ok(url);
                }
                Ok(_) => log::debug!("Rejected {url}: no listing marker"),
                Err(e) => {
                    log::debug!("Candidate {url} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::resolution(format!(
                "none of {} candidate paths under {} looked like a news listing",
                self.list_paths.len(),
                self.base_url
            ))
        }))
    }

    fn looks_like_listing(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        self.listing_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Crawl and return the extracted drafts in link order.
    ///
    /// `limit` caps the number of links attempted: `None` is unlimited and
    /// `Some(0)` attempts nothing.
    pub async fn run(&self, limit: Option<usize>) -> Result<Vec<ArticleDraft>> {
        Ok(self.crawl(limit).await?.articles)
    }

    /// Crawl and report how many articles were attempted and skipped.
    pub async fn crawl(&self, limit: Option<usize>) -> Result<CrawlOutcome> {
        let list_url = self.resolve_list_url().await?;
        let list_html = self.fetcher.fetch(list_url.as_str()).await?;

        let mut links = self.extractor.parse_list(&list_html, &self.base_url);
        let discovered = links.len();
        if let Some(limit) = limit {
            links.truncate(limit);
        }
        log::info!(
            "Found {} article links on {} (attempting {})",
            discovered,
            list_url,
            links.len()
        );

        let mut outcome = CrawlOutcome {
            list_url: list_url.to_string(),
            discovered,
            attempted: links.len(),
            ..CrawlOutcome::default()
        };

        // `buffered` keeps results in link order regardless of completion order.
        let mut results = stream::iter(links)
            .map(|url| {
                let extractor = Arc::clone(&self.extractor);
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let result = fetch_article(fetcher.as_ref(), &extractor, &url).await;
                    (url, result)
                }
            })
            .buffered(self.concurrency);

        while let Some((url, result)) = results.next().await {
            match result {
                Ok(draft) => outcome.articles.push(draft),
                Err(error) => {
                    outcome.failures += 1;
                    log::warn!("Skipping article {url}: {error}");
                }
            }
        }

        if outcome.failures > 0 {
            log::warn!(
                "Skipped {} of {} articles",
                outcome.failures,
                outcome.attempted
            );
            if outcome.articles.is_empty() {
                log::warn!("Every article failed; the site markup may have changed");
            }
        }

        Ok(outcome)
    }
}

async fn fetch_article(
    fetcher: &dyn PageFetcher,
    extractor: &ArticleExtractor,
    url: &Url,
) -> Result<ArticleDraft> {
    let html = fetcher.fetch(url.as_str()).await?;
    Ok(extractor.parse_article(&html, url))
}

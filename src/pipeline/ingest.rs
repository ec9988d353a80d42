// src/pipeline/ingest.rs

//! Ingest pipeline: crawl, then persist.

use std::time::Instant;

use crate::error::Result;
use crate::models::IngestSummary;
use crate::services::NewsCrawler;
use crate::storage::NewsStore;

/// Crawl up to `limit` articles and upsert them in a single batch.
///
/// Crawl failures before any article is fetched (no working listing page,
/// listing fetch error) abort the run; per-article failures are counted in
/// [`IngestSummary::skipped`]. A storage error aborts without partial writes.
pub async fn run_ingest(
    crawler: &NewsCrawler,
    store: &dyn NewsStore,
    limit: Option<usize>,
) -> Result<IngestSummary> {
    let started = Instant::now();
    log::info!(
        "Starting ingest (limit: {})",
        limit.map_or_else(|| "none".to_string(), |l| l.to_string())
    );

    let outcome = crawler.crawl(limit).await?;
    let stored = if outcome.articles.is_empty() {
        0
    } else {
        store.upsert(&outcome.articles).await?
    };

    let summary = IngestSummary {
        discovered: outcome.discovered,
        attempted: outcome.attempted,
        fetched: outcome.articles.len(),
        skipped: outcome.failures,
        stored,
    };

    log::info!(
        "Ingested {} items from {} ({} of {} links attempted, {} skipped) in {:.1}s",
        summary.stored,
        outcome.list_url,
        summary.attempted,
        summary.discovered,
        summary.skipped,
        started.elapsed().as_secs_f64()
    );

    Ok(summary)
}

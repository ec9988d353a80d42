//! End-to-end: crawl a canned site into an on-disk store and query it back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use kommun_news::error::{AppError, Result};
use kommun_news::models::{Config, article_id};
use kommun_news::pipeline::run_ingest;
use kommun_news::services::NewsCrawler;
use kommun_news::storage::{NewsStore, SqliteStore};
use kommun_news::utils::http::PageFetcher;

struct CannedSite(HashMap<&'static str, &'static str>);

#[async_trait]
impl PageFetcher for CannedSite {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.0
            .get(url)
            .map(|html| html.to_string())
            .ok_or_else(|| AppError::validation(format!("not found: {url}")))
    }
}

const LISTING: &str = r#"
<html><body>
  <nav><a href="/kontakt/">Kontakt</a></nav>
  <div class="c-card"><a href="/nyheter/budget-2025/">Budget</a></div>
  <div class="c-card"><a href="/nyheter/snorojning/">Snöröjning</a></div>
  <div class="c-card"><a href="/nyheter/budget-2025/">Budget (igen)</a></div>
  <div class="c-card"><a href="/nyheter/borttagen/">Borttagen</a></div>
</body></html>
"#;

const BUDGET: &str = r#"
<html><body>
  <nav>Meny</nav>
  <h1>Budget för 2025 antagen</h1>
  <p class="ingress">Fullmäktige har fattat beslut.</p>
  <time datetime="2024-11-26">26 november 2024</time>
  <div class="c-rich-text">
    <p>Kommunfullmäktige antog budgeten för 2025.</p>
    <p>Skattesatsen lämnas oförändrad.</p>
  </div>
</body></html>
"#;

const SNOW: &str = r#"
<html><body>
  <h1>Så fungerar snöröjningen</h1>
  <span class="date">3 december 2024</span>
  <article><p>Gator och cykelbanor plogas i turordning.</p></article>
</body></html>
"#;

fn site() -> CannedSite {
    CannedSite(HashMap::from([
        (
            "https://www.uppsala.se/kommun-och-politik/nyheter-och-pressmeddelanden/",
            LISTING,
        ),
        ("https://www.uppsala.se/nyheter/budget-2025/", BUDGET),
        ("https://www.uppsala.se/nyheter/snorojning/", SNOW),
    ]))
}

#[tokio::test]
async fn ingest_then_query() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.db_path = tmp.path().join("nested/news.db");

    let store = SqliteStore::open(&config.storage).await.unwrap();
    store.initialize().await.unwrap();
    let crawler = NewsCrawler::with_fetcher(&config, Arc::new(site())).unwrap();

    let summary = run_ingest(&crawler, &store, None).await.unwrap();
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.skipped, 1);

    let listed = store.list(20, 0).await.unwrap();
    let titles: Vec<_> = listed.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Så fungerar snöröjningen", "Budget för 2025 antagen"]
    );

    let budget = &listed[1];
    assert_eq!(
        budget.id,
        article_id("https://www.uppsala.se/nyheter/budget-2025/")
    );
    assert_eq!(budget.summary.as_deref(), Some("Fullmäktige har fattat beslut."));
    assert_eq!(
        budget.body_text.as_deref(),
        Some("Kommunfullmäktige antog budgeten för 2025.\n\nSkattesatsen lämnas oförändrad.")
    );
    assert_eq!(budget.municipality, "Uppsala");

    let page = store.search("skattesatsen", 10, 0).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, budget.id);

    // Re-running is idempotent.
    run_ingest(&crawler, &store, None).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
}

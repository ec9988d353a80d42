//! SQLite storage implementation.
//!
//! Rows live in `news`; `news_fts` is an FTS5 external-content index over
//! it, maintained by triggers so that an insert, update or delete and its
//! index change always commit together.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::error::{AppError, Result};
use crate::models::{ArticleDraft, SearchPage, StorageConfig, StoredArticle};
use crate::storage::NewsStore;

const SELECT_COLUMNS: &str = "n.id, n.title, n.summary, n.body_text, n.published_at, \
     n.source_url, n.municipality, n.created_at, n.updated_at";

/// Schema statements, all idempotent.
///
/// `row_id` is an explicit INTEGER PRIMARY KEY so the FTS rowid mapping
/// survives VACUUM.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news (
        row_id INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        summary TEXT,
        body_text TEXT,
        published_at INTEGER,
        source_url TEXT NOT NULL UNIQUE,
        municipality TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS news_fts USING fts5(
        title, summary, body_text,
        content='news', content_rowid='row_id'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS news_ai AFTER INSERT ON news BEGIN
        INSERT INTO news_fts(rowid, title, summary, body_text)
        VALUES (new.row_id, new.title, new.summary, new.body_text);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS news_ad AFTER DELETE ON news BEGIN
        INSERT INTO news_fts(news_fts, rowid, title, summary, body_text)
        VALUES ('delete', old.row_id, old.title, old.summary, old.body_text);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS news_au AFTER UPDATE ON news BEGIN
        INSERT INTO news_fts(news_fts, rowid, title, summary, body_text)
        VALUES ('delete', old.row_id, old.title, old.summary, old.body_text);
        INSERT INTO news_fts(rowid, title, summary, body_text)
        VALUES (new.row_id, new.title, new.summary, new.body_text);
    END
    "#,
    "CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at DESC, updated_at DESC)",
];

/// How long a writer waits for another writer's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite-backed article store.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Raw `news` row; timestamps are Unix milliseconds.
#[derive(sqlx::FromRow)]
struct NewsRow {
    id: String,
    title: String,
    summary: Option<String>,
    body_text: Option<String>,
    published_at: Option<i64>,
    source_url: String,
    municipality: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<NewsRow> for StoredArticle {
    type Error = AppError;

    fn try_from(row: NewsRow) -> Result<Self> {
        Ok(StoredArticle {
            id: row.id,
            title: row.title,
            summary: row.summary,
            body_text: row.body_text,
            published_at: row.published_at.map(from_millis).transpose()?,
            source_url: row.source_url,
            municipality: row.municipality,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        AppError::Database(sqlx::Error::Decode(
            format!("timestamp out of range: {ms}").into(),
        ))
    })
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Turn user input into an FTS5 query that cannot be a syntax error.
///
/// Each whitespace-separated token becomes a quoted string (implicit AND);
/// a trailing `*` is kept as a prefix match. Tokens without any
/// alphanumeric character are dropped.
pub fn fts_query(input: &str) -> Option<String> {
    let terms: Vec<String> = input
        .split_whitespace()
        .filter_map(|token| {
            let (body, prefix) = match token.strip_suffix('*') {
                Some(body) => (body, true),
                None => (token, false),
            };
            if !body.chars().any(char::is_alphanumeric) {
                return None;
            }
            let quoted = format!("\"{}\"", body.replace('"', "\"\""));
            Some(if prefix { quoted + "*" } else { quoted })
        })
        .collect();

    (!terms.is_empty()).then(|| terms.join(" "))
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        log::debug!("Opened database {}", path.display());
        Ok(Self { pool })
    }

    /// Open the database configured under `[storage]`.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        Self::connect(&config.db_path).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove an article; its index entry goes with it.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM news WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Start a transaction that holds the write lock from its first
    /// statement. A deferred `BEGIN` would fail with `SQLITE_BUSY` on lock
    /// upgrade instead of waiting out the busy timeout.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        // One write transaction, so concurrent starters serialize on the
        // write lock and every statement is `IF NOT EXISTS`.
        let mut tx = self.begin_write().await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert(&self, drafts: &[ArticleDraft]) -> Result<usize> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.begin_write().await?;

        for draft in drafts {
            sqlx::query(
                r#"
                INSERT INTO news (id, title, summary, body_text, published_at,
                                  source_url, municipality, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    summary = excluded.summary,
                    body_text = excluded.body_text,
                    published_at = excluded.published_at,
                    municipality = excluded.municipality,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(draft.id())
            .bind(&draft.title)
            .bind(&draft.summary)
            .bind(&draft.body_text)
            .bind(draft.published_at.map(|t| t.timestamp_millis()))
            .bind(draft.source_url.as_str())
            .bind(&draft.municipality)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(drafts.len())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<StoredArticle>> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM news n
            ORDER BY (n.published_at IS NULL) ASC, n.published_at DESC, n.updated_at DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(to_sql_count(limit))
        .bind(to_sql_count(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredArticle::try_from).collect()
    }

    async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchPage> {
        let fts = fts_query(query)
            .ok_or_else(|| AppError::validation("search query must not be empty"))?;

        // Count and page from one snapshot.
        let mut tx = self.pool.begin().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_fts WHERE news_fts MATCH ?")
            .bind(&fts)
            .fetch_one(&mut *tx)
            .await?;

        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM news_fts
            JOIN news n ON n.row_id = news_fts.rowid
            WHERE news_fts MATCH ?
            ORDER BY bm25(news_fts)
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(&fts)
        .bind(to_sql_count(limit))
        .bind(to_sql_count(offset))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let items = rows
            .into_iter()
            .map(StoredArticle::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchPage { total, items })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredArticle>> {
        let row: Option<NewsRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM news n WHERE n.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(StoredArticle::try_from).transpose()
    }

    async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use tempfile::TempDir;
    use url::Url;

    use super::*;
    use crate::models::article_id;

    async fn store() -> (SqliteStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::connect(&tmp.path().join("data/news.db"))
            .await
            .unwrap();
        store.initialize().await.unwrap();
        (store, tmp)
    }

    fn draft(slug: &str, title: &str, body: &str) -> ArticleDraft {
        let url = Url::parse(&format!("https://www.uppsala.se/nyheter/{slug}/")).unwrap();
        ArticleDraft {
            body_text: Some(body.to_string()),
            ..ArticleDraft::new(title, url)
        }
    }

    fn dated(mut draft: ArticleDraft, day: u32) -> ArticleDraft {
        draft.published_at = Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap());
        draft
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (store, _tmp) = store().await;
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialize_concurrently_from_two_pools() {
        for _ in 0..20 {
            let tmp = TempDir::new().unwrap();
            let path = tmp.path().join("news.db");
            let first = SqliteStore::connect(&path).await.unwrap();
            let second = SqliteStore::connect(&path).await.unwrap();

            let (a, b) = tokio::join!(first.initialize(), second.initialize());
            a.unwrap();
            b.unwrap();

            first.upsert(&[draft("a", "A", "x")]).await.unwrap();
            assert_eq!(second.search("x", 10, 0).await.unwrap().total, 1);
        }
    }

    #[tokio::test]
    async fn test_upsert_same_url_twice_keeps_one_row() {
        let (store, _tmp) = store().await;
        let first = draft("a", "Första", "text");

        assert_eq!(store.upsert(&[first.clone()]).await.unwrap(), 1);
        let before = store.get(&first.id()).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = ArticleDraft {
            title: "Uppdaterad".to_string(),
            ..first.clone()
        };
        store.upsert(&[second]).await.unwrap();
        let after = store.get(&first.id()).await.unwrap().unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(after.id, before.id);
        assert_eq!(after.id, article_id(first.source_url.as_str()));
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.title, "Uppdaterad");
    }

    #[tokio::test]
    async fn test_search_finds_only_matching_article() {
        let (store, _tmp) = store().await;
        store
            .upsert(&[
                draft("a", "Skolval", "Ansökan till förskoleklass öppnar i januari."),
                draft("b", "Beslut", "Fullmäktige antog årets budget i går."),
            ])
            .await
            .unwrap();

        let page = store.search("budget", 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Beslut");
    }

    #[tokio::test]
    async fn test_search_ranks_best_match_first() {
        let (store, _tmp) = store().await;
        store
            .upsert(&[
                draft(
                    "long",
                    "Kommunen informerar",
                    "Här finns mycket text om parker, vägar, skolor, bibliotek, \
                     simhallar, äldreomsorg, kollektivtrafik, bostäder och kultur. \
                     Budget nämns bara en gång i slutet av en lång text.",
                ),
                draft("short", "Budget", "Budget budget budget."),
            ])
            .await
            .unwrap();

        let page = store.search("budget", 10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].title, "Budget");
    }

    #[tokio::test]
    async fn test_search_reflects_updates_and_deletes() {
        let (store, _tmp) = store().await;
        let original = draft("a", "Nyhet", "Om budget");
        store.upsert(&[original.clone()]).await.unwrap();

        let revised = ArticleDraft {
            body_text: Some("Om skolval".to_string()),
            ..original.clone()
        };
        store.upsert(&[revised]).await.unwrap();

        assert_eq!(store.search("budget", 10, 0).await.unwrap().total, 0);
        assert_eq!(store.search("skolval", 10, 0).await.unwrap().total, 1);

        assert!(store.delete(&original.id()).await.unwrap());
        assert_eq!(store.search("skolval", 10, 0).await.unwrap().total, 0);
        assert!(!store.delete(&original.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_paginates_with_exact_total() {
        let (store, _tmp) = store().await;
        let drafts: Vec<_> = (0..5)
            .map(|i| draft(&format!("n{i}"), &format!("Nyhet {i}"), "vatten"))
            .collect();
        store.upsert(&drafts).await.unwrap();

        let page = store.search("vatten", 2, 4).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let (store, _tmp) = store().await;
        assert!(matches!(
            store.search("   ", 10, 0).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_tolerates_fts_syntax_in_input() {
        let (store, _tmp) = store().await;
        store
            .upsert(&[draft("a", "Budget", "Budget 2025 (förslag)")])
            .await
            .unwrap();
        let page = store.search("budget\" AND (", 10, 0).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(store.search("budg*", 10, 0).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_published_then_updated() {
        let (store, _tmp) = store().await;
        store
            .upsert(&[
                draft("undated", "Utan datum", "x"),
                dated(draft("old", "Äldre", "x"), 1),
                dated(draft("new", "Nyare", "x"), 10),
            ])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .upsert(&[dated(draft("tie", "Samma dag, senare", "x"), 10)])
            .await
            .unwrap();

        let titles: Vec<_> = store
            .list(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Samma dag, senare", "Nyare", "Äldre", "Utan datum"]);

        let page: Vec<_> = store
            .list(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(page, vec!["Nyare", "Äldre"]);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_do_not_duplicate() {
        let (store, _tmp) = store().await;
        let drafts = vec![draft("a", "A", "x"), draft("b", "B", "y")];

        let (left, right) = tokio::join!(store.upsert(&drafts), store.upsert(&drafts));
        assert_eq!(left.unwrap(), 2);
        assert_eq!(right.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_from_separate_pools_serialize() {
        let (store, tmp) = store().await;
        let other = SqliteStore::connect(&tmp.path().join("data/news.db"))
            .await
            .unwrap();
        let drafts: Vec<_> = (0..50)
            .map(|i| draft(&format!("n{i}"), &format!("Nyhet {i}"), "text"))
            .collect();

        let (left, right) = tokio::join!(store.upsert(&drafts), other.upsert(&drafts));
        assert_eq!(left.unwrap(), 50);
        assert_eq!(right.unwrap(), 50);
        assert_eq!(other.count().await.unwrap(), 50);
    }

    #[test]
    fn test_fts_query_quotes_tokens() {
        assert_eq!(fts_query("budget"), Some("\"budget\"".to_string()));
        assert_eq!(
            fts_query("  ny  budget "),
            Some("\"ny\" \"budget\"".to_string())
        );
        assert_eq!(fts_query("a\"b"), Some("\"a\"\"b\"".to_string()));
        assert_eq!(fts_query("skol*"), Some("\"skol\"*".to_string()));
        assert_eq!(fts_query(" \"\" * ( "), None);
        assert_eq!(fts_query(""), None);
    }
}

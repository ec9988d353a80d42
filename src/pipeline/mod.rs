//! Pipeline entry points.
//!
//! - `run_ingest`: Crawl the news site and upsert the results into a store

pub mod ingest;

pub use ingest::run_ingest;

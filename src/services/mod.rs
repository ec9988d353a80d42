//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Date and markup normalization (`normalize`)
//! - Link and field extraction (`ArticleExtractor`)
//! - Site crawling (`NewsCrawler`)

mod extractor;
mod news;
pub mod normalize;

pub use extractor::ArticleExtractor;
pub use news::NewsCrawler;

#[cfg(test)]
pub(crate) use news::tests::FakeFetcher;

// src/lib.rs

//! Municipal news crawler library.
//!
//! Crawls a municipality's news listing, normalizes each article into an
//! [`ArticleDraft`](models::ArticleDraft) and keeps them in a SQLite store
//! with full-text search.

pub mod error;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;

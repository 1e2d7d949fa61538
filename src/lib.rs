//! Latest News - server-rendered news section for a static site
//!
//! This crate assembles pages from shared HTML fragments and renders the
//! "latest news" section from a JSON feed, polling it for new articles.

pub mod article;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod include;
pub mod news;
pub mod poller;
pub mod render;
pub mod routes;
pub mod viewers;

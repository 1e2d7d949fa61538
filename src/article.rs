use chrono::{DateTime, FixedOffset, Locale, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const DISPLAY_LOCALE: Locale = Locale::sv_SE;

/// A news article as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub excerpt: String,
    pub image: String,
    pub category: String,
    /// ISO-8601 publication time
    pub timestamp: String,
}

/// The last successfully fetched feed. Index 0 is the newest article.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub articles: Vec<Article>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl FeedState {
    pub fn replace(&mut self, articles: Vec<Article>) {
        self.articles = articles;
        self.last_fetched_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// "1 januari 2024"
    Long,
    /// Abbreviated month, "1 maj 2024"
    Short,
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parses an ISO-8601 timestamp, keeping its own offset. Timestamps
/// without an offset are taken as UTC.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<FixedOffset>> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(timestamp, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().fixed_offset())
}

/// Swedish display date. Unparseable timestamps are shown as-is.
pub fn format_date(timestamp: &str, style: DateStyle) -> String {
    let Some(dt) = parse_timestamp(timestamp) else {
        return timestamp.to_string();
    };

    let pattern = match style {
        DateStyle::Long => "%-d %B %Y",
        DateStyle::Short => "%-d %b %Y",
    };
    dt.format_localized(pattern, DISPLAY_LOCALE).to_string()
}

/// Whether `fresh` carries content that `current` lacks.
///
/// True when the list grew, or when both lists are non-empty and the newest
/// article's timestamp changed. An in-place edit of the first timestamp counts
/// the same as a new article.
pub fn has_new_content(current: &[Article], fresh: &[Article]) -> bool {
    if fresh.len() > current.len() {
        return true;
    }
    match (current.first(), fresh.first()) {
        (Some(old), Some(new)) => old.timestamp != new.timestamp,
        _ => false,
    }
}

#[cfg(test)]
pub(crate) fn article_at(timestamp: &str) -> Article {
    Article {
        title: format!("Article {}", timestamp),
        excerpt: "Excerpt".to_string(),
        image: "https://example.com/image.jpg".to_string(),
        category: "teknik".to_string(),
        timestamp: timestamp.to_string(),
    }
}

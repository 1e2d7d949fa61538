//! Markup for the latest-news section.
//!
//! The feed is cut into three fixed zones: one featured article, up to two
//! secondary cards and up to three sidebar entries.

use askama::Template;

use crate::article::{capitalize_first, format_date, Article, DateStyle};

/// Number of articles shown in the layout.
pub const LAYOUT_SIZE: usize = 6;
const SECONDARY_END: usize = 3;

/// Display-ready article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleView {
    pub title: String,
    pub excerpt: String,
    pub image: String,
    pub category: String,
    pub date: String,
}

impl ArticleView {
    pub fn new(article: &Article, style: DateStyle) -> Self {
        Self {
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            image: article.image.clone(),
            category: capitalize_first(&article.category),
            date: format_date(&article.timestamp, style),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zones {
    pub featured: ArticleView,
    pub secondary: Vec<ArticleView>,
    pub sidebar: Vec<ArticleView>,
}

impl Zones {
    /// Partitions the newest articles. `None` when there is nothing to show.
    pub fn from_articles(articles: &[Article]) -> Option<Self> {
        let latest = &articles[..articles.len().min(LAYOUT_SIZE)];
        let featured = latest.first()?;
        let short = |a: &Article| ArticleView::new(a, DateStyle::Short);

        Some(Self {
            featured: ArticleView::new(featured, DateStyle::Long),
            secondary: latest
                .get(1..latest.len().min(SECONDARY_END))
                .unwrap_or_default()
                .iter()
                .map(short)
                .collect(),
            sidebar: latest
                .get(SECONDARY_END..)
                .unwrap_or_default()
                .iter()
                .map(short)
                .collect(),
        })
    }
}

#[derive(Template)]
#[template(path = "latest_news.html")]
pub struct LatestNewsTemplate {
    pub zones: Option<Zones>,
}

#[derive(Template)]
#[template(path = "news_error.html")]
pub struct NewsErrorTemplate;

#[derive(Template)]
#[template(path = "notification.html")]
pub struct NotificationTemplate {
    pub id: u64,
    pub client: Option<u64>,
    /// Re-fetch the layout when the toast lands
    pub refresh_layout: bool,
}

/// Per-page hooks: notification polling and visibility reports.
#[derive(Template)]
#[template(path = "news_client.html")]
pub struct NewsClientTemplate {
    pub client: u64,
}

impl LatestNewsTemplate {
    pub fn new(articles: &[Article]) -> Self {
        Self {
            zones: Zones::from_articles(articles),
        }
    }
}

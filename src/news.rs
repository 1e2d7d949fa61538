use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use askama::Template;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::article::{has_new_content, FeedState};
use crate::fetcher::FeedClient;
use crate::render::{LatestNewsTemplate, NewsErrorTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub raised_at: Instant,
}

/// Owns the feed state and everything rendered from it.
pub struct NewsManager {
    client: FeedClient,
    state: RwLock<FeedState>,
    failed: RwLock<bool>,
    notification: RwLock<Option<Notification>>,
    notification_duration: Duration,
    next_notification_id: AtomicU64,
}

impl NewsManager {
    pub fn new(client: FeedClient, notification_duration: Duration) -> Self {
        Self {
            client,
            state: RwLock::new(FeedState::default()),
            failed: RwLock::new(false),
            notification: RwLock::new(None),
            notification_duration,
            next_notification_id: AtomicU64::new(1),
        }
    }

    /// Fetch the feed and replace the state. Failures keep the previous
    /// articles and switch the section to the error panel.
    pub async fn load(&self) {
        match self.client.fetch().await {
            Ok(articles) => {
                info!("Loaded {} news articles", articles.len());
                self.state.write().await.replace(articles);
                *self.failed.write().await = false;
            }
            Err(e) => {
                error!("Error loading news from {}: {}", self.client.url(), e);
                *self.failed.write().await = true;
            }
        }
    }

    /// Manual retry, same as [`NewsManager::load`].
    pub async fn refresh(&self) {
        self.load().await;
    }

    /// Re-fetch and swap in the result only when it carries new content.
    /// Returns whether new content was found.
    pub async fn poll_for_updates(&self) -> bool {
        let articles = match self.client.fetch().await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Error checking for news updates: {}", e);
                return false;
            }
        };

        {
            let mut state = self.state.write().await;
            if !has_new_content(&state.articles, &articles) {
                return false;
            }
            info!("New articles detected, updating");
            state.replace(articles);
        }

        *self.failed.write().await = false;
        self.raise_notification().await;
        true
    }

    /// Markup for the latest-news container.
    pub async fn render(&self) -> askama::Result<String> {
        if *self.failed.read().await {
            return NewsErrorTemplate.render();
        }
        let state = self.state.read().await;
        LatestNewsTemplate::new(&state.articles).render()
    }

    pub async fn is_failed(&self) -> bool {
        *self.failed.read().await
    }

    pub async fn snapshot(&self) -> FeedState {
        self.state.read().await.clone()
    }

    async fn raise_notification(&self) {
        let id = self.next_notification_id.fetch_add(1, Ordering::Relaxed);
        *self.notification.write().await = Some(Notification {
            id,
            raised_at: Instant::now(),
        });
    }

    /// The pending update notification, if it has not expired.
    pub async fn current_notification(&self) -> Option<Notification> {
        let mut slot = self.notification.write().await;
        let current = *slot;
        match current {
            Some(n) if n.raised_at.elapsed() < self.notification_duration => Some(n),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }
}

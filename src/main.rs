use std::sync::Arc;

use latest_news::config::Config;
use latest_news::fetcher::FeedClient;
use latest_news::include::{LatestNewsDetector, Site};
use latest_news::news::NewsManager;
use latest_news::poller::{NewsActivation, Poller};
use latest_news::routes::{self, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "latest_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("NEWS_CONFIG").unwrap_or_else(|_| "news.toml".to_string());
    let mut config = Config::load(&config_path)?;
    if let Ok(feed_url) = std::env::var("NEWS_FEED_URL") {
        config.news.feed_url = feed_url;
    }
    info!("Loaded configuration from {}", config_path);

    // Create the news component
    let client = FeedClient::new(&config.news.feed_url, config.news.request_timeout())?;
    let news = Arc::new(NewsManager::new(
        client,
        config.news.notification_duration(),
    ));
    let poller = Arc::new(Poller::new(news.clone(), config.news.poll_interval()));

    // Create app state
    let state = Arc::new(AppState {
        site: Site::new(&config.site_root).with_hook(LatestNewsDetector),
        activation: NewsActivation::new(news, poller),
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

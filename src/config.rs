use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory holding pages, fragments, assets and the feed file
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,
    pub news: NewsConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_site_root() -> PathBuf {
    PathBuf::from("site")
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    pub feed_url: String,
    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// How long an update notification stays visible, in seconds
    #[serde(default = "default_notification_duration")]
    pub notification_duration: u64,
    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_notification_duration() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl NewsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_duration)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.news.poll_interval == 0 {
            anyhow::bail!("news.poll_interval must be positive");
        }
        Ok(config)
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use askama::Template;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::news::NewsManager;
use crate::render::NotificationTemplate;
use crate::viewers::{Delivery, Viewers};

/// Pages poll for notifications every few seconds; one silent for this long
/// is taken as closed.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodic update check with an explicit start/stop lifecycle.
pub struct Poller {
    news: Arc<NewsManager>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(news: Arc<NewsManager>, interval: Duration) -> Self {
        Self {
            news,
            interval,
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the polling loop. The first check runs one interval from now.
    /// Does nothing if already running.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        info!("Starting news polling every {:?}", self.interval);
        let news = self.news.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let first = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(first, interval);
            loop {
                ticker.tick().await;
                news.poll_for_updates().await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task().take() {
            info!("Stopping news polling");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Hidden pages stop polling; becoming visible checks right away and
    /// resumes the schedule.
    pub async fn set_visible(&self, visible: bool) {
        if !visible {
            self.stop();
            return;
        }
        self.news.poll_for_updates().await;
        self.start();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the news feature the first time a page needs it: one initial load,
/// then the poller. Also tracks the open pages that keep polling alive.
pub struct NewsActivation {
    news: Arc<NewsManager>,
    poller: Arc<Poller>,
    viewers: Viewers,
    started: OnceCell<()>,
}

impl NewsActivation {
    pub fn new(news: Arc<NewsManager>, poller: Arc<Poller>) -> Self {
        Self {
            news,
            poller,
            viewers: Viewers::new(CLIENT_TIMEOUT),
            started: OnceCell::new(),
        }
    }

    pub async fn ensure_started(&self) {
        self.started
            .get_or_init(|| async {
                info!("Latest news section found, starting news feed");
                self.news.load().await;
                self.poller.start();
            })
            .await;
    }

    pub fn is_started(&self) -> bool {
        self.started.initialized()
    }

    pub fn news(&self) -> &Arc<NewsManager> {
        &self.news
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn viewers(&self) -> &Viewers {
        &self.viewers
    }

    /// Id for a freshly rendered page.
    pub async fn register_client(&self) -> u64 {
        let current = self.news.current_notification().await.map(|n| n.id);
        self.viewers.register(current)
    }

    /// A page was shown or hidden. Polling stops only once no page is
    /// visible; any page becoming visible checks right away.
    pub async fn set_client_visible(&self, client: u64, visible: bool) {
        self.viewers.set_visible(client, visible);
        if !self.is_started() {
            return;
        }
        if visible {
            self.poller.set_visible(true).await;
        } else if self.viewers.visible_count() == 0 {
            debug!("No visible news clients left");
            self.poller.set_visible(false).await;
        }
    }

    /// Toast markup for one page, empty when there is nothing new for it.
    /// The first delivery also pulls the updated layout.
    pub async fn render_notification(&self, client: Option<u64>) -> askama::Result<String> {
        let Some(current) = self.news.current_notification().await else {
            return Ok(String::new());
        };
        let refresh_layout = match client.map(|c| self.viewers.deliver(c, current.id)) {
            Some(Delivery::Dismissed) => return Ok(String::new()),
            Some(Delivery::First) => true,
            Some(Delivery::Again) | None => false,
        };
        NotificationTemplate {
            id: current.id,
            client,
            refresh_layout,
        }
        .render()
    }

    pub async fn dismiss_notification(&self, client: u64) {
        if let Some(current) = self.news.current_notification().await {
            self.viewers.dismiss(client, current.id);
        }
    }
}

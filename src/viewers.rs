//! Open pages showing the latest-news section.
//!
//! Every rendered page gets a client id. Visibility and notification
//! dismissal are tracked per client, so one hidden tab does not stop updates
//! for the others and one dismissal does not hide the toast everywhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

/// How a pending notification should be shown to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// First time this client sees it; the layout is stale.
    First,
    /// Already delivered, still on screen.
    Again,
    Dismissed,
}

#[derive(Debug, Clone, Copy)]
struct Viewer {
    visible: bool,
    /// Highest notification id delivered
    seen: u64,
    /// Highest notification id dismissed
    dismissed: u64,
    last_seen: Instant,
}

impl Viewer {
    fn new(current_notification: u64) -> Self {
        Self {
            visible: true,
            seen: current_notification,
            dismissed: current_notification,
            last_seen: Instant::now(),
        }
    }
}

pub struct Viewers {
    clients: Mutex<HashMap<u64, Viewer>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl Viewers {
    /// Clients not heard from within `timeout` are forgotten.
    pub fn new(timeout: Duration) -> Self {
        // Seeded from the clock so ids handed out before a restart stay unique
        let seed = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(1);
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(seed),
            timeout,
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<u64, Viewer>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, clients: &mut HashMap<u64, Viewer>) {
        let before = clients.len();
        clients.retain(|_, v| v.last_seen.elapsed() < self.timeout);
        if clients.len() < before {
            debug!("Forgot {} idle news clients", before - clients.len());
        }
    }

    /// New visible client. A notification raised before the page was rendered
    /// is treated as already seen and dismissed.
    pub fn register(&self, current_notification: Option<u64>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut clients = self.clients();
        self.prune(&mut clients);
        clients.insert(id, Viewer::new(current_notification.unwrap_or(0)));
        id
    }

    pub fn set_visible(&self, client: u64, visible: bool) {
        let mut clients = self.clients();
        let viewer = clients.entry(client).or_insert_with(|| Viewer::new(0));
        viewer.visible = visible;
        viewer.last_seen = Instant::now();
    }

    pub fn visible_count(&self) -> usize {
        let mut clients = self.clients();
        self.prune(&mut clients);
        clients.values().filter(|v| v.visible).count()
    }

    /// Record that `client` asked for the pending notification `notification`.
    pub fn deliver(&self, client: u64, notification: u64) -> Delivery {
        let mut clients = self.clients();
        let viewer = clients.entry(client).or_insert_with(|| Viewer::new(0));
        viewer.last_seen = Instant::now();

        if viewer.dismissed >= notification {
            Delivery::Dismissed
        } else if viewer.seen >= notification {
            Delivery::Again
        } else {
            viewer.seen = notification;
            Delivery::First
        }
    }

    pub fn dismiss(&self, client: u64, notification: u64) {
        let mut clients = self.clients();
        let viewer = clients.entry(client).or_insert_with(|| Viewer::new(0));
        viewer.dismissed = viewer.dismissed.max(notification);
        viewer.seen = viewer.seen.max(notification);
        viewer.last_seen = Instant::now();
    }
}

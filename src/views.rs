//! Polling refreshes never restart a page's fetch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiClient;
use crate::buckets::{BucketKind, Observer, sort_buckets};
use crate::errors::FetchError;
use crate::models::{Play, Stats, StatsBucketsResponse};
use crate::resource::{AsyncResource, Host};
use crate::task::{FetchTask, fetch_plays_task, fetch_stats_task};
use crate::ui;

/// Publishes a revision number every time its resource changes state.
pub struct PageHost {
    name: &'static str,
    revision: watch::Sender<u64>,
}

impl PageHost {
    pub fn new(name: &'static str) -> Arc<Self> {
        let (revision, _) = watch::channel(0);
        Arc::new(Self { name, revision })
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}

impl Host for PageHost {
    fn request_update(&self) {
        self.revision.send_modify(|revision| *revision += 1);
        debug!(page = self.name, revision = self.revision(), "page update requested");
    }
}

pub struct PageView<A, T> {
    host: Arc<PageHost>,
    task: FetchTask<A, T>,
}

pub type StatsPage = PageView<(), Stats>;
pub type PlayHistory = PageView<(u32, u32), Vec<Play>>;

impl<A, T> PageView<A, T>
where
    A: Clone + PartialEq + Send + 'static,
    T: Send + 'static,
{
    /// Creates the host, binds its task and attaches it.
    pub fn mount(
        name: &'static str,
        bind: impl FnOnce(&Arc<PageHost>) -> FetchTask<A, T>,
    ) -> Self {
        let host = PageHost::new(name);
        let mut task = bind(&host);
        task.attach();
        debug!(page = name, "page mounted");
        Self { host, task }
    }

    pub fn host(&self) -> &Arc<PageHost> {
        &self.host
    }

    pub fn task(&self) -> &FetchTask<A, T> {
        &self.task
    }

    /// A fresh visit: fetch again unless a fetch is already in flight.
    pub fn navigate(&mut self) {
        if !self.task.resource().is_pending() {
            self.task.refresh();
        }
    }

    pub fn navigate_to(&mut self, args: A) {
        if !self.task.update(args) {
            self.navigate();
        }
    }

    /// Update stream and resource handle for waiting outside the views lock.
    pub fn watch(&self) -> (watch::Receiver<u64>, AsyncResource<T>) {
        (self.host.subscribe(), self.task.resource().clone())
    }
}

impl<A, T> Drop for PageView<A, T> {
    fn drop(&mut self) {
        self.task.detach();
    }
}

/// Waits until `resource` leaves the pending state or `wait` elapses.
/// Returns whether it settled.
pub async fn settle_within<T: Send + 'static>(
    mut updates: watch::Receiver<u64>,
    resource: AsyncResource<T>,
    wait: Duration,
) -> bool {
    let settled = async {
        while resource.is_pending() {
            if updates.changed().await.is_err() {
                break;
            }
        }
    };
    tokio::time::timeout(wait, settled).await.is_ok() && !resource.is_pending()
}

impl StatsPage {
    pub fn open(api: ApiClient) -> Self {
        Self::mount("stats", |host| fetch_stats_task(host, api))
    }

    pub fn render_html(&self, observer: &Observer) -> String {
        self.task.render(
            ui::render_loading_stats,
            |stats| {
                if stats.is_empty() {
                    ui::render_empty_state(
                        "No listening data yet",
                        "Start playing some music to see your stats here!",
                    )
                } else {
                    ui::render_stats_grid(stats, observer)
                }
            },
            |err| ui::render_fetch_error("Failed to load stats: ", err),
        )
    }

    pub fn buckets(&self, observer: &Observer) -> StatsBucketsResponse {
        let empty = |state: &'static str, error: Option<String>| StatsBucketsResponse {
            state,
            error,
            total_plays: None,
            hours: Vec::new(),
            days: Vec::new(),
            months: Vec::new(),
        };

        self.task.render(
            || empty("pending", None),
            |stats| StatsBucketsResponse {
                state: "complete",
                error: None,
                total_plays: Some(stats.overall.total_plays),
                hours: sort_buckets(&stats.plays_by_hour, BucketKind::Hour, observer),
                days: sort_buckets(&stats.plays_by_day, BucketKind::Day, observer),
                months: sort_buckets(&stats.plays_by_month, BucketKind::Month, observer),
            },
            |err: &FetchError| empty("error", Some(err.to_string())),
        )
    }
}

impl PlayHistory {
    pub fn open(api: ApiClient, limit: u32, offset: u32) -> Self {
        Self::mount("plays", |host| {
            let mut task = fetch_plays_task(host, api);
            task.update((limit, offset));
            task
        })
    }

    pub fn render_html(&self, observer: &Observer) -> String {
        let (limit, offset) = *self.task.args();
        self.task.render(
            ui::render_loading_plays,
            |plays| ui::render_play_list(plays, limit, offset, observer),
            |err| ui::render_fetch_error("", err),
        )
    }
}

//! Refresh scheduler.
//!
//! Pulls a complete mapping from the [`DocumentSource`] on a fixed interval and on
//! demand, and hands it to the store. The fetch runs without touching the store,
//! so queries keep reading the current snapshot while a refresh is in flight.
//!
//! # Policy
//! - One refresh at a time. A second trigger while one is running is rejected
//!   with `AlreadyRefreshing`.
//! - Fixed-interval retry: every attempt, successful or not, restarts the
//!   interval timer. There is no backoff.
//! - A failed attempt leaves the previous snapshot authoritative and records the
//!   failure for status reporting.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::knowledge::{KnowledgeStore, Snapshot};
use crate::persistence;
use crate::source::DocumentSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Refreshing,
    /// Most recent attempt failed; the previous snapshot is still served.
    Failed,
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub refresh_id: String,
    pub source: String,
    pub method_count: usize,
    /// False when the source returned exactly the content already loaded.
    pub changed: bool,
    pub source_version: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub state: RefreshState,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub update_interval_secs: u64,
    pub next_scheduled_refresh: Option<DateTime<Utc>>,
}

pub struct SchedulerSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    /// Where to write the warm-start cache after a successful refresh.
    pub cache_path: Option<PathBuf>,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.update_interval,
            fetch_timeout: config.fetch_timeout,
            cache_path: Some(config.cache_path.clone()),
        }
    }
}

#[derive(Default)]
struct Tracker {
    last_attempt: Option<DateTime<Utc>>,
    last_error: Option<String>,
    failed: bool,
    next_due: Option<DateTime<Utc>>,
}

/// Single writer of the knowledge store.
pub struct RefreshScheduler {
    store: Arc<KnowledgeStore>,
    source: Arc<dyn DocumentSource>,
    settings: SchedulerSettings,
    in_flight: AtomicBool,
    tracker: Mutex<Tracker>,
    reset: Notify,
    cancel: CancellationToken,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<KnowledgeStore>,
        source: Arc<dyn DocumentSource>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            source,
            settings,
            in_flight: AtomicBool::new(false),
            tracker: Mutex::new(Tracker::default()),
            reset: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn shutdown(&self) {
        tracing::info!("Stopping refresh scheduler");
        self.cancel.cancel();
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SchedulerStatus {
        let tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        let state = if self.is_refreshing() {
            RefreshState::Refreshing
        } else if tracker.failed {
            RefreshState::Failed
        } else {
            RefreshState::Idle
        };

        SchedulerStatus {
            state,
            last_attempt: tracker.last_attempt,
            last_error: tracker.last_error.clone(),
            update_interval_secs: self.settings.interval.as_secs(),
            next_scheduled_refresh: tracker.next_due,
        }
    }

    /// Run one refresh now.
    ///
    /// Fails with `AlreadyRefreshing` if another refresh is in flight, with
    /// `Cancelled` on shutdown, and with the source or schema error otherwise. In
    /// every failure case the store is left untouched.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(AppError::AlreadyRefreshing)?;

        let refresh_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let previous_version = self.store.snapshot().source_version().map(str::to_string);
        self.with_tracker(|t| t.last_attempt = Some(Utc::now()));

        tracing::info!(refresh_id = %refresh_id, source = self.source.name(), "Knowledge base refresh started");

        let result = self.fetch_and_load().await;
        self.restart_timer();

        match result {
            Ok(snapshot) => {
                self.with_tracker(|t| {
                    t.failed = false;
                    t.last_error = None;
                });

                let report = RefreshReport {
                    refresh_id,
                    source: self.source.name().to_string(),
                    method_count: snapshot.len(),
                    changed: previous_version.as_deref() != snapshot.source_version(),
                    source_version: snapshot.source_version().map(str::to_string),
                    last_updated: snapshot.last_updated(),
                    duration_ms: started.elapsed().as_millis() as u64,
                };

                tracing::info!(
                    refresh_id = %report.refresh_id,
                    methods = report.method_count,
                    changed = report.changed,
                    duration_ms = report.duration_ms,
                    "Knowledge base refresh succeeded"
                );
                metrics::counter!("refresh_total", "outcome" => "success").increment(1);
                metrics::histogram!("refresh_duration_ms").record(report.duration_ms as f64);

                self.save_cache(snapshot).await;
                Ok(report)
            }
            Err(AppError::Cancelled) => {
                tracing::warn!(refresh_id = %refresh_id, "Knowledge base refresh cancelled, partial data discarded");
                metrics::counter!("refresh_total", "outcome" => "cancelled").increment(1);
                Err(AppError::Cancelled)
            }
            Err(e) => {
                tracing::error!(
                    refresh_id = %refresh_id,
                    kind = e.kind(),
                    error = %e,
                    "Knowledge base refresh failed, keeping previous data"
                );
                self.with_tracker(|t| {
                    t.failed = true;
                    t.last_error = Some(e.to_string());
                });
                metrics::counter!("refresh_total", "outcome" => e.kind()).increment(1);
                Err(e)
            }
        }
    }

    /// Spawn the interval task. With `refresh_immediately` the first refresh runs
    /// at once instead of after one interval.
    pub fn spawn(self: &Arc<Self>, refresh_immediately: bool) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run(refresh_immediately).await })
    }

    async fn run(self: Arc<Self>, refresh_immediately: bool) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            "Refresh scheduler started"
        );

        if refresh_immediately {
            tracing::info!("Running initial knowledge base refresh");
            self.scheduled_refresh().await;
        } else {
            self.restart_timer();
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                // An on-demand refresh restarted the interval
                _ = self.reset.notified() => continue,
                _ = tokio::time::sleep(self.settings.interval) => {
                    self.scheduled_refresh().await;
                }
            }
        }

        tracing::info!("Refresh scheduler stopped");
    }

    async fn scheduled_refresh(&self) {
        match self.refresh().await {
            Ok(_) => {}
            Err(AppError::AlreadyRefreshing) => {
                tracing::debug!("Scheduled refresh skipped, one is already running");
            }
            // Already logged and recorded by refresh()
            Err(_) => {}
        }
    }

    async fn fetch_and_load(&self) -> Result<Arc<Snapshot>> {
        let timeout = self.settings.fetch_timeout;
        let fetch = tokio::time::timeout(timeout, self.source.fetch());

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            res = fetch => res.unwrap_or_else(|_| {
                Err(AppError::FetchError(format!(
                    "{} timed out after {}s",
                    self.source.name(),
                    timeout.as_secs()
                )))
            }),
        };

        self.store.load(fetched?)
    }

    async fn save_cache(&self, snapshot: Arc<Snapshot>) {
        let Some(path) = self.settings.cache_path.clone() else {
            return;
        };

        let saved =
            tokio::task::spawn_blocking(move || persistence::save_snapshot(&path, &snapshot)).await;
        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to write knowledge base cache"),
            Err(e) => tracing::warn!(error = %e, "Cache writer task failed"),
        }
    }

    fn restart_timer(&self) {
        let next_due = chrono::Duration::from_std(self.settings.interval)
            .ok()
            .and_then(|interval| Utc::now().checked_add_signed(interval));
        self.with_tracker(|t| t.next_due = next_due);
        self.reset.notify_one();
    }

    fn with_tracker(&self, f: impl FnOnce(&mut Tracker)) {
        let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tracker);
    }
}

/// Holds the in-flight flag for the duration of one refresh.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// src/services/tracker.rs

//! Public tracking API.
//!
//! `SiteTracker` is what a UI or notification layer talks to: it
//! canonicalizes URLs, enforces the minimum interval, keeps the store and
//! the timers in step, and hands out change subscriptions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{ChangeEvent, Config, SiteSummary, TrackedSite, TrackerConfig};
use crate::pipeline::{BackoffPolicy, ChangeBus, CheckReport, ContentNormalizer, SiteChecker};
use crate::services::{ContentFetcher, PollScheduler};
use crate::storage::TrackedSiteStore;
use crate::utils::url::format_url;

/// Tracks a set of pages and reports their content changes.
pub struct SiteTracker {
    settings: TrackerConfig,
    backoff: BackoffPolicy,
    store: Arc<TrackedSiteStore>,
    scheduler: PollScheduler,
}

impl SiteTracker {
    /// Wire a tracker from configuration and its two collaborators.
    pub fn new(
        config: &Config,
        store: Arc<TrackedSiteStore>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        let checker = SiteChecker::new(
            Arc::clone(&store),
            fetcher,
            ContentNormalizer::with_config(&config.normalizer),
            Arc::new(ChangeBus::new()),
            config.fetcher.timeout(),
        );
        let backoff = BackoffPolicy::new(config.tracker.backoff_cap);
        let scheduler = PollScheduler::new(Arc::new(checker), backoff);

        Self {
            settings: config.tracker.clone(),
            backoff,
            store,
            scheduler,
        }
    }

    pub fn store(&self) -> &Arc<TrackedSiteStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// Start timers for every stored site.
    ///
    /// Each site waits out whatever is left of the delay its last check
    /// earned, including any failure backoff; overdue sites are checked
    /// immediately.
    pub async fn start(&self) -> usize {
        let sites = self.store.list().await;
        for site in &sites {
            let interval = Duration::from_secs(site.poll_interval_secs);
            let first_delay = resume_delay(site, &self.backoff);
            self.scheduler.schedule(&site.url, interval, first_delay).await;
        }
        log::info!("Started polling {} tracked sites", sites.len());
        sites.len()
    }

    /// Track `url`, checking it at once to capture the baseline.
    ///
    /// Returns the canonical URL the site is stored under.
    pub async fn add_tracked(&self, url: &str, interval_secs: Option<u64>) -> Result<String> {
        let url = format_url(url)?;
        let interval_secs = self
            .settings
            .clamp_interval(interval_secs.unwrap_or(self.settings.default_interval_secs));

        self.store.add(&url, interval_secs).await?;
        self.scheduler
            .schedule(&url, Duration::from_secs(interval_secs), Duration::ZERO)
            .await;
        Ok(url)
    }

    /// Stop tracking `url` and delete its snapshot.
    ///
    /// The timer is only cancelled once the removal is stored, so a failed
    /// write leaves the site both tracked and polled.
    pub async fn remove_tracked(&self, url: &str) -> Result<()> {
        let url = format_url(url)?;
        self.store.remove(&url).await?;
        self.scheduler.cancel(&url).await;
        Ok(())
    }

    /// Change the polling interval of `url` and restart its timer.
    pub async fn set_interval(&self, url: &str, interval_secs: u64) -> Result<()> {
        let url = format_url(url)?;
        let interval_secs = self.settings.clamp_interval(interval_secs);
        self.store.set_interval(&url, interval_secs).await?;

        let interval = Duration::from_secs(interval_secs);
        self.scheduler.schedule(&url, interval, interval).await;
        log::info!("Polling {} every {}s", url, interval_secs);
        Ok(())
    }

    /// Receive every future change event on a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeEvent> {
        self.scheduler.checker().bus().subscribe()
    }

    /// Invoke `callback` once per detected change.
    ///
    /// The callback runs on its own task and cannot stall polling.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let mut events = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                callback(event);
            }
        });
    }

    /// Summaries of every tracked site.
    pub async fn list_tracked(&self) -> Vec<SiteSummary> {
        self.store.summaries().await
    }

    /// Check `url` once, outside its timer.
    pub async fn check_now(&self, url: &str) -> Result<CheckReport> {
        let url = format_url(url)?;
        self.scheduler.check_now(&url).await
    }

    /// Check every tracked site once, a bounded number at a time.
    pub async fn check_all(&self) -> Vec<(String, Result<CheckReport>)> {
        let urls = self.store.list_urls().await;
        let concurrency = self.settings.max_concurrent.max(1);

        stream::iter(urls)
            .map(|url| async move {
                let result = self.scheduler.check_now(&url).await;
                (url, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Cancel every timer. Stored sites are kept.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

/// Time left before a reloaded site is due, given its last check.
fn resume_delay(site: &TrackedSite, backoff: &BackoffPolicy) -> Duration {
    let Some(last_checked) = site.last_checked_at else {
        return Duration::ZERO;
    };
    let interval = Duration::from_secs(site.poll_interval_secs);
    let due_after = backoff.delay(interval, site.consecutive_failures);
    let elapsed = (Utc::now() - last_checked).to_std().unwrap_or(Duration::ZERO);
    due_after.saturating_sub(elapsed)
}

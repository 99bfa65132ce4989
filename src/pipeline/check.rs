// src/pipeline/check.rs

//! Single-site check: fetch, normalize, fingerprint, compare, record.
//!
//! One call is one scheduler tick for one URL. The store write always
//! happens before any change event is published, so subscribers never hear
//! about a snapshot the store does not hold yet.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, FetchError, Result};
use crate::models::{ChangeEvent, Snapshot, TrackedSite};
use crate::pipeline::{BackoffPolicy, ChangeBus, ContentNormalizer, DiffEngine};
use crate::services::ContentFetcher;
use crate::storage::TrackedSiteStore;

/// What a single check concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// First successful fetch; snapshot stored, nothing to compare against
    Baseline,
    /// Content normalized to the stored snapshot
    Unchanged,
    /// Content differs; the event was published after the store write
    Changed(ChangeEvent),
    /// Fetch failed; the failure streak was extended
    Failed {
        error: FetchError,
        consecutive_failures: u32,
    },
    /// Site was removed while the check was in flight; result dropped
    Discarded,
}

/// Result of checking one site.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub url: String,
    pub outcome: CheckOutcome,
    /// Base interval of the site when the check started
    pub poll_interval: Duration,
}

impl CheckReport {
    /// Delay until the next check, measured from when this one started.
    pub fn next_delay(&self, policy: &BackoffPolicy) -> Duration {
        match &self.outcome {
            CheckOutcome::Failed {
                consecutive_failures,
                ..
            } => policy.delay(self.poll_interval, *consecutive_failures),
            _ => self.poll_interval,
        }
    }
}

/// Runs the check pipeline against shared collaborators.
pub struct SiteChecker {
    store: Arc<TrackedSiteStore>,
    fetcher: Arc<dyn ContentFetcher>,
    normalizer: ContentNormalizer,
    diff_engine: DiffEngine,
    bus: Arc<ChangeBus>,
    fetch_timeout: Duration,
}

impl SiteChecker {
    pub fn new(
        store: Arc<TrackedSiteStore>,
        fetcher: Arc<dyn ContentFetcher>,
        normalizer: ContentNormalizer,
        bus: Arc<ChangeBus>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            normalizer,
            diff_engine: DiffEngine::new(),
            bus,
            fetch_timeout,
        }
    }

    pub fn store(&self) -> &Arc<TrackedSiteStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// Check `url` once.
    ///
    /// Returns `NotFound` if the site is not tracked when the check starts.
    /// A removal that lands while the fetch is in flight yields
    /// [`CheckOutcome::Discarded`] instead, even if the URL was added again
    /// in the meantime.
    pub async fn check(&self, url: &str) -> Result<CheckReport> {
        let site = self.store.get(url).await?;
        let poll_interval = Duration::from_secs(site.poll_interval_secs);

        let outcome = match self.fetch(url).await {
            Err(error) => self.record_failure(&site, error).await?,
            Ok(raw) => {
                let text = self.normalizer.normalize(&String::from_utf8_lossy(&raw));
                self.record_snapshot(&site, Snapshot::new(text)).await?
            }
        };

        Ok(CheckReport {
            url: url.to_string(),
            outcome,
            poll_interval,
        })
    }

    /// Fetch with the configured upper bound; overrunning it is a timeout.
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url, self.fetch_timeout))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn record_failure(&self, site: &TrackedSite, error: FetchError) -> Result<CheckOutcome> {
        let url = site.url.as_str();
        match self
            .store
            .record_failure(url, site.generation, Utc::now())
            .await
        {
            Ok(consecutive_failures) => {
                log::warn!(
                    "Check failed for {} ({} in a row): {}",
                    url,
                    consecutive_failures,
                    error
                );
                Ok(CheckOutcome::Failed {
                    error,
                    consecutive_failures,
                })
            }
            Err(AppError::NotFound(_)) => {
                log::debug!("Discarding failed check for removed site {}", url);
                Ok(CheckOutcome::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    async fn record_snapshot(&self, site: &TrackedSite, snapshot: Snapshot) -> Result<CheckOutcome> {
        let url = site.url.as_str();
        let outcome = match &site.snapshot {
            None => CheckOutcome::Baseline,
            Some(prev) if prev.fingerprint() == snapshot.fingerprint() => CheckOutcome::Unchanged,
            Some(prev) => {
                let diff = self.diff_engine.diff(prev.content(), snapshot.content());
                CheckOutcome::Changed(ChangeEvent::new(url, diff))
            }
        };

        match self
            .store
            .record_success(url, site.generation, snapshot, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                log::debug!("Discarding check result for removed site {}", url);
                return Ok(CheckOutcome::Discarded);
            }
            Err(e) => return Err(e),
        }

        match &outcome {
            CheckOutcome::Baseline => log::info!("Baseline captured for {}", url),
            CheckOutcome::Unchanged => log::debug!("No change at {}", url),
            CheckOutcome::Changed(event) => {
                log::info!("Change detected at {} ({} segments changed)", url, event.change_count());
                self.bus.publish(event);
            }
            _ => {}
        }
        Ok(outcome)
    }
}

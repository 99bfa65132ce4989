//! Durable tracked-site records.
//!
//! The whole site set is serialized as one JSON value under a single key.
//! Every operation takes the store lock, applies its change to a copy of the
//! set, persists the copy, and only then publishes it. A failed write leaves
//! both the backend and readers on the previous state, and no reader ever
//! observes a record with some fields updated and others not.
//!
//! Check results are written against the record's generation. Removing a
//! URL and adding it again starts a new generation, so a check that began
//! against the old record can never land on the new one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{SiteSummary, Snapshot, TrackedSite};
use crate::storage::KeyValueStore;

/// Persisted shape of the site set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSites {
    /// ISO 8601 timestamp of last update
    updated_at: DateTime<Utc>,
    /// Total site count
    count: usize,
    sites: Vec<TrackedSite>,
}

/// URL-keyed store of tracked sites backed by a [`KeyValueStore`].
pub struct TrackedSiteStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    sites: Mutex<BTreeMap<String, TrackedSite>>,
    next_generation: AtomicU64,
}

impl TrackedSiteStore {
    /// Load the site set stored under `key`, starting empty if absent.
    pub async fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let mut sites = BTreeMap::new();

        if let Some(bytes) = backend.get(&key).await? {
            let stored: StoredSites = serde_json::from_slice(&bytes)?;
            for mut site in stored.sites {
                if let Some(snapshot) = site.snapshot.as_mut() {
                    if snapshot.repair() {
                        log::warn!("Repaired stale fingerprint for {}", site.url);
                    }
                }
                sites.insert(site.url.clone(), site);
            }
            log::info!("Loaded {} tracked sites from '{}'", sites.len(), key);
        } else {
            log::info!("No tracked sites stored under '{}'", key);
        }

        let next_generation = sites
            .values()
            .map(|site| site.generation)
            .max()
            .map_or(1, |max| max + 1);

        Ok(Self {
            backend,
            key,
            sites: Mutex::new(sites),
            next_generation: AtomicU64::new(next_generation),
        })
    }

    /// Start tracking `url`. Fails if it is already tracked.
    pub async fn add(&self, url: &str, poll_interval_secs: u64) -> Result<TrackedSite> {
        let mut site = TrackedSite::new(url, poll_interval_secs);
        site.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let added = site.clone();
        self.mutate(|sites| {
            if sites.contains_key(url) {
                return Err(AppError::AlreadyTracked(url.to_string()));
            }
            sites.insert(url.to_string(), site);
            Ok(())
        })
        .await?;
        log::info!("Tracking {} every {}s", url, poll_interval_secs);
        Ok(added)
    }

    /// Stop tracking `url` and drop its snapshot.
    pub async fn remove(&self, url: &str) -> Result<()> {
        self.mutate(|sites| {
            sites
                .remove(url)
                .map(|_| ())
                .ok_or_else(|| AppError::NotFound(url.to_string()))
        })
        .await?;
        log::info!("Stopped tracking {}", url);
        Ok(())
    }

    pub async fn get(&self, url: &str) -> Result<TrackedSite> {
        self.sites
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::NotFound(url.to_string()))
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.sites.lock().await.contains_key(url)
    }

    /// All tracked URLs, in lexical order.
    pub async fn list_urls(&self) -> Vec<String> {
        self.sites.lock().await.keys().cloned().collect()
    }

    /// All tracked sites, in URL order.
    pub async fn list(&self) -> Vec<TrackedSite> {
        self.sites.lock().await.values().cloned().collect()
    }

    pub async fn summaries(&self) -> Vec<SiteSummary> {
        self.sites
            .lock()
            .await
            .values()
            .map(TrackedSite::summary)
            .collect()
    }

    /// Replace the snapshot and check time, and reset the failure streak.
    ///
    /// Fails with `NotFound` unless `url` is tracked under `generation`.
    pub async fn record_success(
        &self,
        url: &str,
        generation: u64,
        snapshot: Snapshot,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|sites| {
            let site = current(sites, url, generation)?;
            site.snapshot = Some(snapshot);
            site.last_checked_at = Some(checked_at);
            site.consecutive_failures = 0;
            Ok(())
        })
        .await
    }

    /// Count a failed check, leaving the snapshot untouched.
    ///
    /// Returns the new failure streak length.
    pub async fn record_failure(
        &self,
        url: &str,
        generation: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<u32> {
        self.mutate(|sites| {
            let site = current(sites, url, generation)?;
            site.consecutive_failures = site.consecutive_failures.saturating_add(1);
            site.last_checked_at = Some(checked_at);
            Ok(site.consecutive_failures)
        })
        .await
    }

    /// Change the polling interval of `url`.
    pub async fn set_interval(&self, url: &str, poll_interval_secs: u64) -> Result<()> {
        self.mutate(|sites| {
            let site = sites
                .get_mut(url)
                .ok_or_else(|| AppError::NotFound(url.to_string()))?;
            site.poll_interval_secs = poll_interval_secs;
            Ok(())
        })
        .await
    }

    /// Apply `change` to a copy of the set, persist it, then publish it.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, TrackedSite>) -> Result<T>,
    ) -> Result<T> {
        let mut sites = self.sites.lock().await;
        let mut next = sites.clone();
        let value = change(&mut next)?;
        self.persist(&next).await?;
        *sites = next;
        Ok(value)
    }

    async fn persist(&self, sites: &BTreeMap<String, TrackedSite>) -> Result<()> {
        let stored = StoredSites {
            updated_at: Utc::now(),
            count: sites.len(),
            sites: sites.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        self.backend.set(&self.key, &bytes).await
    }
}

/// The record for `url`, if it is still the one tracked under `generation`.
fn current<'a>(
    sites: &'a mut BTreeMap<String, TrackedSite>,
    url: &str,
    generation: u64,
) -> Result<&'a mut TrackedSite> {
    sites
        .get_mut(url)
        .filter(|site| site.generation == generation)
        .ok_or_else(|| AppError::NotFound(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, MemoryStore};
    use async_trait::async_trait;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/";

    async fn open_memory() -> (Arc<MemoryStore>, TrackedSiteStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = TrackedSiteStore::open(backend.clone(), "sites").await.unwrap();
        (backend, store)
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate() {
        let (_, store) = open_memory().await;
        store.add(URL, 30).await.unwrap();

        let err = store.add(URL, 60).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyTracked(_)));
        assert_eq!(store.get(URL).await.unwrap().poll_interval_secs, 30);
    }

    #[tokio::test]
    async fn test_remove_and_not_found() {
        let (_, store) = open_memory().await;
        store.add(URL, 30).await.unwrap();
        store.remove(URL).await.unwrap();

        assert!(store.remove(URL).await.unwrap_err().is_not_found());
        assert!(store.get(URL).await.unwrap_err().is_not_found());
        assert!(store.list_urls().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_success_resets_failures() {
        let (_, store) = open_memory().await;
        let generation = store.add(URL, 30).await.unwrap().generation;
        store.record_failure(URL, generation, Utc::now()).await.unwrap();
        store.record_failure(URL, generation, Utc::now()).await.unwrap();

        let checked_at = Utc::now();
        store
            .record_success(URL, generation, Snapshot::new("Hello"), checked_at)
            .await
            .unwrap();

        let site = store.get(URL).await.unwrap();
        assert_eq!(site.consecutive_failures, 0);
        assert_eq!(site.last_content(), Some("Hello"));
        assert_eq!(site.last_checked_at, Some(checked_at));
    }

    #[tokio::test]
    async fn test_record_failure_keeps_snapshot() {
        let (_, store) = open_memory().await;
        let generation = store.add(URL, 30).await.unwrap().generation;
        store
            .record_success(URL, generation, Snapshot::new("Hello"), Utc::now())
            .await
            .unwrap();

        let failures = store.record_failure(URL, generation, Utc::now()).await;
        assert_eq!(failures.unwrap(), 1);
        let failures = store.record_failure(URL, generation, Utc::now()).await;
        assert_eq!(failures.unwrap(), 2);

        let site = store.get(URL).await.unwrap();
        assert_eq!(site.consecutive_failures, 2);
        assert_eq!(site.last_content(), Some("Hello"));
        assert_eq!(
            site.last_fingerprint(),
            Some(Snapshot::new("Hello").fingerprint())
        );
    }

    #[tokio::test]
    async fn test_writes_to_removed_site_fail() {
        let (_, store) = open_memory().await;
        let generation = store.add(URL, 30).await.unwrap().generation;
        store.remove(URL).await.unwrap();

        let success = store
            .record_success(URL, generation, Snapshot::new("x"), Utc::now())
            .await;
        assert!(success.unwrap_err().is_not_found());
        let failure = store.record_failure(URL, generation, Utc::now()).await;
        assert!(failure.unwrap_err().is_not_found());
        assert!(store.set_interval(URL, 60).await.unwrap_err().is_not_found());
        assert!(!store.contains(URL).await);
    }

    #[tokio::test]
    async fn test_writes_to_readded_site_from_old_record_fail() {
        let (_, store) = open_memory().await;
        let old = store.add(URL, 30).await.unwrap().generation;
        store.remove(URL).await.unwrap();
        let new = store.add(URL, 30).await.unwrap().generation;
        assert_ne!(old, new);

        let success = store
            .record_success(URL, old, Snapshot::new("stale"), Utc::now())
            .await;
        assert!(success.unwrap_err().is_not_found());
        let failure = store.record_failure(URL, old, Utc::now()).await;
        assert!(failure.unwrap_err().is_not_found());

        let site = store.get(URL).await.unwrap();
        assert!(!site.has_baseline());
        assert_eq!(site.consecutive_failures, 0);

        store
            .record_success(URL, new, Snapshot::new("fresh"), Utc::now())
            .await
            .unwrap();
        assert_eq!(store.get(URL).await.unwrap().last_content(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_set_interval() {
        let (_, store) = open_memory().await;
        store.add(URL, 30).await.unwrap();
        store.set_interval(URL, 300).await.unwrap();
        assert_eq!(store.get(URL).await.unwrap().poll_interval_secs, 300);
    }

    #[tokio::test]
    async fn test_reopen_restores_sites() {
        let tmp = TempDir::new().unwrap();
        let backend: Arc<dyn KeyValueStore> = Arc::new(LocalStorage::new(tmp.path()));

        let store = TrackedSiteStore::open(backend.clone(), "sites").await.unwrap();
        let generation = store.add(URL, 30).await.unwrap().generation;
        store.add("https://other.example/", 120).await.unwrap();
        store
            .record_success(URL, generation, Snapshot::new("Hello"), Utc::now())
            .await
            .unwrap();
        drop(store);

        let reopened = TrackedSiteStore::open(backend, "sites").await.unwrap();
        assert_eq!(
            reopened.list_urls().await,
            vec!["https://example.com/", "https://other.example/"]
        );
        let site = reopened.get(URL).await.unwrap();
        assert_eq!(site.last_content(), Some("Hello"));
        assert_eq!(site.generation, generation);
        assert!(site.snapshot.unwrap().is_consistent());

        // Generations keep increasing after a reload.
        reopened.remove(URL).await.unwrap();
        let readded = reopened.add(URL, 30).await.unwrap();
        assert!(readded.generation > generation);
    }

    #[tokio::test]
    async fn test_summaries() {
        let (_, store) = open_memory().await;
        let generation = store.add(URL, 30).await.unwrap().generation;
        store.record_failure(URL, generation, Utc::now()).await.unwrap();

        let summaries = store.summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].url, URL);
        assert_eq!(summaries[0].consecutive_failures, 1);
        assert!(summaries[0].last_checked_at.is_some());
    }

    struct FailingBackend;

    #[async_trait]
    impl KeyValueStore for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(AppError::storage("disk full"))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let store = TrackedSiteStore::open(Arc::new(FailingBackend), "sites")
            .await
            .unwrap();

        assert!(matches!(
            store.add(URL, 30).await.unwrap_err(),
            AppError::Storage(_)
        ));
        assert!(!store.contains(URL).await);
    }

    #[tokio::test]
    async fn test_persists_on_every_write() {
        let (backend, store) = open_memory().await;
        store.add(URL, 30).await.unwrap();

        let bytes = backend.get("sites").await.unwrap().unwrap();
        let stored: StoredSites = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored.count, 1);
        assert_eq!(stored.sites[0].url, URL);
    }
}

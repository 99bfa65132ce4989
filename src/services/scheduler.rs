// src/services/scheduler.rs

//! Per-site polling timers.
//!
//! Every tracked URL gets its own spawned task that sleeps until its next
//! tick, runs one [`SiteChecker::check`], and computes the following tick
//! from when this one started. Tasks never wait on each other, so a slow or
//! failing site cannot delay any other.
//!
//! Ticks for one URL are serialized through a per-URL lock that survives
//! restarts (interval changes) and is also taken by manual checks, so two
//! writers never race on the same record. Removing a URL drops its lock; a
//! tick still in flight from before the removal is refused by the store,
//! since the re-added record carries a new generation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::pipeline::{BackoffPolicy, CheckOutcome, CheckReport, SiteChecker};

struct SiteTask {
    token: CancellationToken,
    tick_lock: Arc<Mutex<()>>,
}

type TaskMap = Arc<Mutex<HashMap<String, SiteTask>>>;

/// Owns one cancellable timer task per tracked URL.
pub struct PollScheduler {
    checker: Arc<SiteChecker>,
    backoff: BackoffPolicy,
    tasks: TaskMap,
    shutdown: CancellationToken,
}

impl PollScheduler {
    pub fn new(checker: Arc<SiteChecker>, backoff: BackoffPolicy) -> Self {
        Self {
            checker,
            backoff,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn checker(&self) -> &Arc<SiteChecker> {
        &self.checker
    }

    /// Start polling `url`, replacing any timer it already has.
    ///
    /// The first tick fires after `first_delay`; `interval` is only used to
    /// retry after a storage error, since each successful tick reports the
    /// site's current interval itself.
    pub async fn schedule(&self, url: &str, interval: Duration, first_delay: Duration) {
        let mut tasks = self.tasks.lock().await;

        let tick_lock = match tasks.remove(url) {
            Some(previous) => {
                previous.token.cancel();
                previous.tick_lock
            }
            None => Arc::new(Mutex::new(())),
        };

        let token = self.shutdown.child_token();
        tokio::spawn(poll_loop(
            Arc::clone(&self.checker),
            Arc::clone(&self.tasks),
            self.backoff,
            url.to_string(),
            token.clone(),
            Arc::clone(&tick_lock),
            interval,
            first_delay,
        ));

        log::debug!(
            "Scheduled {} (first tick in {}s)",
            url,
            first_delay.as_secs()
        );
        tasks.insert(url.to_string(), SiteTask { token, tick_lock });
    }

    /// Cancel the timer for `url`. Returns false if none was scheduled.
    ///
    /// A tick already in flight runs to completion; its store write fails
    /// once the site is removed, and its result is dropped.
    pub async fn cancel(&self, url: &str) -> bool {
        match self.tasks.lock().await.remove(url) {
            Some(task) => {
                task.token.cancel();
                log::debug!("Cancelled timer for {}", url);
                true
            }
            None => false,
        }
    }

    /// Whether a live timer exists for `url`.
    pub async fn is_scheduled(&self, url: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(url)
            .is_some_and(|task| !task.token.is_cancelled())
    }

    /// URLs with a live timer.
    pub async fn scheduled_urls(&self) -> Vec<String> {
        let tasks = self.tasks.lock().await;
        let mut urls: Vec<String> = tasks
            .iter()
            .filter(|(_, task)| !task.token.is_cancelled())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    /// Run one check for `url` now, serialized with its timer ticks.
    pub async fn check_now(&self, url: &str) -> Result<CheckReport> {
        let tick_lock = self
            .tasks
            .lock()
            .await
            .get(url)
            .map(|task| Arc::clone(&task.tick_lock));

        match tick_lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                self.checker.check(url).await
            }
            None => self.checker.check(url).await,
        }
    }

    /// Cancel every timer.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        log::info!("Stopping {} site timers", tasks.len());
        tasks.clear();
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn poll_loop(
    checker: Arc<SiteChecker>,
    tasks: TaskMap,
    backoff: BackoffPolicy,
    url: String,
    token: CancellationToken,
    tick_lock: Arc<Mutex<()>>,
    interval: Duration,
    first_delay: Duration,
) {
    let mut next = Instant::now() + first_delay;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(next) => {}
        }

        let started = Instant::now();
        let guard = tick_lock.lock().await;
        if token.is_cancelled() {
            break;
        }
        let result = checker.check(&url).await;
        drop(guard);

        match result {
            Ok(report) if matches!(report.outcome, CheckOutcome::Discarded) => break,
            Ok(report) => {
                let delay = report.next_delay(&backoff);
                log::debug!("Next check of {} in {}s", url, delay.as_secs());
                next = started + delay;
            }
            Err(e) if e.is_not_found() => break,
            Err(e) => {
                log::error!("Check of {} could not be recorded: {}", url, e);
                next = started + interval;
            }
        }
    }

    token.cancel();
    prune(&tasks, &url).await;
    log::debug!("Stopped polling {}", url);
}

/// Drop the entry for `url` if its timer has ended.
///
/// A replacement scheduled in the meantime holds a live token and is kept.
async fn prune(tasks: &TaskMap, url: &str) {
    let mut tasks = tasks.lock().await;
    if tasks.get(url).is_some_and(|task| task.token.is_cancelled()) {
        tasks.remove(url);
    }
}

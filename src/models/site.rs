//! Tracked site records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::fingerprint;

/// Normalized page text together with its digest.
///
/// The only constructor computes the fingerprint from the content, so a
/// snapshot can never carry a stale digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    content: String,
    fingerprint: String,
}

impl Snapshot {
    /// Capture normalized text.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let fingerprint = fingerprint::digest(&content);
        Self {
            content,
            fingerprint,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the stored digest still matches the content.
    pub fn is_consistent(&self) -> bool {
        fingerprint::digest(&self.content) == self.fingerprint
    }

    /// Recompute the digest, returning true if it had drifted.
    pub(crate) fn repair(&mut self) -> bool {
        let expected = fingerprint::digest(&self.content);
        if expected == self.fingerprint {
            return false;
        }
        self.fingerprint = expected;
        true
    }
}

/// One monitored page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedSite {
    /// Canonical URL (unique key)
    pub url: String,

    /// Last successful snapshot; absent before the first successful check
    #[serde(default)]
    pub snapshot: Option<Snapshot>,

    /// Time of the last check, successful or not
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Seconds between checks
    pub poll_interval_secs: u64,

    /// Failed checks since the last success
    #[serde(default)]
    pub consecutive_failures: u32,

    /// When tracking started
    pub added_at: DateTime<Utc>,

    /// Identity of this tracking session; a re-add of the same URL gets a
    /// new one, so writes meant for the old record are refused
    #[serde(default)]
    pub generation: u64,
}

impl TrackedSite {
    pub fn new(url: impl Into<String>, poll_interval_secs: u64) -> Self {
        Self {
            url: url.into(),
            snapshot: None,
            last_checked_at: None,
            poll_interval_secs,
            consecutive_failures: 0,
            added_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn last_content(&self) -> Option<&str> {
        self.snapshot.as_ref().map(Snapshot::content)
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.snapshot.as_ref().map(Snapshot::fingerprint)
    }

    /// Whether a baseline snapshot has been captured.
    pub fn has_baseline(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn summary(&self) -> SiteSummary {
        SiteSummary {
            url: self.url.clone(),
            last_checked_at: self.last_checked_at,
            consecutive_failures: self.consecutive_failures,
            poll_interval_secs: self.poll_interval_secs,
        }
    }
}

/// Lightweight view of a tracked site for listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteSummary {
    pub url: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub poll_interval_secs: u64,
}

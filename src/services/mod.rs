//! Service layer for the tracker.
//!
//! This module contains:
//! - Page fetching (`ContentFetcher`, `HttpFetcher`)
//! - Per-site polling timers (`PollScheduler`)
//! - The public tracking API (`SiteTracker`)

mod fetcher;
mod scheduler;
mod tracker;

pub use fetcher::{ContentFetcher, HttpFetcher};
pub use scheduler::PollScheduler;
pub use tracker::SiteTracker;

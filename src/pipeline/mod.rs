//! Change-detection pipeline.
//!
//! - `normalize`: raw HTML to comparable body text
//! - `fingerprint`: digest used for the cheap equality check
//! - `diff`: token-level diff between two snapshots
//! - `backoff`: delay growth after failed checks
//! - `events`: fan-out of change events to subscribers
//! - `check`: one tick for one site, tying the above together

pub mod backoff;
pub mod check;
pub mod diff;
pub mod events;
pub mod fingerprint;
pub mod normalize;

pub use backoff::BackoffPolicy;
pub use check::{CheckOutcome, CheckReport, SiteChecker};
pub use diff::{DiffEngine, calculate_diff};
pub use events::ChangeBus;
pub use normalize::ContentNormalizer;

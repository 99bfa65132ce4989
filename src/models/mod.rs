// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod site;

// Re-export all public types
pub use change::{ChangeEvent, DiffSegment, SegmentKind, reconstruct_new, reconstruct_old};
pub use config::{
    Config, FetcherConfig, LoggingConfig, NormalizerConfig, StorageConfig, TrackerConfig,
};
pub use site::{SiteSummary, Snapshot, TrackedSite};

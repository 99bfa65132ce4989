//! Storage abstractions for tracked-site persistence.
//!
//! The tracker persists through a plain key-value interface so any durable
//! byte store can back it:
//!
//! - `MemoryStore`: process-local map, for tests and throwaway sessions
//! - `LocalStorage`: one JSON file per key under a root directory
//! - `S3Storage`: one object per key under a bucket prefix (`s3` feature)
//!
//! `TrackedSiteStore` layers the per-URL record operations on top.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml             # Tracker configuration
//! └── tracked-websites.json   # All tracked sites and their snapshots
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod sites;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
pub use sites::TrackedSiteStore;

/// Durable byte store addressed by string keys.
///
/// Writes to a single key are expected to be atomic; nothing is assumed
/// about transactions spanning several keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, returning `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

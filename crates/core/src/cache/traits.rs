use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Cache entry lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The entry never expires (eviction only).
    None,
    /// Sliding time-to-live: reading the entry restarts the clock.
    Sliding(Duration),
}

/// Trait for basic cache operations with group tagging.
///
/// A group key is a label shared by multiple entries; evicting a group
/// removes every entry tagged with it. This is how a mutation keeps cached
/// list queries consistent. Group eviction must be atomic per group with
/// respect to concurrent writers of that group.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key, refreshing a sliding expiration.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value tagged with zero or more group keys.
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        groups: &[String],
        expiration: Expiration,
    ) -> Result<()>;

    /// Deletes a single value by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Evicts every entry tagged with the given group key.
    async fn evict_group(&self, group: &str) -> Result<()>;
}

//! # Cache Module
//!
//! Content cache for catalog entities.
//!
//! Every directory in the tree is backed by one fetched blob of catalog JSON
//! (an album with all of its tracks, a playlist with all of its items, ...).
//! Fetching those blobs means draining server-side pagination, so they are
//! kept here and shared by every node that needs them.
//!
//! ## Features
//!
//! - **TTL**: entries older than the configured TTL (one hour by default) are
//!   treated as absent and fetched again
//! - **Bounded**: the number of resident entries is capped (64K by default);
//!   the oldest entries are evicted first
//! - **Single-flight**: concurrent misses on the same key wait for the one
//!   in-flight fetch instead of issuing duplicate remote calls
//! - **Explicit invalidation**: mutations drop the affected entry so the next
//!   listing reflects them
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use spotifyfs::cache::ContentCache;
//! use spotifyfs::catalog::{CacheKey, EntityKind};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> Result<(), spotifyfs::error::FsError> {
//! let cache = ContentCache::new(64 * 1024, Duration::from_secs(3600));
//! let key = CacheKey::new(EntityKind::Album, "4aawyAB9vmqN3uQ7FjRGTy");
//!
//! let album = cache
//!     .get_or_fetch(key.clone(), || async {
//!         Ok::<_, spotifyfs::error::FsError>(Arc::new(serde_json::json!({"name": "Global Warming"})))
//!     })
//!     .await?;
//! assert_eq!(album["name"], "Global Warming");
//!
//! // After a mutation:
//! cache.invalidate(&key);
//! # Ok(())
//! # }
//! ```

pub mod ttl_cache;

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::catalog::CacheKey;
pub use ttl_cache::{CacheMetrics, TtlCache};

/// Cache of fetched catalog content, keyed by entity kind and id.
///
/// Values are shared: a hit hands out another reference to the same blob, so
/// directory indexes can tell by pointer identity whether they were built from
/// the current entry.
pub type ContentCache = TtlCache<CacheKey, Arc<Value>>;

impl ContentCache {
    /// Sweeps expired entries and logs how many were dropped.
    ///
    /// Expired entries are already invisible to readers; this only returns
    /// their memory.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
    }
}

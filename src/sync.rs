use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::image_cache::ImageCache;
use crate::model::{PageRequest, Post};
use crate::reachability::NetworkReachability;
use crate::remote::{NetworkError, RemoteSource};
use crate::storage::{PostStore, StorageError};

/// Composite outcome distinguishing which subsystem failed. The two leaf
/// taxonomies are never coerced into each other.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("database error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// The leaf message, suitable for direct display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(e) => e.to_string(),
            Self::Storage(e) => e.to_string(),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Default)]
struct SyncCounters {
    swallowed_write_failures: AtomicU64,
    storage_fallbacks: AtomicU64,
    image_cache_hits: AtomicU64,
    image_cache_misses: AtomicU64,
}

/// Point-in-time view of the service counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMetrics {
    pub swallowed_write_failures: u64,
    pub storage_fallbacks: u64,
    pub image_cache_hits: u64,
    pub image_cache_misses: u64,
}

impl SyncCounters {
    fn snapshot(&self) -> SyncMetrics {
        SyncMetrics {
            swallowed_write_failures: self.swallowed_write_failures.load(Ordering::Relaxed),
            storage_fallbacks: self.storage_fallbacks.load(Ordering::Relaxed),
            image_cache_hits: self.image_cache_hits.load(Ordering::Relaxed),
            image_cache_misses: self.image_cache_misses.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Synchronization Service
// ============================================================================

/// Single decision point for "where does this read come from".
///
/// Network-first with storage fallback for reads; storage-only for like
/// toggles. Holds no persistent state of its own.
pub struct SyncService<R, S> {
    remote: Arc<R>,
    store: Arc<S>,
    reachability: Arc<dyn NetworkReachability>,
    images: Arc<dyn ImageCache>,
    counters: SyncCounters,
}

impl<R, S> SyncService<R, S>
where
    R: RemoteSource,
    S: PostStore,
{
    pub fn new(
        remote: Arc<R>,
        store: Arc<S>,
        reachability: Arc<dyn NetworkReachability>,
        images: Arc<dyn ImageCache>,
    ) -> Self {
        Self {
            remote,
            store,
            reachability,
            images,
            counters: SyncCounters::default(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> SyncMetrics {
        self.counters.snapshot()
    }

    /// Fetch one page of posts. Fresh network pages are persisted before
    /// they are returned; a network failure that a cached page can cover
    /// is not an error.
    #[instrument(skip(self), fields(page = request.page(), limit = request.limit()))]
    pub async fn fetch_posts(&self, request: PageRequest) -> Result<Vec<Post>, SyncError> {
        if !self.reachability.is_connected() {
            return self.store.fetch_posts(request).await.map_err(SyncError::from);
        }

        match self.remote.fetch_posts(request).await {
            Ok(dtos) => {
                let posts: Vec<Post> = dtos.into_iter().map(Post::from).collect();
                self.persist_posts(&posts).await;
                Ok(posts)
            }
            Err(network_error) => {
                warn!(error = %network_error, "network fetch failed, falling back to local store");
                self.counters.storage_fallbacks.fetch_add(1, Ordering::Relaxed);

                match self.store.fetch_posts(request).await {
                    // Cached data covers the failure.
                    Ok(cached) if !cached.is_empty() => Ok(cached),
                    // Nothing usable cached: the network error is the story.
                    Ok(_) => Err(SyncError::Network(network_error)),
                    Err(storage_error) => Err(SyncError::Storage(storage_error)),
                }
            }
        }
    }

    /// Fetch image bytes for a URL. The memory cache is consulted before
    /// any I/O; network hits write through to cache and store.
    #[instrument(skip(self))]
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes, SyncError> {
        if let Some(bytes) = self.images.get(url) {
            self.counters.image_cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(bytes);
        }
        self.counters.image_cache_misses.fetch_add(1, Ordering::Relaxed);

        if !self.reachability.is_connected() {
            return self.image_from_store(url).await;
        }

        match self.remote.fetch_image(url).await {
            Ok(bytes) => {
                self.images.put(url, bytes.clone());
                if let Err(error) = self.store.save_image_data(&bytes, url).await {
                    self.swallow_write_failure("image write-through failed", &error);
                }
                Ok(bytes)
            }
            Err(network_error) => {
                warn!(error = %network_error, "image fetch failed, falling back to local store");
                self.counters.storage_fallbacks.fetch_add(1, Ordering::Relaxed);
                self.image_from_store(url).await
            }
        }
    }

    /// Like toggles are never network-routed. Failures do not reach the
    /// caller; they are logged and counted.
    #[instrument(skip(self))]
    pub async fn toggle_like(&self, post_id: i64) {
        if let Err(error) = self.store.toggle_like(post_id).await {
            self.swallow_write_failure("like toggle failed", &error);
        }
    }

    async fn image_from_store(&self, url: &str) -> Result<Bytes, SyncError> {
        match self.store.get_image_data(url).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(SyncError::Storage(StorageError::ObjectNotFound)),
            Err(storage_error) => Err(SyncError::Storage(storage_error)),
        }
    }

    async fn persist_posts(&self, posts: &[Post]) {
        if let Err(error) = self.store.save_posts(posts).await {
            self.swallow_write_failure("post page persist failed", &error);
        }
    }

    fn swallow_write_failure(&self, context: &str, error: &StorageError) {
        warn!(error = %error, "{context}");
        self.counters
            .swallowed_write_failures
            .fetch_add(1, Ordering::Relaxed);
    }
}

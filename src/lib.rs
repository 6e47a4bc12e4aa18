//! Offline-aware data core for a mobile social feed.
//!
//! The crate decides, per read, whether to serve from the network or the
//! local store, persists successful network results for offline viewing,
//! and derives the finite presentation state the UI renders. The host
//! application owns rendering, lifecycle and wiring; it talks to this
//! core through [`Feed`] and the [`FeedUpdate`] queue.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod feed;
pub mod image_cache;
pub mod model;
pub mod reachability;
pub mod remote;
pub mod storage;
pub mod sync;

pub use feed::{Feed, FeedConfig, FeedState, FeedUpdate};
pub use image_cache::{ImageCache, LruImageCache};
pub use model::{avatar_url, PageCursor, PageRequest, Post, PostDto};
pub use reachability::{NetworkReachability, ReachabilityHandle, ReachabilityMonitor};
pub use remote::{ApiConfig, JsonPlaceholderClient, NetworkError, RemoteSource};
pub use storage::{PostStore, SqliteStore, StorageError};
pub use sync::{SyncError, SyncMetrics, SyncService};

/// Fixed host of the posts API.
pub const API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Base of the deterministic per-user avatar URLs.
pub const IMAGE_BASE_URL: &str = "https://picsum.photos";

/// Square avatar dimension baked into derived avatar URLs.
pub const AVATAR_IMAGE_SIZE: u32 = 200;

/// Pages are 1-based throughout.
pub const FIRST_PAGE: u32 = 1;

/// Posts requested per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Bounded capacity of the in-memory avatar cache.
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 128;

/// Bounded capacity of the UI update queue.
pub const DEFAULT_UPDATE_BUFFER: usize = 32;

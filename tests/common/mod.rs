#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use feedcore::{
    Feed, FeedConfig, FeedState, FeedUpdate, ImageCache, LruImageCache, NetworkError,
    NetworkReachability, PageRequest, PostDto, RemoteSource, SqliteStore, SyncService,
};
use tokio::sync::{mpsc, Notify};

pub fn dto(id: i64) -> PostDto {
    PostDto {
        user_id: id % 10,
        id,
        title: format!("title {id}"),
        body: format!("body {id}"),
    }
}

pub fn dtos(ids: RangeInclusive<i64>) -> Vec<PostDto> {
    ids.map(dto).collect()
}

/// Scripted remote: queued post-page replies, per-URL image replies, call
/// counters, and an optional one-shot gate to hold the next page fetch
/// in flight.
#[derive(Default)]
pub struct MockRemote {
    posts_replies: Mutex<VecDeque<Result<Vec<PostDto>, NetworkError>>>,
    image_replies: Mutex<HashMap<String, Result<Bytes, NetworkError>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    pub posts_calls: AtomicU64,
    pub image_calls: AtomicU64,
}

impl MockRemote {
    pub fn reply_posts(&self, reply: Result<Vec<PostDto>, NetworkError>) {
        self.posts_replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_image(&self, url: &str, reply: Result<Bytes, NetworkError>) {
        self.image_replies.lock().unwrap().insert(url.into(), reply);
    }

    /// The next `fetch_posts` call parks until the returned gate is
    /// notified.
    pub fn hold_next_page(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait::async_trait]
impl RemoteSource for MockRemote {
    async fn fetch_posts(&self, _request: PageRequest) -> Result<Vec<PostDto>, NetworkError> {
        self.posts_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.posts_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn fetch_image(&self, url: &str) -> Result<Bytes, NetworkError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.image_replies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(NetworkError::UnableToComplete))
    }
}

pub struct StaticReachability(AtomicBool);

impl StaticReachability {
    pub fn connected(value: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(value)))
    }

    pub fn set_connected(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl NetworkReachability for StaticReachability {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    fn start(&self) {}
    fn stop(&self) {}
}

pub struct Harness {
    pub feed: Feed<MockRemote, SqliteStore>,
    pub updates: mpsc::Receiver<FeedUpdate>,
    pub remote: Arc<MockRemote>,
    pub store: Arc<SqliteStore>,
    pub reachability: Arc<StaticReachability>,
}

/// Full stack over a real in-memory store: mock remote + mock reachability
/// + cold LRU cache + feed.
pub async fn harness(connected: bool, page_size: u32) -> Harness {
    let remote = Arc::new(MockRemote::default());
    let store = Arc::new(SqliteStore::new_in_memory().await.unwrap());
    let reachability = StaticReachability::connected(connected);

    let sync = Arc::new(SyncService::new(
        Arc::clone(&remote),
        Arc::clone(&store),
        reachability.clone() as Arc<dyn NetworkReachability>,
        Arc::new(LruImageCache::default()) as Arc<dyn ImageCache>,
    ));

    let (feed, updates) = Feed::new(
        sync,
        FeedConfig {
            page_size,
            ..FeedConfig::default()
        },
    );

    Harness {
        feed,
        updates,
        remote,
        store,
        reachability,
    }
}

pub struct SyncHarness {
    pub sync: SyncService<MockRemote, SqliteStore>,
    pub remote: Arc<MockRemote>,
    pub store: Arc<SqliteStore>,
    pub reachability: Arc<StaticReachability>,
    pub cache: Arc<LruImageCache>,
}

/// Service-level stack sharing a caller-supplied store, so tests can model
/// a warm store across service restarts.
pub async fn sync_harness(connected: bool, store: Arc<SqliteStore>) -> SyncHarness {
    let remote = Arc::new(MockRemote::default());
    let reachability = StaticReachability::connected(connected);
    let cache = Arc::new(LruImageCache::default());

    let sync = SyncService::new(
        Arc::clone(&remote),
        Arc::clone(&store),
        reachability.clone() as Arc<dyn NetworkReachability>,
        cache.clone() as Arc<dyn ImageCache>,
    );

    SyncHarness {
        sync,
        remote,
        store,
        reachability,
        cache,
    }
}

pub fn drain_updates(updates: &mut mpsc::Receiver<FeedUpdate>) -> Vec<FeedUpdate> {
    let mut drained = Vec::new();
    while let Ok(update) = updates.try_recv() {
        drained.push(update);
    }
    drained
}

pub fn states(updates: &[FeedUpdate]) -> Vec<FeedState> {
    updates
        .iter()
        .filter_map(|update| match update {
            FeedUpdate::State(state) => Some(state.clone()),
            FeedUpdate::Like { .. } => None,
        })
        .collect()
}

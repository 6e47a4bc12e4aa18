use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::{PageCursor, PageRequest, Post};
use crate::remote::RemoteSource;
use crate::storage::{PostStore, StorageError};
use crate::sync::{SyncError, SyncService};
use crate::{DEFAULT_PAGE_SIZE, DEFAULT_UPDATE_BUFFER};

/// Finite presentation state derived from synchronization results.
/// `Pagination` is distinct from `Success` so a consumer can insert the
/// appended rows instead of redrawing the whole list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedState {
    Loading,
    Success,
    Empty,
    Error(String),
    Pagination { start_index: usize, count: usize },
}

/// UI-bound notifications. Everything the presentation layer may react to
/// flows through this one queue, drained on the UI-affinity context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedUpdate {
    State(FeedState),
    Like { index: usize, is_liked: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    pub page_size: u32,
    pub update_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            update_buffer: DEFAULT_UPDATE_BUFFER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Refresh,
    LoadMore,
}

struct FeedInner {
    posts: Vec<Post>,
    cursor: PageCursor,
    state: FeedState,
    is_fetching: bool,
    is_refreshing: bool,
}

/// Owner of the in-memory post list and pagination cursor; the sole
/// mutator of UI-visible feed state.
///
/// At most one fetch (initial, refresh or pagination) is in flight at any
/// time; concurrent triggers are dropped, not queued. In-flight requests
/// run to completion; a caller that drops a fetch future mid-flight only
/// releases the guard.
pub struct Feed<R, S> {
    service: Arc<SyncService<R, S>>,
    inner: Mutex<FeedInner>,
    updates: mpsc::Sender<FeedUpdate>,
}

/// Releases the in-flight flags even when the owning future is dropped.
struct FetchGuard<'a> {
    inner: &'a Mutex<FeedInner>,
    clear_refresh: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.is_fetching = false;
            if self.clear_refresh {
                inner.is_refreshing = false;
            }
        }
    }
}

impl<R, S> Feed<R, S>
where
    R: RemoteSource + 'static,
    S: PostStore + 'static,
{
    /// Returns the feed and the update receiver the UI drains.
    pub fn new(
        service: Arc<SyncService<R, S>>,
        config: FeedConfig,
    ) -> (Self, mpsc::Receiver<FeedUpdate>) {
        let (updates, receiver) = mpsc::channel(config.update_buffer.max(1));
        let feed = Self {
            service,
            inner: Mutex::new(FeedInner {
                posts: Vec::new(),
                cursor: PageCursor::new(config.page_size),
                state: FeedState::Loading,
                is_fetching: false,
                is_refreshing: false,
            }),
            updates,
        };
        (feed, receiver)
    }

    #[must_use]
    pub fn number_of_items(&self) -> usize {
        self.inner.lock().unwrap().posts.len()
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<Post> {
        self.inner.lock().unwrap().posts.get(index).cloned()
    }

    #[must_use]
    pub fn state(&self) -> FeedState {
        self.inner.lock().unwrap().state.clone()
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.inner.lock().unwrap().cursor.has_more()
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.inner.lock().unwrap().cursor.page()
    }

    /// Initial load of the current page.
    pub async fn fetch_posts(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            Self::emit(&self.updates, &mut inner, FeedState::Loading);
        }
        self.run_fetch(FetchKind::Initial).await;
    }

    /// Full refresh from the first page; on success the list is replaced.
    pub async fn refresh_posts(&self) {
        self.run_fetch(FetchKind::Refresh).await;
    }

    /// Load the next page, triggered by the UI's scroll-proximity signal.
    pub async fn fetch_more_posts(&self) {
        self.run_fetch(FetchKind::LoadMore).await;
    }

    /// Optimistically flips the like locally, then hands the write to the
    /// local store without waiting for it. The returned handle may be
    /// ignored; a stale index is a no-op.
    pub fn toggle_like(&self, post_id: i64, index: usize) -> Option<JoinHandle<()>> {
        let is_liked = {
            let mut inner = self.inner.lock().unwrap();
            let post = inner.posts.get_mut(index)?;
            if post.id != post_id {
                debug!(post_id, index, "like toggle against a stale index, ignored");
                return None;
            }
            post.is_liked = !post.is_liked;
            post.is_liked
        };

        Self::push_update(&self.updates, FeedUpdate::Like { index, is_liked });

        let service = Arc::clone(&self.service);
        Some(tokio::spawn(async move {
            service.toggle_like(post_id).await;
        }))
    }

    /// Avatar bytes for a cell; failures degrade to `None`.
    pub async fn fetch_avatar(&self, url: &str) -> Option<Bytes> {
        match self.service.fetch_image(url).await {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                debug!(error = %error, "avatar fetch failed");
                None
            }
        }
    }

    async fn run_fetch(&self, kind: FetchKind) {
        let Some((guard, request)) = self.try_begin(kind) else {
            return;
        };

        let result = self.service.fetch_posts(request).await;

        drop(guard);
        self.apply(kind, request, result);
    }

    fn try_begin(&self, kind: FetchKind) -> Option<(FetchGuard<'_>, PageRequest)> {
        let mut inner = self.inner.lock().unwrap();

        match kind {
            FetchKind::Initial | FetchKind::LoadMore => {
                if inner.is_fetching || inner.is_refreshing || !inner.cursor.has_more() {
                    return None;
                }
                if kind == FetchKind::LoadMore {
                    // Speculative; undone if the request fails.
                    inner.cursor.advance();
                }
            }
            FetchKind::Refresh => {
                if inner.is_fetching {
                    return None;
                }
                inner.is_refreshing = true;
                inner.cursor.reset();
            }
        }

        inner.is_fetching = true;
        let request = inner.cursor.request();
        Some((
            FetchGuard {
                inner: &self.inner,
                clear_refresh: kind == FetchKind::Refresh,
            },
            request,
        ))
    }

    fn apply(&self, kind: FetchKind, request: PageRequest, result: Result<Vec<Post>, SyncError>) {
        let mut inner = self.inner.lock().unwrap();

        match result {
            Ok(new_posts) => {
                let count = new_posts.len();
                let has_more = count as u64 >= u64::from(request.limit());

                if kind == FetchKind::Refresh {
                    inner.posts = new_posts;
                } else {
                    inner.posts.extend(new_posts);
                }

                let state = if inner.posts.is_empty() {
                    FeedState::Empty
                } else if kind == FetchKind::Refresh {
                    FeedState::Success
                } else {
                    let start_index = inner.posts.len() - count;
                    if start_index == 0 {
                        FeedState::Success
                    } else {
                        FeedState::Pagination { start_index, count }
                    }
                };
                Self::emit(&self.updates, &mut inner, state);

                // Flips only after the state above is visible.
                inner.cursor.set_has_more(has_more);
            }
            Err(error) => {
                if kind == FetchKind::LoadMore {
                    // Undo the speculative advance so a retry re-requests
                    // the same page.
                    inner.cursor.retreat();
                    let message = error.user_message();
                    Self::emit(&self.updates, &mut inner, FeedState::Error(message));
                    return;
                }

                if !inner.posts.is_empty() {
                    // Stale-but-available data beats an error banner.
                    Self::emit(&self.updates, &mut inner, FeedState::Success);
                    return;
                }

                match error {
                    SyncError::Storage(StorageError::ObjectNotFound) => {
                        inner.posts.clear();
                        Self::emit(&self.updates, &mut inner, FeedState::Empty);
                    }
                    other => {
                        let message = other.user_message();
                        Self::emit(&self.updates, &mut inner, FeedState::Error(message));
                    }
                }
            }
        }
    }

    fn emit(updates: &mpsc::Sender<FeedUpdate>, inner: &mut FeedInner, state: FeedState) {
        inner.state = state.clone();
        Self::push_update(updates, FeedUpdate::State(state));
    }

    fn push_update(updates: &mpsc::Sender<FeedUpdate>, update: FeedUpdate) {
        if let Err(error) = updates.try_send(update) {
            // The UI context is not draining; dropping beats blocking the
            // data layer.
            warn!(error = %error, "feed update dropped");
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::{AVATAR_IMAGE_SIZE, FIRST_PAGE, IMAGE_BASE_URL};

/// Wire record as served by the posts API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// Canonical display record. `id` is the unique, stable key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    pub body: String,
    pub is_liked: bool,
    pub avatar_url: String,
}

impl From<PostDto> for Post {
    fn from(dto: PostDto) -> Self {
        Self {
            user_id: dto.user_id,
            id: dto.id,
            title: dto.title,
            body: dto.body,
            is_liked: false,
            avatar_url: avatar_url(dto.user_id),
        }
    }
}

/// Deterministic per-user avatar location. Pure function of `user_id`;
/// never fetched from the API.
#[must_use]
pub fn avatar_url(user_id: i64) -> String {
    format!("{IMAGE_BASE_URL}/seed/{user_id}-{AVATAR_IMAGE_SIZE}")
}

/// Validated page coordinates: `page >= 1`, `limit > 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Option<Self> {
        if page < FIRST_PAGE || limit == 0 {
            return None;
        }
        Some(Self { page, limit })
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Zero-based row offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// Mutable pagination position for one post list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    page_size: u32,
    has_more: bool,
}

impl PageCursor {
    /// A zero page size is nonsensical; clamp to 1 rather than panic.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: FIRST_PAGE,
            page_size: page_size.max(1),
            has_more: true,
        }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn request(&self) -> PageRequest {
        // Both fields are kept valid by construction.
        PageRequest {
            page: self.page,
            limit: self.page_size,
        }
    }

    /// Speculatively move to the next page.
    pub fn advance(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    /// Undo a speculative advance; never retreats past the first page.
    pub fn retreat(&mut self) {
        self.page = self.page.saturating_sub(1).max(FIRST_PAGE);
    }

    /// Back to the first page with `has_more` re-armed. Only an explicit
    /// refresh-from-start re-arms `has_more`.
    pub fn reset(&mut self) {
        self.page = FIRST_PAGE;
        self.has_more = true;
    }

    pub fn set_has_more(&mut self, has_more: bool) {
        self.has_more = has_more;
    }
}

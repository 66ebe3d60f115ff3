use bytes::Bytes;
use moka::future::Cache;
use std::time::Duration;

const MAX_CACHED_PAGES: u64 = 1_000;

/// Rendered global-feed pages keyed by page number.
///
/// Entries expire after the configured TTL and are never invalidated by
/// writes, so a new post shows up on `/` once the TTL has elapsed or the
/// cache has been cleared.
#[derive(Clone)]
pub struct PageCache {
    pages: Option<Cache<i64, Bytes>>,
}

impl PageCache {
    pub fn new(ttl_seconds: u64) -> Self {
        let pages = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHED_PAGES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { pages }
    }

    pub async fn get(&self, page: i64) -> Option<Bytes> {
        match &self.pages {
            Some(pages) => pages.get(&page).await,
            None => None,
        }
    }

    pub async fn insert(&self, page: i64, body: Bytes) {
        if let Some(pages) = &self.pages {
            pages.insert(page, body).await;
        }
    }

    pub fn clear(&self) {
        if let Some(pages) = &self.pages {
            pages.invalidate_all();
        }
    }
}

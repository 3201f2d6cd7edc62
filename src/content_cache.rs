//! Read-through cache for the site-content table.
//!
//! Holds the last full listing together with the instant it was loaded.
//! Writers call [`ContentCache::invalidate`] after a successful update; the
//! next reader repopulates. Every invalidation bumps a generation counter; a
//! reader whose load straddled an invalidation returns what it read but does
//! not install it, so the next reader loads again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::db::models::SiteContentItem;
use crate::db::{Store, StoreError};

#[derive(Debug)]
struct Snapshot {
    items: Arc<Vec<SiteContentItem>>,
    loaded_at: Instant,
}

#[derive(Debug, Default)]
pub struct ContentCache {
    ttl: Option<Duration>,
    generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ContentCache {
    /// `ttl = None` keeps entries until the next invalidation.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        self.ttl
            .is_none_or(|ttl| snapshot.loaded_at.elapsed() < ttl)
    }

    pub async fn get_or_load(
        &self,
        store: &dyn Store,
    ) -> Result<Arc<Vec<SiteContentItem>>, StoreError> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            if self.is_fresh(snapshot) {
                return Ok(Arc::clone(&snapshot.items));
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let items = Arc::new(store.list_content().await?);

        let mut snapshot = self.snapshot.write().await;
        if self.generation.load(Ordering::Acquire) == generation {
            *snapshot = Some(Snapshot {
                items: Arc::clone(&items),
                loaded_at: Instant::now(),
            });
            tracing::debug!(items = items.len(), "site content cache loaded");
        } else {
            tracing::debug!("site content changed during load; not caching");
        }
        Ok(items)
    }

    pub async fn invalidate(&self) {
        let mut snapshot = self.snapshot.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        snapshot.take();
        tracing::debug!("site content cache invalidated");
    }
}

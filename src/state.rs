use std::sync::Arc;

use crate::config::AppConfig;
use crate::content_cache::ContentCache;
use crate::db::Store;

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub content_cache: Arc<ContentCache>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let content_cache = Arc::new(ContentCache::new(config.content_cache_ttl));
        Self {
            store,
            config: Arc::new(config),
            content_cache,
        }
    }
}

//! Mock asset source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::media::{AssetSource, FetchError, MediaPool};

/// Mock implementation of the AssetSource trait.
///
/// Returns a configurable pool and counts loads.
#[derive(Debug)]
pub struct MockAssetSource {
    pool: Arc<RwLock<MediaPool>>,
    /// If set, the next load fails with this error.
    next_error: Arc<RwLock<Option<FetchError>>>,
    loads: Arc<RwLock<u32>>,
}

impl Default for MockAssetSource {
    fn default() -> Self {
        Self::new(MediaPool::default())
    }
}

impl MockAssetSource {
    /// Create a mock source returning `pool`.
    pub fn new(pool: MediaPool) -> Self {
        Self {
            pool: Arc::new(RwLock::new(pool)),
            next_error: Arc::new(RwLock::new(None)),
            loads: Arc::new(RwLock::new(0)),
        }
    }

    /// Replace the pool returned by subsequent loads.
    pub async fn set_pool(&self, pool: MediaPool) {
        *self.pool.write().await = pool;
    }

    /// Make the next load fail.
    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of loads performed.
    pub async fn load_count(&self) -> u32 {
        *self.loads.read().await
    }
}

#[async_trait]
impl AssetSource for MockAssetSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_pool(&self) -> Result<MediaPool, FetchError> {
        *self.loads.write().await += 1;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.pool.read().await.clone())
    }
}

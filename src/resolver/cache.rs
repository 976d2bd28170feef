//! Time-bounded cache of the admin index.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{AdminIndex, LocationResolver};
use crate::error::Result;
use crate::georef::{fetch_admin_dataset, AdminSource};

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    built_at: DateTime<Utc>,
    index: Arc<AdminIndex>,
}

/// Process-wide cache holding the latest [`AdminIndex`].
///
/// A rebuild swaps in a fresh `Arc`; callers holding the previous one keep
/// using it. Callers that need a rebuild wait for the single one in flight,
/// while reads of a still-fresh entry never wait on the fetch. A failed
/// rebuild leaves the previous index in place.
pub struct AdminIndexCache {
    source: Arc<dyn AdminSource>,
    page_size: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<CacheEntry>>,
    /// Held for the whole fetch; `entry` is only write-locked to publish.
    build_lock: Mutex<()>,
}

impl AdminIndexCache {
    pub fn new(source: Arc<dyn AdminSource>, page_size: usize, ttl: Duration) -> Self {
        Self::with_clock(source, page_size, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn AdminSource>,
        page_size: usize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            page_size,
            ttl,
            clock,
            entry: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Current index, rebuilding it when missing or older than the TTL at `now`.
    pub async fn get_or_build(&self, now: DateTime<Utc>) -> Result<Arc<AdminIndex>> {
        if let Some(index) = self.fresh(now).await {
            return Ok(index);
        }

        let _building = self.build_lock.lock().await;
        // Another caller may have rebuilt while we waited
        if let Some(index) = self.fresh(now).await {
            return Ok(index);
        }

        match self.built_at().await {
            Some(built_at) => info!("Admin index expired (built {}), rebuilding", built_at),
            None => info!("Building admin index"),
        }

        let dataset = match fetch_admin_dataset(self.source.as_ref(), self.page_size).await {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("Admin dataset refresh failed: {}", e);
                return Err(e);
            }
        };

        let index = Arc::new(AdminIndex::from_dataset(&dataset));
        *self.entry.write().await = Some(CacheEntry {
            built_at: now,
            index: Arc::clone(&index),
        });
        Ok(index)
    }

    async fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<AdminIndex>> {
        let entry = self.entry.read().await;
        let current = entry.as_ref().filter(|e| now - e.built_at <= self.ttl)?;
        debug!("Admin index cache hit (built {})", current.built_at);
        Some(Arc::clone(&current.index))
    }

    /// Current index according to the cache's clock
    pub async fn get(&self) -> Result<Arc<AdminIndex>> {
        self.get_or_build(self.clock.now()).await
    }

    /// Resolver over the current index
    pub async fn resolver(&self) -> Result<LocationResolver> {
        Ok(LocationResolver::new(self.get().await?))
    }

    /// When the cached index was built, if there is one
    pub async fn built_at(&self) -> Option<DateTime<Utc>> {
        self.entry.read().await.as_ref().map(|e| e.built_at)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop the cached index so the next call rebuilds it.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

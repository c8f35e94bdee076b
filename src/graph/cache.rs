//! Single-slot snapshot cache
//!
//! Holds at most one [`GraphSnapshot`]. A snapshot is served while
//! `now < captured_at + ttl`; after that the next `get()` regenerates it.
//! Concurrent callers that find the slot empty or expired share one
//! regeneration instead of each calling the source.

use super::model::GraphSnapshot;
use super::source::{GraphSource, SourceError};
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Source of "now" for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

type SnapshotResult = Result<Arc<GraphSnapshot>, SourceError>;
type Regeneration = Shared<BoxFuture<'static, SnapshotResult>>;

struct InFlight {
    generation: u64,
    handle: Regeneration,
}

struct CacheInner {
    /// `None` when the lifetime does not fit a `TimeDelta`; never expires
    ttl: Option<TimeDelta>,
    source: Arc<dyn GraphSource>,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<Arc<GraphSnapshot>>>,
    in_flight: Mutex<Option<InFlight>>,
    generations: AtomicU64,
}

impl CacheInner {
    fn is_fresh(&self, snapshot: &GraphSnapshot) -> bool {
        match self.ttl {
            Some(ttl) => match snapshot.captured_at.checked_add_signed(ttl) {
                Some(expires_at) => self.clock.now() < expires_at,
                None => true,
            },
            None => true,
        }
    }

    async fn fresh(&self) -> Option<Arc<GraphSnapshot>> {
        let slot = self.slot.read().await;
        slot.as_ref().filter(|s| self.is_fresh(s)).cloned()
    }

    async fn clear_in_flight(&self, generation: u64) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|f| f.generation == generation) {
            *in_flight = None;
        }
    }

    /// Spawn a regeneration and return the handle waiters attach to.
    ///
    /// Must be called with `in_flight` locked and empty.
    fn start(self: &Arc<Self>, generation: u64) -> Regeneration {
        info!(generation, "Regenerating schema graph");

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let result = inner.source.generate().await.map(Arc::new);

            match &result {
                Ok(snapshot) => {
                    *inner.slot.write().await = Some(Arc::clone(snapshot));
                    info!(
                        generation,
                        objects = snapshot.len(),
                        checksum = %snapshot.checksum,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Schema graph cached"
                    );
                }
                Err(e) => warn!(generation, "Schema graph regeneration failed: {}", e),
            }

            inner.clear_in_flight(generation).await;
            result
        });

        let inner = Arc::clone(self);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(generation, "Schema graph regeneration aborted: {}", e);
                    inner.clear_in_flight(generation).await;
                    Err(SourceError::Unavailable(format!(
                        "graph regeneration aborted: {}",
                        e
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Time-bounded cache of the latest schema graph
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, source: Arc<dyn GraphSource>) -> Self {
        Self::with_clock(ttl, source, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, source: Arc<dyn GraphSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl: TimeDelta::from_std(ttl).ok(),
                source,
                clock,
                slot: RwLock::new(None),
                in_flight: Mutex::new(None),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Current snapshot, regenerating it if the slot is empty or expired.
    ///
    /// Errors from the source are returned as-is and are not cached.
    pub async fn get(&self) -> Result<Arc<GraphSnapshot>, SourceError> {
        if let Some(snapshot) = self.inner.fresh().await {
            debug!("Schema graph cache hit ({})", snapshot.id);
            return Ok(snapshot);
        }

        let regeneration = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // Another caller may have refreshed the slot while we waited
            if let Some(snapshot) = self.inner.fresh().await {
                return Ok(snapshot);
            }

            match in_flight.as_ref() {
                Some(running) => {
                    debug!(generation = running.generation, "Joining in-flight regeneration");
                    running.handle.clone()
                }
                None => {
                    let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
                    let handle = self.inner.start(generation);
                    *in_flight = Some(InFlight {
                        generation,
                        handle: handle.clone(),
                    });
                    handle
                }
            }
        };

        regeneration.await
    }

    /// Drop the cached snapshot; the next `get()` regenerates
    pub async fn invalidate(&self) {
        if self.inner.slot.write().await.take().is_some() {
            info!("Schema graph cache invalidated");
        }
    }

    /// Number of regenerations started so far
    #[cfg(test)]
    pub fn generations(&self) -> u64 {
        self.inner.generations.load(Ordering::Relaxed)
    }

    /// Snapshot lifetime; `None` never expires
    pub fn ttl(&self) -> Option<TimeDelta> {
        self.inner.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{ManualClock, StaticSource};
    use futures::future::join_all;
    use tokio_test::{assert_err, assert_ok};

    const TTL: Duration = Duration::from_secs(10 * 60);

    fn cache_with(source: &Arc<StaticSource>, clock: &Arc<ManualClock>, ttl: Duration) -> SnapshotCache {
        SnapshotCache::with_clock(ttl, source.clone(), clock.clone())
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_reused() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let cache = cache_with(&source, &clock, TTL);

        let first = assert_ok!(cache.get().await);
        clock.advance(TimeDelta::minutes(9));
        let second = assert_ok!(cache.get().await);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_snapshot_regenerates_once() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let cache = cache_with(&source, &clock, TTL);

        let first = assert_ok!(cache.get().await);
        clock.advance(TimeDelta::minutes(10));
        let second = assert_ok!(cache.get().await);
        let third = assert_ok!(cache.get().await);

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.generations(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_serves_from_cache() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let cache = cache_with(&source, &clock, Duration::ZERO);

        assert_ok!(cache.get().await);
        assert_ok!(cache.get().await);

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_generation() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()).with_delay(Duration::from_millis(20)));
        let cache = cache_with(&source, &clock, TTL);

        let results = join_all((0..16).map(|_| cache.get())).await;

        assert_eq!(source.calls(), 1);
        let first = assert_ok!(results[0].clone());
        for result in results {
            assert!(Arc::ptr_eq(&first, &assert_ok!(result)));
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failure() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()).with_delay(Duration::from_millis(20)));
        source.fail_with("connection refused");
        let cache = cache_with(&source, &clock, TTL);

        let results = join_all((0..8).map(|_| cache.get())).await;

        assert_eq!(source.calls(), 1);
        for result in results {
            assert_eq!(
                assert_err!(result),
                SourceError::IntrospectionFailed("connection refused".to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        source.fail_with("timeout");
        let cache = cache_with(&source, &clock, TTL);

        assert_err!(cache.get().await);
        source.recover();
        assert_ok!(cache.get().await);

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_nothing_stale() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let cache = cache_with(&source, &clock, TTL);

        assert_ok!(cache.get().await);
        clock.advance(TimeDelta::minutes(11));
        source.fail_with("gone");

        assert_err!(cache.get().await);
        assert_err!(cache.get().await);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_panicking_source_reports_unavailable_and_retries() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        source.panic_next();
        let cache = cache_with(&source, &clock, TTL);

        let err = assert_err!(cache.get().await);
        assert!(matches!(err, SourceError::Unavailable(_)));

        assert_ok!(cache.get().await);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel_regeneration() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()).with_delay(Duration::from_millis(30)));
        let cache = cache_with(&source, &clock, TTL);

        let abandoned = tokio::time::timeout(Duration::from_millis(1), cache.get()).await;
        assert!(abandoned.is_err());

        assert_ok!(cache.get().await);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_regeneration() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(StaticSource::new(clock.clone()));
        let cache = cache_with(&source, &clock, TTL);

        let first = assert_ok!(cache.get().await);
        cache.invalidate().await;
        let second = assert_ok!(cache.get().await);

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 2);
    }
}

//! Core async pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::factory::AsyncFactory;
use crate::lease::{Lease, ReleaseFn};
use crate::metrics::{Gauges, MetricsExporter, MetricsTracker, PoolMetrics};

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// What a queued rent call is resolved with
enum Grant<T> {
    /// A released resource, already counted as leased
    Resource(T),
    /// A capacity slot given back after a failed construction; the waiter builds its own resource
    Slot,
}

struct Waiter<T> {
    id: u64,
    sender: oneshot::Sender<Grant<T>>,
}

struct PoolState<T> {
    idle: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
    capacity_remaining: usize,
    leased: usize,
    /// Bumped by `clear`; leases and waiters from an older generation no longer count.
    generation: u64,
    next_waiter_id: u64,
}

struct Shared<T> {
    state: Mutex<PoolState<T>>,
    config: PoolConfiguration,
    metrics: MetricsTracker,
}

impl<T> Shared<T> {
    /// Offer a grant to the oldest waiter still listening. Returns it if nobody took it.
    fn hand_to_waiter(waiters: &mut VecDeque<Waiter<T>>, mut grant: Grant<T>) -> Option<Grant<T>> {
        while let Some(Waiter { id, sender }) = waiters.pop_front() {
            match sender.send(grant) {
                Ok(()) => {
                    tracing::trace!(waiter = id, "resolved queued rent");
                    return None;
                }
                // receiver is gone: the waiter was cancelled but not yet removed
                Err(returned) => grant = returned,
            }
        }
        Some(grant)
    }

    fn release(&self, value: T, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            drop(state);
            MetricsTracker::bump(&self.metrics.stale_discards);
            tracing::warn!(generation, "dropping resource leased before the pool was cleared");
            drop(value);
            return;
        }

        MetricsTracker::bump(&self.metrics.total_released);
        if let Some(Grant::Resource(value)) =
            Self::hand_to_waiter(&mut state.waiters, Grant::Resource(value))
        {
            state.leased = state.leased.saturating_sub(1);
            state.idle.push_back(value);
            tracing::trace!(idle = state.idle.len(), "resource returned to idle set");
        }
    }

    /// Give an unused capacity slot to the next waiter, or back to the pool.
    fn return_slot(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        if Self::hand_to_waiter(&mut state.waiters, Grant::Slot).is_some() {
            state.leased = state.leased.saturating_sub(1);
            state.capacity_remaining += 1;
        }
    }

    fn abandon_construction(&self, generation: u64) {
        if self.config.restore_capacity_on_failure {
            self.return_slot(generation);
            return;
        }

        let mut state = self.state.lock();
        if state.generation == generation {
            state.leased = state.leased.saturating_sub(1);
            tracing::warn!(
                capacity_remaining = state.capacity_remaining,
                "construction slot lost until the pool is cleared"
            );
        }
    }

    fn remove_waiter(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        match state.waiters.iter().position(|waiter| waiter.id == id) {
            Some(index) => {
                state.waiters.remove(index);
                true
            }
            None => false,
        }
    }
}

/// A rent call parked in the waiter queue.
///
/// Dropping it before it settles removes it from the queue; if a grant had
/// already been sent to it, the grant is passed back so nothing leaks.
struct PendingWaiter<T> {
    shared: Arc<Shared<T>>,
    id: u64,
    generation: u64,
    receiver: oneshot::Receiver<Grant<T>>,
    settled: bool,
}

impl<T> PendingWaiter<T> {
    async fn resolve(&mut self, cancel: &CancellationToken) -> PoolResult<Grant<T>> {
        let outcome = tokio::select! {
            biased;
            outcome = &mut self.receiver => outcome,
            () = cancel.cancelled() => {
                if self.shared.remove_waiter(self.id) {
                    self.settled = true;
                    MetricsTracker::bump(&self.shared.metrics.cancelled_waits);
                    return Err(PoolError::Cancelled);
                }
                // a release or clear already resolved this waiter; that outcome wins
                (&mut self.receiver).await
            }
        };

        self.settled = true;
        outcome.map_err(|_| {
            MetricsTracker::bump(&self.shared.metrics.cancelled_waits);
            PoolError::Cancelled
        })
    }
}

impl<T> Drop for PendingWaiter<T> {
    fn drop(&mut self) {
        if self.settled || self.shared.remove_waiter(self.id) {
            return;
        }
        match self.receiver.try_recv() {
            Ok(Grant::Resource(value)) => self.shared.release(value, self.generation),
            Ok(Grant::Slot) => self.shared.return_slot(self.generation),
            Err(_) => {}
        }
    }
}

/// Undoes the capacity accounting of a construction that never produced a resource
struct ConstructionSlot<'a, T> {
    shared: &'a Shared<T>,
    generation: u64,
    armed: bool,
}

impl<T> Drop for ConstructionSlot<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.abandon_construction(self.generation);
        }
    }
}

enum Admission<T> {
    Idle(T, u64),
    Construct(u64),
    Queued(PendingWaiter<T>),
}

/// Bounded async pool that builds resources lazily and queues renters once exhausted.
///
/// Cloning the pool is cheap; clones share the same resources and queue.
pub struct AsyncPool<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    shared: Arc<Shared<T>>,
    factory: Arc<dyn AsyncFactory<T, S>>,
}

impl<T, S> Clone for AsyncPool<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T, S> fmt::Debug for AsyncPool<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPool")
            .field("config", &self.shared.config)
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl<T, S> AsyncPool<T, S>
where
    T: Send + 'static,
    S: Send + 'static,
{
    /// Create a pool that builds resources with `factory`.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidCapacity`] if `config.max_pool_size` is zero.
    pub fn new<F>(config: PoolConfiguration, factory: F) -> PoolResult<Self>
    where
        F: AsyncFactory<T, S> + 'static,
    {
        config.validate()?;

        tracing::debug!(
            capacity = config.max_pool_size,
            restore_capacity_on_failure = config.restore_capacity_on_failure,
            "created async pool"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    waiters: VecDeque::new(),
                    capacity_remaining: config.max_pool_size,
                    leased: 0,
                    generation: 0,
                    next_waiter_id: 0,
                }),
                config,
                metrics: MetricsTracker::default(),
            }),
            factory: Arc::new(factory),
        })
    }

    /// Create a pool with the given capacity and default settings otherwise
    pub fn with_capacity<F>(capacity: usize, factory: F) -> PoolResult<Self>
    where
        F: AsyncFactory<T, S> + 'static,
    {
        Self::new(PoolConfiguration::new().with_max_pool_size(capacity), factory)
    }

    /// Lease a resource.
    ///
    /// Hands out an idle resource if there is one, otherwise builds a new one
    /// from `state` while capacity remains, otherwise waits in FIFO order for
    /// a release. `state` is only used when this call ends up constructing.
    ///
    /// # Errors
    /// - [`PoolError::Cancelled`] if `cancel` fires before a resource is
    ///   obtained, or the pool is cleared while this call is queued
    /// - [`PoolError::Factory`] if construction fails
    /// - [`PoolError::Timeout`] if the configured wait timeout expires
    pub async fn rent(&self, state: S, cancel: &CancellationToken) -> PoolResult<Lease<T>> {
        match self.admit() {
            Admission::Idle(value, generation) => {
                tracing::trace!("leasing idle resource");
                Ok(self.make_lease(value, generation))
            }
            Admission::Construct(generation) => self.construct(state, cancel, generation).await,
            Admission::Queued(mut waiter) => {
                tracing::trace!(waiter = waiter.id, "pool exhausted, queueing rent");
                let grant = match self.shared.config.operation_timeout {
                    Some(timeout) => {
                        match tokio::time::timeout(timeout, waiter.resolve(cancel)).await {
                            Ok(grant) => grant?,
                            Err(_) => {
                                MetricsTracker::bump(&self.shared.metrics.timeouts);
                                return Err(PoolError::Timeout(timeout));
                            }
                        }
                    }
                    None => waiter.resolve(cancel).await?,
                };

                match grant {
                    Grant::Resource(value) => Ok(self.make_lease(value, waiter.generation)),
                    Grant::Slot => self.construct(state, cancel, waiter.generation).await,
                }
            }
        }
    }

    /// Cancel all queued rents, drop idle resources and restore full capacity.
    ///
    /// Leases still outstanding are dropped when released instead of
    /// rejoining the pool.
    pub fn clear(&self) {
        let (idle, cancelled) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.capacity_remaining = self.shared.config.max_pool_size;
            state.leased = 0;
            let cancelled = state.waiters.len();
            // dropping a sender resolves its waiter as cancelled
            state.waiters.clear();
            (std::mem::take(&mut state.idle), cancelled)
        };

        MetricsTracker::bump(&self.shared.metrics.clears);
        tracing::debug!(idle = idle.len(), cancelled, "cleared pool");
        drop(idle);
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.shared.config.max_pool_size
    }

    /// Resources that may still be constructed
    pub fn capacity_remaining(&self) -> usize {
        self.shared.state.lock().capacity_remaining
    }

    /// Resources sitting idle in the pool
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Rent calls waiting for a release
    pub fn queue_size(&self) -> usize {
        self.shared.state.lock().waiters.len()
    }

    /// Resources currently leased, including ones under construction
    pub fn leased_count(&self) -> usize {
        self.shared.state.lock().leased
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let gauges = {
            let state = self.shared.state.lock();
            Gauges {
                idle: state.idle.len(),
                leased: state.leased,
                waiters: state.waiters.len(),
                capacity_remaining: state.capacity_remaining,
                max_capacity: self.shared.config.max_pool_size,
            }
        };
        self.shared.metrics.get_metrics(gauges)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    fn admit(&self) -> Admission<T> {
        let mut state = self.shared.state.lock();
        let generation = state.generation;

        if let Some(value) = state.idle.pop_front() {
            state.leased += 1;
            return Admission::Idle(value, generation);
        }

        if state.capacity_remaining > 0 {
            state.capacity_remaining -= 1;
            state.leased += 1;
            return Admission::Construct(generation);
        }

        let (sender, receiver) = oneshot::channel();
        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        state.waiters.push_back(Waiter { id, sender });

        Admission::Queued(PendingWaiter {
            shared: Arc::clone(&self.shared),
            id,
            generation,
            receiver,
            settled: false,
        })
    }

    async fn construct(
        &self,
        state: S,
        cancel: &CancellationToken,
        generation: u64,
    ) -> PoolResult<Lease<T>> {
        let mut slot = ConstructionSlot {
            shared: &self.shared,
            generation,
            armed: true,
        };

        tracing::debug!(generation, "constructing pooled resource");
        match self.factory.create(state, cancel.clone()).await {
            Ok(value) => {
                slot.armed = false;
                MetricsTracker::bump(&self.shared.metrics.total_created);
                Ok(self.make_lease(value, generation))
            }
            Err(err) => {
                drop(slot);
                MetricsTracker::bump(&self.shared.metrics.factory_failures);
                if cancel.is_cancelled() {
                    tracing::debug!(error = %err, "construction abandoned after cancellation");
                    return Err(PoolError::Cancelled);
                }
                tracing::warn!(error = %err, "resource factory failed");
                Err(PoolError::factory(err))
            }
        }
    }

    fn make_lease(&self, value: T, generation: u64) -> Lease<T> {
        MetricsTracker::bump(&self.shared.metrics.total_rented);
        let shared = Arc::clone(&self.shared);
        let release_fn: ReleaseFn<T> = Arc::new(move |value| shared.release(value, generation));
        Lease::new(value, release_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BoxError;
    use crate::factory::FactoryResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Builds `state + 1`; negative states fail once `gate` is notified.
    struct TestFactory {
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl AsyncFactory<i32, i32> for TestFactory {
        async fn create(&self, state: i32, _cancel: CancellationToken) -> FactoryResult<i32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if state < 0 {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                return Err::<i32, BoxError>("negative state".into());
            }
            Ok(state + 1)
        }
    }

    fn pool_with(config: PoolConfiguration) -> (AsyncPool<i32, i32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = TestFactory {
            calls: Arc::clone(&calls),
            gate: None,
        };
        (AsyncPool::new(config, factory).unwrap(), calls)
    }

    fn pool_of(capacity: usize) -> (AsyncPool<i32, i32>, Arc<AtomicUsize>) {
        pool_with(PoolConfiguration::new().with_max_pool_size(capacity))
    }

    async fn until(mut condition: impl FnMut() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    fn assert_accounting(pool: &AsyncPool<i32, i32>) {
        assert_eq!(
            pool.capacity_remaining() + pool.idle_count() + pool.leased_count(),
            pool.capacity()
        );
    }

    #[tokio::test]
    async fn test_rent_uses_factory() {
        let (pool, calls) = pool_of(1);

        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

        assert_eq!(*lease, 2);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_release_returns_to_idle() {
        let (pool, _) = pool_of(1);

        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
        lease.release();

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.leased_count(), 0);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_reuses_idle_resource() {
        let (pool, calls) = pool_of(1);
        let cancel = CancellationToken::new();

        drop(pool.rent(1, &cancel).await.unwrap());
        let lease = pool.rent(99, &cancel).await.unwrap();

        assert_eq!(*lease, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waits_for_release() {
        let (pool, calls) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.rent(99, &CancellationToken::new()).await.map(|l| *l) })
        };
        until(|| pool.queue_size() == 1).await;
        assert_eq!(pool.idle_count(), 0);

        drop(lease);
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.idle_count(), 0);

        assert_eq!(waiting.await.unwrap().unwrap(), 2);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_waiters_served_in_order() {
        let (pool, _) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
        let served = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for index in 0..3 {
            let pool_clone = pool.clone();
            let served = Arc::clone(&served);
            tasks.push(tokio::spawn(async move {
                let lease = pool_clone.rent(0, &CancellationToken::new()).await.unwrap();
                served.lock().push(index);
                drop(lease);
            }));
            until(|| pool.queue_size() == index + 1).await;
        }

        drop(lease);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*served.lock(), vec![0, 1, 2]);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_queued_rent() {
        let (pool, _) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
        let cancel = CancellationToken::new();

        let waiting = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.rent(99, &cancel).await.map(|l| *l) })
        };
        until(|| pool.queue_size() == 1).await;

        cancel.cancel();
        assert!(matches!(waiting.await.unwrap(), Err(PoolError::Cancelled)));
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.metrics().cancelled_waits, 1);

        drop(lease);
        assert_eq!(pool.idle_count(), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_cancel_after_resolution_keeps_resource() {
        let (pool, _) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
        let cancel = CancellationToken::new();

        let waiting = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.rent(99, &cancel).await.map(|l| *l) })
        };
        until(|| pool.queue_size() == 1).await;

        drop(lease);
        cancel.cancel();

        assert_eq!(waiting.await.unwrap().unwrap(), 2);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.metrics().cancelled_waits, 0);
    }

    #[tokio::test]
    async fn test_clear_cancels_waiters() {
        let (pool, _) = pool_of(2);
        let cancel = CancellationToken::new();
        let _first = pool.rent(1, &cancel).await.unwrap();
        let _second = pool.rent(99, &cancel).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move {
                pool.rent(99, &CancellationToken::new()).await.map(|l| *l)
            }));
        }
        until(|| pool.queue_size() == 2).await;
        assert_eq!(pool.idle_count(), 0);

        pool.clear();

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.capacity_remaining(), 2);
        for task in tasks {
            assert!(matches!(task.await.unwrap(), Err(PoolError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn test_rent_after_clear_constructs_again() {
        let (pool, calls) = pool_of(2);
        let cancel = CancellationToken::new();
        let _first = pool.rent(1, &cancel).await.unwrap();
        let _second = pool.rent(99, &cancel).await.unwrap();

        pool.clear();

        let a = pool.rent(33, &cancel).await.unwrap();
        let b = pool.rent(40, &cancel).await.unwrap();
        assert_eq!((*a, *b), (34, 41));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_stale_lease_is_dropped_after_clear() {
        let (pool, _) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

        pool.clear();
        drop(lease);

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.capacity_remaining(), 1);
        assert_eq!(pool.metrics().stale_discards, 1);
        assert_accounting(&pool);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = TestFactory { calls, gate: None };
        let result: PoolResult<AsyncPool<i32, i32>> = AsyncPool::with_capacity(0, factory);
        assert!(matches!(result, Err(PoolError::InvalidCapacity(0))));
    }

    #[tokio::test]
    async fn test_factory_failure_consumes_slot_by_default() {
        let (pool, calls) = pool_of(1);

        let result = pool.rent(-1, &CancellationToken::new()).await;

        assert!(matches!(result, Err(PoolError::Factory(_))));
        assert_eq!(pool.capacity_remaining(), 0);
        assert_eq!(pool.leased_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pool.metrics().factory_failures, 1);
    }

    #[tokio::test]
    async fn test_factory_failure_restores_slot_when_configured() {
        let (pool, _) = pool_with(
            PoolConfiguration::new()
                .with_max_pool_size(1)
                .with_restore_capacity_on_failure(true),
        );
        let cancel = CancellationToken::new();

        assert!(pool.rent(-1, &cancel).await.is_err());
        assert_eq!(pool.capacity_remaining(), 1);

        let lease = pool.rent(1, &cancel).await.unwrap();
        assert_eq!(*lease, 2);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_restored_slot_goes_to_waiter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let factory = TestFactory {
            calls: Arc::clone(&calls),
            gate: Some(Arc::clone(&gate)),
        };
        let config = PoolConfiguration::new()
            .with_max_pool_size(1)
            .with_restore_capacity_on_failure(true);
        let pool = AsyncPool::new(config, factory).unwrap();

        let failing = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.rent(-1, &CancellationToken::new()).await.map(|l| *l) })
        };
        until(|| calls.load(Ordering::SeqCst) == 1).await;

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.rent(5, &CancellationToken::new()).await.map(|l| *l) })
        };
        until(|| pool.queue_size() == 1).await;

        gate.notify_one();
        assert!(matches!(failing.await.unwrap(), Err(PoolError::Factory(_))));
        assert_eq!(waiting.await.unwrap().unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_wait_timeout_removes_waiter() {
        let (pool, _) = pool_with(
            PoolConfiguration::new()
                .with_max_pool_size(1)
                .with_timeout(Duration::from_millis(20)),
        );
        let cancel = CancellationToken::new();
        let _lease = pool.rent(1, &cancel).await.unwrap();

        let result = pool.rent(2, &cancel).await;

        assert!(matches!(result, Err(PoolError::Timeout(_))));
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.metrics().timeouts, 1);
    }

    #[tokio::test]
    async fn test_dropped_rent_future_leaves_no_waiter() {
        let (pool, _) = pool_of(1);
        let cancel = CancellationToken::new();
        let lease = pool.rent(1, &cancel).await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), pool.rent(2, &cancel)).await;
        assert!(abandoned.is_err());
        assert_eq!(pool.queue_size(), 0);

        drop(lease);
        assert_eq!(pool.idle_count(), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_sequential_round_trips_stay_bounded() {
        let (pool, calls) = pool_of(3);
        let cancel = CancellationToken::new();

        for round in 0..5 {
            let mut leases = Vec::new();
            for state in 0..3 {
                leases.push(pool.rent(round * 10 + state, &cancel).await.unwrap());
            }
            drop(leases);
            assert!(pool.idle_count() <= 3);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pool.idle_count(), 3);
        assert_eq!(pool.metrics().total_rented, 15);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_aborted_waiter_hands_back_delivered_resource() {
        let (pool, _) = pool_of(1);
        let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.rent(99, &CancellationToken::new()).await.map(|l| *l) })
        };
        until(|| pool.queue_size() == 1).await;

        drop(lease);
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.idle_count(), 0);

        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.leased_count(), 0);
        assert_eq!(pool.capacity_remaining(), 0);
        assert_accounting(&pool);
    }

    #[test]
    fn test_dropped_waiter_hands_back_delivered_slot() {
        let (pool, _) = pool_with(
            PoolConfiguration::new()
                .with_max_pool_size(1)
                .with_restore_capacity_on_failure(true),
        );

        let Admission::Construct(generation) = pool.admit() else {
            panic!("first admission should construct");
        };
        let Admission::Queued(waiter) = pool.admit() else {
            panic!("second admission should queue");
        };
        assert_eq!(pool.queue_size(), 1);

        pool.shared.abandon_construction(generation);
        assert_eq!(pool.queue_size(), 0);
        assert_eq!(pool.leased_count(), 1);
        assert_eq!(pool.capacity_remaining(), 0);

        drop(waiter);
        assert_eq!(pool.leased_count(), 0);
        assert_eq!(pool.capacity_remaining(), 1);
        assert_accounting(&pool);
    }

    #[tokio::test]
    async fn test_clear_discards_idle_resources() {
        let (pool, calls) = pool_of(2);
        let cancel = CancellationToken::new();

        let first = pool.rent(1, &cancel).await.unwrap();
        let second = pool.rent(2, &cancel).await.unwrap();
        drop((first, second));
        assert_eq!(pool.idle_count(), 2);

        pool.clear();

        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.capacity_remaining(), 2);
        assert_accounting(&pool);

        let a = pool.rent(10, &cancel).await.unwrap();
        let b = pool.rent(20, &cancel).await.unwrap();
        assert_eq!((*a, *b), (11, 21));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_idle_resources_served_oldest_first() {
        let (pool, calls) = pool_of(2);
        let cancel = CancellationToken::new();

        let first = pool.rent(1, &cancel).await.unwrap();
        let second = pool.rent(5, &cancel).await.unwrap();
        first.release();
        second.release();

        let a = pool.rent(0, &cancel).await.unwrap();
        let b = pool.rent(0, &cancel).await.unwrap();
        assert_eq!((*a, *b), (2, 6));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

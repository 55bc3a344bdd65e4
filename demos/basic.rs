//! Basic usage examples for AsyncPool

use esox_asyncpool::{AsyncPool, BoxError, FnFactory, PoolConfiguration};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.AsyncPool - Basic Examples ===\n");

    // Example 1: Lazy construction and reuse
    lazy_construction().await;

    // Example 2: Explicit release
    explicit_release().await;

    // Example 3: Invalid configuration
    invalid_configuration();

    // Example 4: Metrics
    metrics().await;
}

fn doubling_pool(capacity: usize) -> AsyncPool<u32, u32> {
    let factory = FnFactory::new(|state: u32, _cancel: CancellationToken| async move {
        println!("   Constructing resource from state {}", state);
        Ok::<_, BoxError>(state * 2)
    });
    AsyncPool::new(PoolConfiguration::new().with_max_pool_size(capacity), factory).unwrap()
}

async fn lazy_construction() {
    println!("1. Lazy Construction:");
    let pool = doubling_pool(1);
    let cancel = CancellationToken::new();

    {
        let lease = pool.rent(21, &cancel).await.unwrap();
        println!("   Got resource: {}", *lease);
        // Resource automatically returned when dropped
    }

    let lease = pool.rent(99, &cancel).await.unwrap();
    println!("   Reused resource: {} (factory not called again)\n", *lease);
}

async fn explicit_release() {
    println!("2. Explicit Release:");
    let pool = doubling_pool(2);

    let lease = pool.rent(5, &CancellationToken::new()).await.unwrap();
    println!("   Leased: {}, idle: {}", pool.leased_count(), pool.idle_count());
    lease.release();
    println!("   Leased: {}, idle: {}\n", pool.leased_count(), pool.idle_count());
}

fn invalid_configuration() {
    println!("3. Invalid Configuration:");
    match PoolConfiguration::new().try_with_capacity(-3) {
        Ok(_) => println!("   Accepted"),
        Err(e) => println!("   Error: {}\n", e),
    }
}

async fn metrics() {
    println!("4. Metrics:");
    let pool = doubling_pool(3);
    let cancel = CancellationToken::new();

    let a = pool.rent(1, &cancel).await.unwrap();
    let _b = pool.rent(2, &cancel).await.unwrap();
    drop(a);

    let metrics = pool.metrics();
    println!("   Rented: {}", metrics.total_rented);
    println!("   Created: {}", metrics.total_created);
    println!("   Utilization: {:.1}%", metrics.utilization * 100.0);
}

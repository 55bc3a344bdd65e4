//! Async usage examples: waiting, cancellation, timeouts and clearing

use esox_asyncpool::{AsyncPool, BoxError, FnFactory, PoolConfiguration};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.AsyncPool - Async Examples ===\n");

    // Example 1: Waiting for a release
    wait_for_release().await;

    // Example 2: Cancelling a queued rent
    cancel_queued().await;

    // Example 3: Wait timeout
    wait_with_timeout().await;

    // Example 4: Clearing the pool
    clear_pool().await;

    // Example 5: Concurrent access
    concurrent_access().await;
}

fn pool_with(config: PoolConfiguration) -> AsyncPool<String, usize> {
    let factory = FnFactory::new(|id: usize, _cancel: CancellationToken| async move {
        sleep(Duration::from_millis(5)).await;
        Ok::<_, BoxError>(format!("worker-{}", id))
    });
    AsyncPool::new(config, factory).unwrap()
}

async fn wait_for_release() {
    println!("1. Wait for Release:");
    let pool = pool_with(PoolConfiguration::new().with_max_pool_size(1));
    let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

    let waiting = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let lease = pool.rent(2, &CancellationToken::new()).await.unwrap();
            println!("   Waiter got: {}", *lease);
        })
    };

    sleep(Duration::from_millis(20)).await;
    println!("   Queued rents: {}", pool.queue_size());
    drop(lease);
    waiting.await.unwrap();
    println!();
}

async fn cancel_queued() {
    println!("2. Cancel a Queued Rent:");
    let pool = pool_with(PoolConfiguration::new().with_max_pool_size(1));
    let _lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

    let cancel = CancellationToken::new();
    let waiting = {
        let pool = pool.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { pool.rent(2, &cancel).await.map(|_| ()) })
    };

    sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    match waiting.await.unwrap() {
        Ok(()) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }
    println!("   Queued rents: {}\n", pool.queue_size());
}

async fn wait_with_timeout() {
    println!("3. Wait Timeout:");
    let config = PoolConfiguration::new()
        .with_max_pool_size(1)
        .with_timeout(Duration::from_millis(100));
    let pool = pool_with(config);

    let _lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
    match pool.rent(2, &CancellationToken::new()).await {
        Ok(_) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }
    println!();
}

async fn clear_pool() {
    println!("4. Clear:");
    let pool = pool_with(PoolConfiguration::new().with_max_pool_size(1));
    let _lease = pool.rent(1, &CancellationToken::new()).await.unwrap();

    let waiting = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.rent(2, &CancellationToken::new()).await.map(|_| ()) })
    };
    sleep(Duration::from_millis(20)).await;

    pool.clear();
    println!("   Waiter outcome: {:?}", waiting.await.unwrap().err());
    println!("   Capacity remaining: {}\n", pool.capacity_remaining());
}

async fn concurrent_access() {
    println!("5. Concurrent Access:");
    let pool = pool_with(PoolConfiguration::new().with_max_pool_size(3));

    let mut handles = vec![];
    for i in 0..10 {
        let pool_clone = pool.clone();
        let handle = tokio::spawn(async move {
            let lease = pool_clone.rent(i, &CancellationToken::new()).await.unwrap();
            println!("   Task {} got {}", i, *lease);
            sleep(Duration::from_millis(20)).await;
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Constructed: {}", pool.metrics().total_created);
    println!("   Final idle: {}", pool.idle_count());
}

//! Advanced features: custom factories, failure handling, Prometheus export

use async_trait::async_trait;
use esox_asyncpool::{AsyncFactory, AsyncPool, FactoryResult, PoolConfiguration};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Connection {
    id: usize,
    endpoint: String,
}

/// Refuses every other connection attempt
struct FlakyConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl AsyncFactory<Connection, &'static str> for FlakyConnector {
    async fn create(
        &self,
        endpoint: &'static str,
        cancel: CancellationToken,
    ) -> FactoryResult<Connection> {
        if cancel.is_cancelled() {
            return Err("connect cancelled".into());
        }
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt % 2 == 1 {
            return Err(format!("connection refused by {}", endpoint).into());
        }
        Ok(Connection {
            id: attempt,
            endpoint: endpoint.to_string(),
        })
    }
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.AsyncPool - Advanced Features ===\n");

    // Example 1: Failures consume capacity by default
    failure_consumes_capacity().await;

    // Example 2: Restoring capacity on failure
    failure_restores_capacity().await;

    // Example 3: Prometheus metrics
    prometheus_export().await;
}

fn connector_pool(config: PoolConfiguration) -> AsyncPool<Connection, &'static str> {
    let factory = FlakyConnector {
        attempts: AtomicUsize::new(0),
    };
    AsyncPool::new(config, factory).unwrap()
}

async fn failure_consumes_capacity() {
    println!("1. Failure Consumes Capacity:");
    let pool = connector_pool(PoolConfiguration::new().with_max_pool_size(2));
    let cancel = CancellationToken::new();

    let first = pool.rent("db-primary", &cancel).await.unwrap();
    println!("   Connected: {:?}", *first);
    if let Err(e) = pool.rent("db-primary", &cancel).await {
        println!("   Error: {}", e);
    }
    println!("   Capacity remaining: {}\n", pool.capacity_remaining());
}

async fn failure_restores_capacity() {
    println!("2. Restore Capacity on Failure:");
    let config = PoolConfiguration::new()
        .with_max_pool_size(2)
        .with_restore_capacity_on_failure(true);
    let pool = connector_pool(config);
    let cancel = CancellationToken::new();

    let _first = pool.rent("db-replica", &cancel).await.unwrap();
    let _ = pool.rent("db-replica", &cancel).await;
    println!("   Capacity remaining: {}", pool.capacity_remaining());

    let retry = pool.rent("db-replica", &cancel).await.unwrap();
    println!("   Retry connected: #{} to {}\n", retry.id, retry.endpoint);
}

async fn prometheus_export() {
    println!("3. Prometheus Export:");
    let pool = connector_pool(PoolConfiguration::new().with_max_pool_size(4));
    let _lease = pool.rent("cache", &CancellationToken::new()).await.unwrap();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "api".to_string());
    tags.insert("environment".to_string(), "production".to_string());

    let output = pool.export_metrics_prometheus("connection_pool", Some(&tags));
    for line in output.lines().take(6) {
        println!("   {}", line);
    }
}

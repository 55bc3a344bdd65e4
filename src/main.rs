// EsoxSolutions.AsyncPool
// Bounded async object pool with cancellation-aware waiters

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use esox_asyncpool::{AsyncPool, BoxError, FnFactory, PoolConfiguration};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    println!("=== EsoxSolutions.AsyncPool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let factory = FnFactory::new(|id: u32, _cancel: CancellationToken| async move {
        Ok::<_, BoxError>(format!("connection-{id}"))
    });
    let pool = AsyncPool::new(PoolConfiguration::new().with_max_pool_size(2), factory)?;

    {
        let conn = pool.rent(1, &CancellationToken::new()).await?;
        println!("  Got resource: {}", *conn);
    }

    println!("  Idle after return: {}", pool.idle_count());
    Ok(())
}

//! # EsoxSolutions.AsyncPool
//!
//! Bounded, asynchronous object pool for expensive-to-create resources.
//!
//! ## Features
//!
//! - Lazy construction through an async factory, up to a fixed capacity
//! - FIFO queue of waiting renters once the pool is exhausted
//! - Cancellation of queued rents via `CancellationToken`
//! - Automatic return of resources via RAII (Drop trait)
//! - Explicit reset with [`AsyncPool::clear`]
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_asyncpool::{AsyncPool, BoxError, FnFactory, PoolConfiguration};
//! use tokio_util::sync::CancellationToken;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let factory = FnFactory::new(|host: &'static str, _cancel: CancellationToken| async move {
//!         Ok::<_, BoxError>(format!("session to {host}"))
//!     });
//!     let pool = AsyncPool::new(PoolConfiguration::new().with_max_pool_size(2), factory).unwrap();
//!
//!     {
//!         let session = pool.rent("db-1", &CancellationToken::new()).await.unwrap();
//!         println!("Got: {}", *session);
//!         // Session automatically returned when it goes out of scope
//!     }
//!
//!     assert_eq!(pool.idle_count(), 1);
//! });
//! ```

mod pool;
mod config;
mod factory;
mod lease;
mod metrics;
mod errors;

pub use pool::AsyncPool;
pub use config::PoolConfiguration;
pub use factory::{AsyncFactory, FactoryResult, FnFactory};
pub use lease::Lease;
pub use metrics::{PoolMetrics, MetricsExporter};
pub use errors::{BoxError, PoolError, PoolResult};

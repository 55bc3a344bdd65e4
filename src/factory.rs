//! Resource factories used by the pool to construct new resources

use crate::errors::BoxError;

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub type FactoryResult<T> = Result<T, BoxError>;

/// Asynchronously constructs pooled resources from a caller-supplied state.
///
/// The pool calls `create` at most once per unit of capacity it consumes,
/// without holding any lock. The token is the one passed to
/// [`AsyncPool::rent`](crate::AsyncPool::rent); a factory may observe it and
/// bail out early.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_asyncpool::{AsyncFactory, FactoryResult};
/// use tokio_util::sync::CancellationToken;
///
/// struct Connector;
///
/// #[async_trait]
/// impl AsyncFactory<String, u16> for Connector {
///     async fn create(&self, port: u16, _cancel: CancellationToken) -> FactoryResult<String> {
///         Ok(format!("conn:{port}"))
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncFactory<T, S>: Send + Sync
where
    T: Send + 'static,
    S: Send + 'static,
{
    async fn create(&self, state: S, cancel: CancellationToken) -> FactoryResult<T>;
}

/// Factory backed by an async closure
///
/// # Examples
///
/// ```
/// use esox_asyncpool::{AsyncPool, FnFactory, PoolConfiguration};
/// use tokio_util::sync::CancellationToken;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let factory = FnFactory::new(|state: i32, _cancel: CancellationToken| async move {
///         Ok::<_, esox_asyncpool::BoxError>(state + 1)
///     });
///     let pool = AsyncPool::new(PoolConfiguration::new().with_max_pool_size(1), factory).unwrap();
///
///     let lease = pool.rent(1, &CancellationToken::new()).await.unwrap();
///     assert_eq!(*lease, 2);
/// });
/// ```
pub struct FnFactory<F> {
    create_fn: F,
}

impl<F> FnFactory<F> {
    pub fn new<S, Fut>(create_fn: F) -> Self
    where
        F: Fn(S, CancellationToken) -> Fut,
        Fut: Future,
    {
        Self { create_fn }
    }
}

#[async_trait]
impl<T, S, F, Fut> AsyncFactory<T, S> for FnFactory<F>
where
    T: Send + 'static,
    S: Send + 'static,
    F: Fn(S, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = FactoryResult<T>> + Send,
{
    async fn create(&self, state: S, cancel: CancellationToken) -> FactoryResult<T> {
        (self.create_fn)(state, cancel).await
    }
}

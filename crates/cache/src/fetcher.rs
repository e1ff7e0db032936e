//! The fetch seam the cache drives.

use std::sync::Arc;

use async_trait::async_trait;
use surety_types::DomainError;

/// Produces the value for a parameter set on a cache miss or refetch.
///
/// Implementations are shared behind `Arc` and may be called concurrently
/// for different parameter values; the cache itself guarantees at most one
/// in-flight fetch per key.
#[async_trait]
pub trait Fetcher<P, V>: Send + Sync {
    async fn fetch(&self, params: P) -> Result<V, DomainError>;
}

struct FnFetcher<F>(F);

#[async_trait]
impl<P, V, F, Fut> Fetcher<P, V> for FnFetcher<F>
where
    P: Send + 'static,
    V: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, DomainError>> + Send,
{
    async fn fetch(&self, params: P) -> Result<V, DomainError> {
        (self.0)(params).await
    }
}

/// Wraps an async closure as a [`Fetcher`].
pub fn fetcher_fn<P, V, F, Fut>(f: F) -> Arc<dyn Fetcher<P, V>>
where
    P: Send + 'static,
    V: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, DomainError>> + Send + 'static,
{
    Arc::new(FnFetcher(f))
}

//! The fanout module owns running independent per-item requests with bounded parallelism.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::num::NonZeroUsize;

/// Calls `fetch` for every item, keeping at most `limit` of the returned futures in flight.
/// Results are collected in completion order, so callers that care about order must sort.
/// The first error stops the remaining work and is returned.
pub async fn fan_out<I, F, Fut, T, E>(
    items: I,
    limit: NonZeroUsize,
    fetch: F,
) -> std::result::Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    // We use buffer_unordered, rather than join_all, so the number of requests going out at once
    // stays under control no matter how many items were listed.
    stream::iter(items)
        .map(fetch)
        .buffer_unordered(limit.get())
        .try_collect()
        .await
}

//! Bounded concurrent map that preserves input order

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use llmcompare_utils::LlmCompareError;

/// Run `f` over `items` with at most `limit` tasks in flight.
///
/// Waits for every task. Slot `i` of the result holds the output for
/// `items[i]`, or `None` when that task panicked.
pub(crate) async fn bounded_map<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    f: F,
) -> Result<Vec<Option<R>>, LlmCompareError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let mut join_set = JoinSet::new();
    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();

    for (index, item) in items.into_iter().enumerate() {
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| io::Error::other(e.to_string()))?;
        let fut = f(item);
        join_set.spawn(async move {
            let _permit = permit;
            (index, fut.await)
        });
    }

    while let Some(res) = join_set.join_next().await {
        match res {
            Ok((index, value)) => results[index] = Some(value),
            Err(e) => warn!(error = %e, "Concurrent task did not complete"),
        }
    }

    Ok(results)
}

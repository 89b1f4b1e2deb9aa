//! Batch mode (§4.4): fixed concurrency cap, processed in windows.
//! Grounded on `dashflow-evals::eval_runner`'s `buffer_unordered` fan-out.

use futures::stream::{self, StreamExt};
use std::future::Future;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Run `fetch` over every item in `items` with at most `concurrency`
/// requests in flight at once, returning results in the same order as
/// `items` (not completion order).
pub async fn run_bounded<T, F, Fut, R>(items: Vec<T>, concurrency: usize, fetch: F) -> Vec<R>
where
    T: Send,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: Send,
{
    stream::iter(items).map(|item| fetch(item)).buffered(concurrency.max(1)).collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn preserves_input_order() {
        let items = vec![3, 1, 2];
        let results = run_bounded(items, DEFAULT_CONCURRENCY, |n| async move { n * 10 }).await;
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_cap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..20).collect();

        run_bounded(items, 4, {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            move |_n| {
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        })
        .await;

        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }
}

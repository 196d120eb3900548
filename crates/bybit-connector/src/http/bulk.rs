/*
[INPUT]:  A list of order operations and a parallelism width
[OUTPUT]: Per-item results in input order
[POS]:    HTTP layer - bounded fan-out for batched order calls
[UPDATE]: When adding bulk variants or changing concurrency limits
*/

use std::future::Future;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::http::routes::{self, Route};
use crate::http::{BybitClient, Result};
use crate::types::Params;

/// Default number of in-flight requests for the bulk order methods.
pub const DEFAULT_MAX_IN_PARALLEL: usize = 10;

/// Run `operation` over every item with at most `max_in_parallel` futures in
/// flight. Results come back in input order, and a failed item never cancels
/// the others.
pub async fn execute_bulk<I, T, F, Fut>(
    operation: F,
    items: I,
    max_in_parallel: usize,
) -> Vec<Result<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items)
        .map(operation)
        .buffered(max_in_parallel.max(1))
        .collect()
        .await
}

impl BybitClient {
    async fn call_bulk(
        &self,
        route: &'static Route,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        execute_bulk(|params| self.call(route, params), orders, max_in_parallel).await
    }

    /// Place several active orders concurrently. The exchange allows 50
    /// requests per second per endpoint; keep `max_in_parallel` well below it.
    pub async fn place_active_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::PLACE_ACTIVE_ORDER, orders, max_in_parallel)
            .await
    }

    pub async fn cancel_active_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::CANCEL_ACTIVE_ORDER, orders, max_in_parallel)
            .await
    }

    pub async fn replace_active_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::REPLACE_ACTIVE_ORDER, orders, max_in_parallel)
            .await
    }

    pub async fn place_conditional_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::PLACE_CONDITIONAL_ORDER, orders, max_in_parallel)
            .await
    }

    pub async fn cancel_conditional_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::CANCEL_CONDITIONAL_ORDER, orders, max_in_parallel)
            .await
    }

    pub async fn replace_conditional_order_bulk(
        &self,
        orders: Vec<Params>,
        max_in_parallel: usize,
    ) -> Vec<Result<Value>> {
        self.call_bulk(&routes::REPLACE_CONDITIONAL_ORDER, orders, max_in_parallel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::BybitError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        // Earlier items sleep longer, so they finish last.
        let results = execute_bulk(
            |n: u64| async move {
                tokio::time::sleep(Duration::from_millis(50 - n * 10)).await;
                Ok::<_, BybitError>(n)
            },
            0..5,
            3,
        )
        .await;
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = execute_bulk(
            |_: usize| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, BybitError>(())
                }
            },
            0..8,
            2,
        )
        .await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_zero_width_runs_sequentially() {
        let results = execute_bulk(|n: i32| async move { Ok::<_, BybitError>(n) }, vec![1, 2], 0).await;
        assert_eq!(results.len(), 2);
    }
}

//! Bounded batch executor.
//!
//! Applies an async transform to every element of an ordered input sequence,
//! `width` elements at a time. Each chunk is a synchronization barrier: all
//! transforms in a chunk are joined before the next chunk starts. Results
//! keep input order; failed transforms contribute nothing.

use std::future::Future;

use tracing::{debug, warn};

/// Run `transform` over `inputs` with at most `width` operations in flight.
///
/// Successful (`Some`) results are appended in input order. When `quota` is
/// set, execution stops at the first chunk boundary where the output has
/// reached it. The final chunk may overshoot by up to `width - 1` results,
/// but execution never stops short of the quota while input remains.
pub async fn run_batched<I, T, F, Fut>(
    inputs: Vec<I>,
    width: usize,
    quota: Option<usize>,
    transform: F,
) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Option<T>> + Send + 'static,
{
    let width = width.max(1);
    let mut inputs = inputs;
    let mut output: Vec<T> = Vec::new();

    while !inputs.is_empty() {
        let take = inputs.len().min(width);
        let chunk: Vec<I> = inputs.drain(..take).collect();

        let handles: Vec<_> = chunk
            .into_iter()
            .map(|item| tokio::spawn(transform(item)))
            .collect();

        // Join in spawn order so ties within a chunk resolve by input order,
        // not completion order.
        for handle in handles {
            match handle.await {
                Ok(Some(value)) => output.push(value),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "batched task panicked"),
            }
        }

        if let Some(quota) = quota {
            if output.len() >= quota {
                debug!(
                    quota,
                    produced = output.len(),
                    remaining_inputs = inputs.len(),
                    "quota reached at chunk boundary"
                );
                break;
            }
        }
    }

    output
}

//! Streaming SHA-256 with a stall guard.
//!
//! The digest is folded over the byte stream chunk by chunk. A transfer that
//! drops below the throughput floor before most of the expected bytes have
//! arrived is aborted, so a stalled third-party host cannot pin the pipeline.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Throughput floor in bytes per millisecond (~15 KB/s).
const MIN_BYTES_PER_MS: f64 = 15.0;

/// Received fraction past which a slow transfer is allowed to finish.
const SAFE_PROGRESS: f64 = 0.9;

/// Compute the SHA-256 digest of `stream`, aborting on sustained stalls.
///
/// On each chunk the instantaneous throughput (bytes so far ÷ elapsed ms) is
/// compared against the floor; the transfer is aborted unless at least 90% of
/// `expected_len` has already arrived. With an unknown or zero expected
/// length the guard is disabled and only the network-level timeout bounds the
/// transfer.
///
/// Returns the digest as lowercase hex, or `None` if the stream failed or
/// was aborted.
pub async fn hash_stream<S, E>(mut stream: S, expected_len: Option<u64>) -> Option<String>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "asset stream failed mid-transfer");
                return None;
            }
        };

        hasher.update(&chunk);
        received += chunk.len() as u64;

        let elapsed_ms = started.elapsed().as_millis() as f64;
        let throughput = received as f64 / elapsed_ms;

        let below_safe_progress = expected_len
            .filter(|&total| total > 0)
            .is_some_and(|total| (received as f64 / total as f64) < SAFE_PROGRESS);

        if throughput < MIN_BYTES_PER_MS && below_safe_progress {
            debug!(
                received,
                ?expected_len,
                throughput,
                "transfer below throughput floor, aborting hash"
            );
            return None;
        }
    }

    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;

    use futures_util::stream;

    /// A stream that waits `delay_ms` before yielding each chunk. Under a
    /// paused tokio clock the sleeps advance time deterministically.
    fn timed_stream(
        chunks: Vec<(u64, Vec<u8>)>,
    ) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> + Unpin {
        Box::pin(stream::unfold(chunks.into_iter(), |mut it| async move {
            let (delay_ms, bytes) = it.next()?;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Some((Ok(Bytes::from(bytes)), it))
        }))
    }

    fn hex_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    #[tokio::test]
    async fn digest_is_deterministic_and_correct() {
        let fast = |data: &[u8]| timed_stream(vec![(0, data.to_vec())]);

        let first = hash_stream(fast(b"hello world"), Some(11)).await.unwrap();
        let second = hash_stream(fast(b"hello world"), Some(11)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transfer_below_progress_threshold_aborts() {
        // 100 bytes after 100 ms: 1 byte/ms, 10% of the declared 1000 bytes.
        let stream = timed_stream(vec![(100, vec![0u8; 100]), (100, vec![0u8; 100])]);
        assert_eq!(hash_stream(stream, Some(1000)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tail_past_progress_threshold_completes() {
        // 950 bytes arrive quickly, then the tail crawls in far below the
        // floor; the transfer is already ≥90% received so it must finish.
        let mut data = vec![1u8; 1000];
        data[999] = 7;
        let stream = timed_stream(vec![
            (1, data[..950].to_vec()),
            (10_000, data[950..975].to_vec()),
            (10_000, data[975..].to_vec()),
        ]);

        let digest = hash_stream(stream, Some(1000)).await.expect("digest");
        assert_eq!(digest, hex_sha256(&data));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_transfer_completes() {
        let data = vec![42u8; 4096];
        let stream = timed_stream(vec![(1, data[..2048].to_vec()), (1, data[2048..].to_vec())]);

        let digest = hash_stream(stream, Some(4096)).await.expect("digest");
        assert_eq!(digest, hex_sha256(&data));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_length_disables_the_guard() {
        // Well below the floor the whole way; without a declared size the
        // guard never fires.
        let stream = timed_stream(vec![(500, vec![9u8; 10]), (500, vec![9u8; 10])]);
        let digest = hash_stream(stream, None).await.expect("digest");
        assert_eq!(digest, hex_sha256(&[9u8; 20]));
    }

    #[tokio::test]
    async fn stream_error_yields_no_digest() {
        let stream = Box::pin(stream::iter(vec![
            Ok::<Bytes, String>(Bytes::from_static(b"abc")),
            Err("connection reset".to_string()),
        ]));
        assert_eq!(hash_stream(stream, Some(100)).await, None);
    }
}

//! Chunked, paced, strictly sequential submission of an id set.

use std::future::Future;
use std::time::Duration;

use filex_api::{BackendError, BackendResult};
use filex_core::EntityId;
use futures::Stream;
use metrics::counter;
use tracing::{debug, warn};

/// Reached after a chunk was accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub chunk_index: usize,
    pub chunk_len: usize,
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
    #[error("chunk {chunk_index} failed after {processed} of {total}: {source}")]
    Chunk {
        chunk_index: usize,
        /// Ids confirmed before the failing chunk.
        processed: usize,
        total: usize,
        #[source]
        source: BackendError,
    },
}

/// Number of remote calls needed for `total` ids.
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 { 0 } else { total.div_ceil(chunk_size) }
}

/// Submit `ids` in chunks of `chunk_size`, one at a time, sleeping `pace` between chunks.
///
/// The stream is lazy: nothing is submitted until it is polled. It yields one
/// checkpoint per accepted chunk and ends after the first error, which carries the
/// processed count reached before the failing chunk.
pub fn run_batched<'a, F, Fut>(
    ids: Vec<EntityId>,
    chunk_size: usize,
    pace: Duration,
    mut submit: F,
) -> impl Stream<Item = Result<Checkpoint, DispatchError>> + Send + 'a
where
    F: FnMut(Vec<EntityId>) -> Fut + Send + 'a,
    Fut: Future<Output = BackendResult<()>> + Send + 'a,
{
    async_stream::try_stream! {
        if chunk_size == 0 {
            Err::<(), _>(DispatchError::ZeroChunkSize)?;
        }
        let total = ids.len();
        for (chunk_index, chunk) in ids.chunks(chunk_size.max(1)).enumerate() {
            if chunk_index > 0 && !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }
            let offset = chunk_index * chunk_size;
            counter!("filex_chunks_submitted_total", 1u64);
            if let Err(source) = submit(chunk.to_vec()).await {
                counter!("filex_chunk_failures_total", 1u64);
                warn!(chunk = chunk_index, processed = offset, total, error = %source, "ops: chunk failed");
                Err::<(), _>(DispatchError::Chunk { chunk_index, processed: offset, total, source })?;
            }
            let processed = (offset + chunk_size).min(total);
            debug!(chunk = chunk_index, len = chunk.len(), processed, total, "ops: chunk ok");
            yield Checkpoint { chunk_index, chunk_len: chunk.len(), processed, total };
        }
    }
}

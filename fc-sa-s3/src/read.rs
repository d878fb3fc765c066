//! Range read bridge.
//!
//! The backend returns the requested object (or window) in a single buffer; the
//! bridge turns it into a pull stream of bounded chunks. The fetch runs on the
//! first poll, so a missing object or a failing backend shows up as the first
//! stream item rather than as an error opening the stream.
//!
//! The whole payload is held in memory for the life of the stream. Very large
//! objects should be read with a client that streams ranged GETs natively.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::{GetObjectRequest, ObjectStorageClient};
use crate::{ByteRange, ByteStream, FileKey, StoreError};

/// Position of a read stream within its fetched payload
#[derive(Debug, Clone)]
pub struct ReadCursor {
    payload: Bytes,
    offset: u64,
    limit: u64,
}

impl ReadCursor {
    /// `size` is the known object size; `range` the window that was fetched, if any
    pub fn new(payload: Bytes, size: u64, range: Option<ByteRange>) -> Self {
        let window = match range {
            Some(range) => range.window_len(size),
            None => size,
        };
        let limit = window.min(payload.len() as u64);
        Self {
            payload,
            offset: 0,
            limit,
        }
    }

    /// Emit up to `want` bytes, or `None` once the window is exhausted.
    ///
    /// The offset advances by `want` even when fewer bytes remain.
    pub fn next_chunk(&mut self, want: usize) -> Option<Bytes> {
        if self.is_finished() {
            return None;
        }
        let want = want.max(1) as u64;
        let end = self.offset.saturating_add(want).min(self.limit);
        let chunk = self.payload.slice(self.offset as usize..end as usize);
        self.offset = self.offset.saturating_add(want);
        Some(chunk)
    }

    pub fn is_finished(&self) -> bool {
        self.offset >= self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total bytes this cursor will emit
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Open a lazily fetched read stream over `key`
pub fn read_stream(
    client: Arc<dyn ObjectStorageClient>,
    bucket: String,
    key: FileKey,
    range: Option<ByteRange>,
    chunk_bytes: usize,
) -> ByteStream {
    let stream = async_stream::stream! {
        let object_key = match key.id.clone() {
            Some(id) => id,
            None => {
                yield Err(StoreError::MissingObjectId);
                return;
            }
        };

        if let Some(range) = range.filter(|range| !range.is_valid()) {
            yield Err(StoreError::InvalidRange { start: range.start, end: range.end });
            return;
        }

        debug!(bucket = %bucket, key = %object_key, range = ?range, "Fetching object");

        let request = GetObjectRequest {
            bucket: bucket.clone(),
            key: object_key.clone(),
            range,
        };
        let object = match client.get_object(request).await {
            Ok(object) => object,
            Err(source) => {
                warn!(bucket = %bucket, key = %object_key, error = %source, "Object fetch failed");
                yield Err(StoreError::BackendFetch { key: object_key, source });
                return;
            }
        };

        if range.is_none() {
            if let Some(length) = object.content_length.filter(|length| *length != key.size) {
                warn!(
                    key = %object_key,
                    content_length = length,
                    recorded_size = key.size,
                    "Object size differs from the recorded size"
                );
            }
        }

        let mut cursor = ReadCursor::new(object.body, key.size, range);
        debug!(
            key = %object_key,
            content_length = ?object.content_length,
            fetched_bytes = cursor.payload.len(),
            emit_bytes = cursor.limit(),
            "Object fetched"
        );

        while let Some(chunk) = cursor.next_chunk(chunk_bytes) {
            debug!(key = %object_key, transferred = cursor.offset().min(cursor.limit()), "Read chunk");
            yield Ok(chunk);
        }

        debug!(key = %object_key, "Read stream ended");
    };

    Box::pin(stream)
}

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::client::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedPart,
    CreateMultipartUploadRequest, ObjectStorageClient, UploadPartRequest,
};
use crate::{ClientError, StoreError, StoreResult, StoredResult, UploadRules};

/// Write side of a stored file.
///
/// `write` resolves only once the backend has acknowledged the data, so callers
/// get natural backpressure by awaiting each chunk before producing the next.
/// `finish` is the single completion signal and yields the stored result.
#[async_trait]
pub trait FileWriter: Send {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()>;

    async fn finish(self: Box<Self>) -> StoreResult<StoredResult>;

    async fn abort(self: Box<Self>) -> StoreResult<()>;

    /// Bytes acknowledged by the backend so far
    fn bytes_written(&self) -> u64;
}

/// State of one multipart upload, owned by a single writer
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: String,
    pub next_part_number: i32,
    /// Acknowledged parts in submission order
    pub parts: Vec<CompletedPart>,
    pub bytes_written: u64,
}

impl UploadSession {
    fn new(upload_id: String) -> Self {
        Self {
            upload_id,
            next_part_number: 1,
            parts: Vec::new(),
            bytes_written: 0,
        }
    }

    fn record(&mut self, e_tag: String, len: usize) {
        self.parts.push(CompletedPart {
            part_number: self.next_part_number,
            e_tag,
        });
        self.next_part_number += 1;
        self.bytes_written += len as u64;
    }
}

/// Parameters for starting a multipart upload
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub acl: Option<String>,
    pub content_type: Option<String>,
    pub external_url: Option<String>,
}

/// Streams chunks into a backend multipart upload, one part at a time
pub struct MultipartWriter {
    client: Arc<dyn ObjectStorageClient>,
    target: UploadTarget,
    session: UploadSession,
    rules: UploadRules,
    pending: BytesMut,
    failed: bool,
    closed: bool,
}

impl MultipartWriter {
    /// Initiate the upload. Fails with `UploadInit` when the backend errors or
    /// hands back no upload id; nothing else is sent to the backend in that case.
    pub async fn begin(
        client: Arc<dyn ObjectStorageClient>,
        target: UploadTarget,
        rules: UploadRules,
    ) -> StoreResult<Self> {
        debug!(
            bucket = %target.bucket,
            key = %target.key,
            acl = ?target.acl,
            external_url = ?target.external_url,
            "Creating multipart upload"
        );

        let request = CreateMultipartUploadRequest {
            bucket: target.bucket.clone(),
            key: target.key.clone(),
            acl: target.acl.clone(),
            content_type: target.content_type.clone(),
        };

        let output = client
            .create_multipart_upload(request)
            .await
            .map_err(|source| {
                error!(key = %target.key, error = %source, "Multipart upload creation failed");
                StoreError::UploadInit {
                    key: target.key.clone(),
                    reason: "backend rejected the upload".to_string(),
                    source: Some(source),
                }
            })?;

        let upload_id = output
            .upload_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                error!(key = %target.key, "Multipart upload created without an upload id");
                StoreError::UploadInit {
                    key: target.key.clone(),
                    reason: "backend returned no upload id".to_string(),
                    source: Some(ClientError::MissingUploadId),
                }
            })?;

        debug!(key = %target.key, upload_id = %upload_id, "Multipart upload created");

        Ok(Self {
            client,
            target,
            session: UploadSession::new(upload_id),
            rules,
            pending: BytesMut::new(),
            failed: false,
            closed: false,
        })
    }

    pub fn upload_id(&self) -> &str {
        &self.session.upload_id
    }

    pub fn object_key(&self) -> &str {
        &self.target.key
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Accept one chunk. With part coalescing off every non-empty chunk becomes
    /// exactly one part.
    pub async fn write_chunk(&mut self, chunk: Bytes) -> StoreResult<()> {
        if self.failed {
            return Err(StoreError::UploadAbandoned {
                upload_id: self.session.upload_id.clone(),
            });
        }
        if chunk.is_empty() {
            return Ok(());
        }

        if self.rules.min_part_bytes == 0 {
            return self.send_part(chunk).await;
        }

        self.pending.extend_from_slice(&chunk);
        if self.pending.len() >= self.rules.min_part_bytes {
            let part = self.pending.split().freeze();
            self.send_part(part).await?;
        }
        Ok(())
    }

    /// Flush buffered data, finalize the upload and report the stored object
    pub async fn complete(mut self) -> StoreResult<StoredResult> {
        if self.failed {
            return Err(StoreError::UploadAbandoned {
                upload_id: self.session.upload_id.clone(),
            });
        }

        if !self.pending.is_empty() {
            let part = self.pending.split().freeze();
            self.send_part(part).await?;
        }
        if self.session.parts.is_empty() {
            // zero-byte file: finalize needs at least one part
            self.send_part(Bytes::new()).await?;
        }

        debug!(
            key = %self.target.key,
            upload_id = %self.session.upload_id,
            parts = self.session.parts.len(),
            size_bytes = self.session.bytes_written,
            "Completing multipart upload"
        );

        let request = CompleteMultipartUploadRequest {
            bucket: self.target.bucket.clone(),
            key: self.target.key.clone(),
            upload_id: self.session.upload_id.clone(),
            parts: self.session.parts.clone(),
        };

        match self.client.complete_multipart_upload(request).await {
            Ok(output) => {
                self.closed = true;
                let file_key = output.key.unwrap_or_else(|| self.target.key.clone());
                info!(
                    bucket = %self.target.bucket,
                    key = %file_key,
                    e_tag = ?output.e_tag,
                    size_bytes = self.session.bytes_written,
                    parts = self.session.parts.len(),
                    "Multipart upload completed"
                );
                Ok(StoredResult::new(file_key, self.session.bytes_written)
                    .with_stored_at(Utc::now())
                    .with_external_url(self.target.external_url.clone()))
            }
            Err(source) => {
                error!(
                    key = %self.target.key,
                    upload_id = %self.session.upload_id,
                    error = %source,
                    "Multipart upload completion failed"
                );
                self.failed = true;
                self.abort_after_failure().await;
                Err(StoreError::Finalize {
                    upload_id: self.session.upload_id.clone(),
                    source,
                })
            }
        }
    }

    /// Discard the upload and any parts already sent.
    ///
    /// An upload the backend no longer knows counts as discarded.
    pub async fn cancel(mut self) -> StoreResult<()> {
        self.closed = true;
        if self.failed && self.rules.abort_on_failure {
            debug!(upload_id = %self.session.upload_id, "Upload already aborted after failure");
            return Ok(());
        }

        match self.send_abort().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_no_such_upload() => {
                debug!(upload_id = %self.session.upload_id, "Upload already gone");
                Ok(())
            }
            Err(source) => Err(StoreError::Abort {
                upload_id: self.session.upload_id.clone(),
                source,
            }),
        }
    }

    async fn send_part(&mut self, body: Bytes) -> StoreResult<()> {
        let part_number = self.session.next_part_number;
        let len = body.len();

        let request = UploadPartRequest {
            bucket: self.target.bucket.clone(),
            key: self.target.key.clone(),
            upload_id: self.session.upload_id.clone(),
            part_number,
            body,
        };

        let result = match self.client.upload_part(request).await {
            Ok(output) => output
                .e_tag
                .filter(|tag| !tag.is_empty())
                .ok_or(ClientError::MissingETag { part_number }),
            Err(source) => Err(source),
        };

        match result {
            Ok(e_tag) => {
                self.session.record(e_tag, len);
                debug!(
                    upload_id = %self.session.upload_id,
                    part_number,
                    size_bytes = len,
                    total_bytes = self.session.bytes_written,
                    "Part uploaded"
                );
                Ok(())
            }
            Err(source) => {
                error!(
                    upload_id = %self.session.upload_id,
                    part_number,
                    error = %source,
                    "Part upload failed"
                );
                self.failed = true;
                self.abort_after_failure().await;
                Err(StoreError::PartUpload {
                    upload_id: self.session.upload_id.clone(),
                    part_number,
                    source,
                })
            }
        }
    }

    async fn abort_after_failure(&mut self) {
        self.closed = true;
        if !self.rules.abort_on_failure {
            return;
        }
        if let Err(err) = self.send_abort().await {
            warn!(
                upload_id = %self.session.upload_id,
                error = %err,
                "Could not abort failed multipart upload"
            );
        }
    }

    async fn send_abort(&self) -> Result<(), ClientError> {
        debug!(upload_id = %self.session.upload_id, "Aborting multipart upload");
        self.client
            .abort_multipart_upload(AbortMultipartUploadRequest {
                bucket: self.target.bucket.clone(),
                key: self.target.key.clone(),
                upload_id: self.session.upload_id.clone(),
            })
            .await
    }
}

impl Drop for MultipartWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                key = %self.target.key,
                upload_id = %self.session.upload_id,
                "Multipart writer dropped before finishing; upload left open"
            );
        }
    }
}

#[async_trait]
impl FileWriter for MultipartWriter {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        self.write_chunk(chunk).await
    }

    async fn finish(self: Box<Self>) -> StoreResult<StoredResult> {
        (*self).complete().await
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        (*self).cancel().await
    }

    fn bytes_written(&self) -> u64 {
        self.session.bytes_written
    }
}

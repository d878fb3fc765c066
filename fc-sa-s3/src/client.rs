use async_trait::async_trait;
use bytes::Bytes;

use crate::{ByteRange, ClientResult};

/// The object storage operations the adapter relies on.
///
/// Implementations are shared across all streams of a store and must be safe to
/// call concurrently for different keys.
#[async_trait]
pub trait ObjectStorageClient: Send + Sync {
    /// Fetch a whole object, or only the given window when a range is set
    async fn get_object(&self, request: GetObjectRequest) -> ClientResult<GetObjectOutput>;

    /// Start a multipart upload session
    async fn create_multipart_upload(
        &self,
        request: CreateMultipartUploadRequest,
    ) -> ClientResult<CreateMultipartUploadOutput>;

    /// Upload one numbered part of a session
    async fn upload_part(&self, request: UploadPartRequest) -> ClientResult<UploadPartOutput>;

    /// Assemble the uploaded parts into the final object
    async fn complete_multipart_upload(
        &self,
        request: CompleteMultipartUploadRequest,
    ) -> ClientResult<CompleteMultipartUploadOutput>;

    /// Discard a session and its uploaded parts
    async fn abort_multipart_upload(&self, request: AbortMultipartUploadRequest) -> ClientResult<()>;

    async fn delete_object(&self, request: DeleteObjectRequest) -> ClientResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObjectRequest {
    pub bucket: String,
    pub key: String,
    pub range: Option<ByteRange>,
}

#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    pub body: Bytes,
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    /// Canned ACL; `None` means the attribute is not sent at all
    pub acl: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateMultipartUploadOutput {
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadPartRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub part_number: i32,
    pub body: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct UploadPartOutput {
    pub e_tag: Option<String>,
}

/// Acknowledged part, as presented at finalize time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadOutput {
    pub key: Option<String>,
    pub e_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortMultipartUploadRequest {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObjectRequest {
    pub bucket: String,
    pub key: String,
}

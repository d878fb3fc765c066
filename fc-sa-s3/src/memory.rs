//! In-process object storage backend.
//!
//! Behaves like a bucket store for the operations the adapter uses: it keeps
//! objects and pending multipart uploads in memory, validates the part list at
//! completion, and records every call so callers can inspect exactly what was
//! sent. Faults can be injected per operation.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::client::{
    AbortMultipartUploadRequest, CompleteMultipartUploadOutput, CompleteMultipartUploadRequest,
    CompletedPart, CreateMultipartUploadOutput, CreateMultipartUploadRequest, DeleteObjectRequest,
    GetObjectOutput, GetObjectRequest, ObjectStorageClient, UploadPartOutput, UploadPartRequest,
};
use crate::{ByteRange, ClientError, ClientResult};

/// A recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    GetObject {
        key: String,
        range: Option<ByteRange>,
    },
    CreateMultipartUpload {
        key: String,
        acl: Option<String>,
        content_type: Option<String>,
    },
    UploadPart {
        key: String,
        upload_id: String,
        part_number: i32,
        len: usize,
    },
    CompleteMultipartUpload {
        key: String,
        upload_id: String,
        parts: Vec<CompletedPart>,
    },
    AbortMultipartUpload {
        key: String,
        upload_id: String,
    },
    DeleteObject {
        key: String,
    },
}

/// Failure to inject into the next matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// get_object fails with a service error
    GetObject,
    /// create_multipart_upload fails with a service error
    CreateUpload,
    /// create_multipart_upload succeeds but returns no upload id
    MissingUploadId,
    /// upload_part fails for the given part number
    UploadPart(i32),
    /// upload_part succeeds for the given part number but returns no ETag
    MissingETag(i32),
    /// complete_multipart_upload fails with a service error
    Complete,
    /// abort_multipart_upload fails with a service error
    AbortUpload,
    /// delete_object fails with a service error
    DeleteObject,
}

#[derive(Debug, thiserror::Error)]
#[error("injected fault: {0:?}")]
struct InjectedFault(Fault);

#[derive(Default)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, (String, Bytes)>,
}

#[derive(Default)]
struct MemoryState {
    objects: HashMap<(String, String), Bytes>,
    uploads: HashMap<String, PendingUpload>,
    calls: Vec<ClientCall>,
    faults: Vec<Fault>,
}

impl MemoryState {
    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }
}

/// In-memory implementation of [`ObjectStorageClient`]
#[derive(Default)]
pub struct MemoryObjectClient {
    state: Mutex<MemoryState>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault; each fault fires once
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.state.get_mut().faults.push(fault);
        self
    }

    pub async fn inject(&self, fault: Fault) {
        self.state.lock().await.faults.push(fault);
    }

    /// Seed an object directly
    pub async fn insert_object<B, K, D>(&self, bucket: B, key: K, data: D)
    where
        B: Into<String>,
        K: Into<String>,
        D: Into<Bytes>,
    {
        self.state
            .lock()
            .await
            .objects
            .insert((bucket.into(), key.into()), data.into());
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    /// Number of multipart uploads started but neither completed nor aborted
    pub async fn pending_uploads(&self) -> usize {
        self.state.lock().await.uploads.len()
    }

    /// All calls received so far, in order
    pub async fn calls(&self) -> Vec<ClientCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl ObjectStorageClient for MemoryObjectClient {
    async fn get_object(&self, request: GetObjectRequest) -> ClientResult<GetObjectOutput> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::GetObject {
            key: request.key.clone(),
            range: request.range,
        });

        if state.take_fault(Fault::GetObject) {
            return Err(ClientError::service(InjectedFault(Fault::GetObject)));
        }

        let data = state
            .objects
            .get(&(request.bucket.clone(), request.key.clone()))
            .cloned()
            .ok_or_else(|| ClientError::NoSuchKey {
                key: request.key.clone(),
            })?;

        let body = match request.range {
            None => data,
            Some(range) => {
                let len = data.len() as u64;
                if range.start >= len || range.start > range.end {
                    return Err(ClientError::InvalidRange {
                        message: format!("{} for object of {} bytes", range.header_value(), len),
                    });
                }
                let end = range.end.min(len - 1);
                data.slice(range.start as usize..=end as usize)
            }
        };

        Ok(GetObjectOutput {
            content_length: Some(body.len() as u64),
            body,
        })
    }

    async fn create_multipart_upload(
        &self,
        request: CreateMultipartUploadRequest,
    ) -> ClientResult<CreateMultipartUploadOutput> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::CreateMultipartUpload {
            key: request.key.clone(),
            acl: request.acl.clone(),
            content_type: request.content_type.clone(),
        });

        if state.take_fault(Fault::CreateUpload) {
            return Err(ClientError::service(InjectedFault(Fault::CreateUpload)));
        }
        if state.take_fault(Fault::MissingUploadId) {
            return Ok(CreateMultipartUploadOutput { upload_id: None });
        }

        let upload_id = format!("mpu_{}", Uuid::new_v4().simple());
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: request.bucket,
                key: request.key,
                parts: BTreeMap::new(),
            },
        );

        Ok(CreateMultipartUploadOutput {
            upload_id: Some(upload_id),
        })
    }

    async fn upload_part(&self, request: UploadPartRequest) -> ClientResult<UploadPartOutput> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::UploadPart {
            key: request.key.clone(),
            upload_id: request.upload_id.clone(),
            part_number: request.part_number,
            len: request.body.len(),
        });

        if state.take_fault(Fault::UploadPart(request.part_number)) {
            return Err(ClientError::service(InjectedFault(Fault::UploadPart(
                request.part_number,
            ))));
        }
        let drop_etag = state.take_fault(Fault::MissingETag(request.part_number));

        let upload = state
            .uploads
            .get_mut(&request.upload_id)
            .ok_or_else(|| ClientError::NoSuchUpload {
                upload_id: request.upload_id.clone(),
            })?;

        let e_tag = format!("\"{}\"", Uuid::new_v4().simple());
        upload
            .parts
            .insert(request.part_number, (e_tag.clone(), request.body));

        Ok(UploadPartOutput {
            e_tag: if drop_etag { None } else { Some(e_tag) },
        })
    }

    async fn complete_multipart_upload(
        &self,
        request: CompleteMultipartUploadRequest,
    ) -> ClientResult<CompleteMultipartUploadOutput> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::CompleteMultipartUpload {
            key: request.key.clone(),
            upload_id: request.upload_id.clone(),
            parts: request.parts.clone(),
        });

        if state.take_fault(Fault::Complete) {
            return Err(ClientError::service(InjectedFault(Fault::Complete)));
        }

        let upload = state
            .uploads
            .get(&request.upload_id)
            .ok_or_else(|| ClientError::NoSuchUpload {
                upload_id: request.upload_id.clone(),
            })?;

        if request.parts.is_empty() {
            return Err(ClientError::invalid_part("at least one part is required"));
        }

        let mut data = BytesMut::new();
        for (index, part) in request.parts.iter().enumerate() {
            let expected = index as i32 + 1;
            if part.part_number != expected {
                return Err(ClientError::invalid_part(format!(
                    "expected part {} but got part {}",
                    expected, part.part_number
                )));
            }
            let (e_tag, body) = upload.parts.get(&part.part_number).ok_or_else(|| {
                ClientError::invalid_part(format!("part {} was never uploaded", part.part_number))
            })?;
            if *e_tag != part.e_tag {
                return Err(ClientError::invalid_part(format!(
                    "ETag mismatch for part {}",
                    part.part_number
                )));
            }
            data.extend_from_slice(body);
        }

        let upload = state
            .uploads
            .remove(&request.upload_id)
            .unwrap_or_default();
        let key = upload.key;
        state
            .objects
            .insert((upload.bucket, key.clone()), data.freeze());

        Ok(CompleteMultipartUploadOutput {
            key: Some(key),
            e_tag: Some(format!("\"{}-{}\"", Uuid::new_v4().simple(), request.parts.len())),
        })
    }

    async fn abort_multipart_upload(&self, request: AbortMultipartUploadRequest) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::AbortMultipartUpload {
            key: request.key.clone(),
            upload_id: request.upload_id.clone(),
        });

        if state.take_fault(Fault::AbortUpload) {
            return Err(ClientError::service(InjectedFault(Fault::AbortUpload)));
        }

        state
            .uploads
            .remove(&request.upload_id)
            .map(|_| ())
            .ok_or(ClientError::NoSuchUpload {
                upload_id: request.upload_id,
            })
    }

    async fn delete_object(&self, request: DeleteObjectRequest) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(ClientCall::DeleteObject {
            key: request.key.clone(),
        });

        if state.take_fault(Fault::DeleteObject) {
            return Err(ClientError::service(InjectedFault(Fault::DeleteObject)));
        }

        state.objects.remove(&(request.bucket, request.key));
        Ok(())
    }
}

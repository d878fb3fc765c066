use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aws_client::AwsS3Client;
use crate::client::{DeleteObjectRequest, ObjectStorageClient};
use crate::keys::{derive_file_key, external_url, write_object_key};
use crate::read::read_stream;
use crate::upload::{FileWriter, MultipartWriter, UploadTarget};
use crate::{
    ByteRange, ByteStream, FileKey, FileRecord, S3StoreConfig, StoreError, StoreResult,
    StoredResult, WriteOptions,
};

/// Capability set a file collections framework needs from a storage adapter.
///
/// The framework holds adapters as `Arc<dyn StorageAdapter>` and routes every
/// read, write and delete for a file record through them.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend identifier
    fn type_name(&self) -> &'static str;

    /// Adapter name; the key under which copy info is kept on file records
    fn name(&self) -> &str;

    /// Derive the key for a file record
    fn file_key(&self, record: &FileRecord) -> FileKey;

    /// Open a read stream. Backend failures arrive as the first stream item.
    async fn read_stream(&self, key: &FileKey, range: Option<ByteRange>) -> StoreResult<ByteStream>;

    /// Open a writer for a new object derived from `key`
    async fn write_stream(&self, key: &FileKey, options: WriteOptions) -> StoreResult<Box<dyn FileWriter>>;

    /// Delete the object behind `key`; a key without an id is a no-op
    async fn remove(&self, key: &FileKey) -> StoreResult<()>;

    /// Drive a whole chunk stream into a new object.
    ///
    /// An error item in `body` aborts the upload and is returned as is.
    async fn store(
        &self,
        key: &FileKey,
        options: WriteOptions,
        mut body: ByteStream,
    ) -> StoreResult<StoredResult> {
        let mut writer = self.write_stream(key, options).await?;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    if let Err(abort_err) = writer.abort().await {
                        warn!(error = %abort_err, "Could not abort upload after source error");
                    }
                    return Err(err);
                }
            };
            writer.write(chunk).await?;
        }

        writer.finish().await
    }
}

/// Storage adapter over an S3-compatible bucket
pub struct S3Store {
    client: Arc<dyn ObjectStorageClient>,
    config: S3StoreConfig,
    collection_name: String,
}

impl S3Store {
    pub fn new<C>(client: C, config: S3StoreConfig) -> StoreResult<Self>
    where
        C: ObjectStorageClient + 'static,
    {
        Self::with_client(Arc::new(client), config)
    }

    /// Build a store over a shared client
    pub fn with_client(client: Arc<dyn ObjectStorageClient>, config: S3StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let collection_name = config.collection_name();

        debug!(
            name = %config.name,
            bucket = %config.bucket,
            collection = %collection_name,
            public = config.is_public,
            "S3 store created"
        );

        Ok(Self {
            client,
            config,
            collection_name,
        })
    }

    /// Build a store backed by the AWS SDK
    pub async fn connect(config: S3StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let client = AwsS3Client::connect(&config).await;
        Self::new(client, config)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn config(&self) -> &S3StoreConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn ObjectStorageClient> {
        self.client.clone()
    }

    fn object_key_for(&self, key: &FileKey) -> String {
        let tag = if self.config.partition_keys {
            key.partition_tag.as_deref()
        } else {
            None
        };
        write_object_key(tag, &key.filename, Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl StorageAdapter for S3Store {
    fn type_name(&self) -> &'static str {
        "s3"
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn file_key(&self, record: &FileRecord) -> FileKey {
        derive_file_key(record, &self.config.name, &self.config.partition_field)
    }

    async fn read_stream(&self, key: &FileKey, range: Option<ByteRange>) -> StoreResult<ByteStream> {
        Ok(read_stream(
            self.client.clone(),
            self.config.bucket.clone(),
            key.clone(),
            range,
            self.config.read_chunk_bytes,
        ))
    }

    async fn write_stream(&self, key: &FileKey, options: WriteOptions) -> StoreResult<Box<dyn FileWriter>> {
        let object_key = self.object_key_for(key);
        let url = self
            .config
            .public_base()
            .map(|base| external_url(base, &object_key));

        let target = UploadTarget {
            bucket: self.config.bucket.clone(),
            key: object_key,
            acl: self.config.object_acl.clone(),
            content_type: options.content_type,
            external_url: url,
        };

        let writer =
            MultipartWriter::begin(self.client.clone(), target, self.config.upload_rules.clone()).await?;
        Ok(Box::new(writer))
    }

    async fn remove(&self, key: &FileKey) -> StoreResult<()> {
        let object_key = match key.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                debug!(filename = %key.filename, "No object id on key, nothing to remove");
                return Ok(());
            }
        };

        let request = DeleteObjectRequest {
            bucket: self.config.bucket.clone(),
            key: object_key.clone(),
        };

        match self.client.delete_object(request).await {
            Ok(()) => {
                info!(bucket = %self.config.bucket, key = %object_key, "Object removed");
                Ok(())
            }
            Err(err) if err.is_no_such_key() => {
                debug!(key = %object_key, "Object already absent");
                Ok(())
            }
            Err(source) => {
                warn!(key = %object_key, error = %source, "Object removal failed");
                Err(StoreError::Deletion {
                    key: object_key,
                    source,
                })
            }
        }
    }
}

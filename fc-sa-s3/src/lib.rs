//! # fc-sa-s3: S3 storage adapter for file collections
//!
//! `fc-sa-s3` bridges an S3-compatible bucket to the streaming contract a file
//! collections framework expects from its storage adapters: derive a key for a
//! file record, open a (ranged) read stream, open a write stream that lands the
//! bytes as a new object, and remove objects.
//!
//! ## Key Features
//!
//! - **Multipart writes**: every chunk is uploaded as a numbered part as it arrives, so
//!   the final size never has to be known up front
//! - **Ranged reads**: inclusive byte windows, emitted as bounded chunks
//! - **Tenant partitioning**: write keys are prefixed with a partition tag taken from record metadata
//! - **Public stores**: stored results carry a CDN URL when the store is public
//! - **Backend agnostic**: the AWS SDK client is one implementation of [`ObjectStorageClient`];
//!   [`MemoryObjectClient`] is another
//!
//! ## Quick Start
//!
//! ```rust
//! use fc_sa_s3::prelude::*;
//! use bytes::Bytes;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> StoreResult<()> {
//! // 1. Create a store (use S3Store::connect for a real bucket)
//! let config = S3StoreConfig::new("images", "assets").public("https://cdn.example.com");
//! let store = S3Store::new(MemoryObjectClient::new(), config)?;
//!
//! // 2. Derive the key for a file record
//! let record = FileRecord::new("rec-1", "Media")
//!     .with_name("hello.txt")
//!     .with_metadata("shopId", "shop-1");
//! let key = store.file_key(&record);
//!
//! // 3. Write it
//! let mut writer = store.write_stream(&key, WriteOptions::new()).await?;
//! writer.write(Bytes::from_static(b"Hello, ")).await?;
//! writer.write(Bytes::from_static(b"world!")).await?;
//! let stored = writer.finish().await?;
//! assert!(stored.file_key.starts_with("shop-1/"));
//!
//! // 4. Read a window back
//! let key = FileKey::new("hello.txt", stored.size).with_id(stored.file_key);
//! let mut stream = store.read_stream(&key, Some(ByteRange::new(7, 11))).await?;
//! let chunk = stream.next().await.unwrap()?;
//! assert_eq!(&chunk[..], b"world");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  File collections    │  ← holds Arc<dyn StorageAdapter>
//! ├──────────────────────┤
//! │  S3Store             │  ← keys, read bridge, multipart writer, removal
//! ├──────────────────────┤
//! │  ObjectStorageClient │  ← AwsS3Client / MemoryObjectClient
//! └──────────────────────┘
//! ```

pub mod adapter;
pub mod aws_client;
pub mod client;
mod config;
mod error;
pub mod keys;
pub mod memory;
pub mod read;
mod receipt;
mod types;
pub mod upload;

// Re-export main types for clean API
pub use adapter::{S3Store, StorageAdapter};
pub use aws_client::AwsS3Client;
pub use client::{CompletedPart, ObjectStorageClient};
pub use config::{
    S3StoreConfig, UploadRules, DEFAULT_COLLECTION_PREFIX, DEFAULT_PARTITION_FIELD,
    DEFAULT_READ_CHUNK_BYTES,
};
pub use error::{ClientError, ClientResult, StoreError, StoreResult};
pub use memory::{ClientCall, Fault, MemoryObjectClient};
pub use read::ReadCursor;
pub use receipt::StoredResult;
pub use types::{ByteRange, ByteStream, CopyInfo, FileKey, FileRecord, WriteOptions};
pub use upload::{FileWriter, MultipartWriter, UploadSession};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ByteRange, ByteStream, FileKey, FileRecord, FileWriter, MemoryObjectClient, S3Store,
        S3StoreConfig, StorageAdapter, StoreError, StoreResult, StoredResult, WriteOptions,
    };
}

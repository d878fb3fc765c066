use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

use crate::StoreResult;

/// Stream of file content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

/// Per-adapter copy information kept on a file record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyInfo {
    /// Backend object key assigned when the copy was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl CopyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A file record as handed over by the file collections framework
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub collection_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub copies: BTreeMap<String, CopyInfo>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl FileRecord {
    pub fn new<I: Into<String>, C: Into<String>>(id: I, collection_name: C) -> Self {
        Self {
            id: id.into(),
            collection_name: collection_name.into(),
            ..Self::default()
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_copy<S: Into<String>>(mut self, store_name: S, info: CopyInfo) -> Self {
        self.copies.insert(store_name.into(), info);
        self
    }

    pub fn with_metadata<K: Into<String>, V: Serialize>(mut self, key: K, value: V) -> Self {
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.metadata.as_object_mut() {
            obj.insert(key.into(), serde_json::to_value(value).unwrap_or(serde_json::Value::Null));
        }
        self
    }

    /// Copy info recorded for the named store, if any
    pub fn info_for_copy(&self, store_name: &str) -> Option<&CopyInfo> {
        self.copies.get(store_name)
    }
}

/// The adapter's handle for a stored or about-to-be-stored object.
///
/// Field names are persisted by the framework and must stay stable:
/// `_id`, `filename`, `size`, `shopId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileKey {
    /// Backend object key, absent until the object has been written
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    /// Tenant discriminator used to prefix write keys
    #[serde(rename = "shopId", default, skip_serializing_if = "Option::is_none")]
    pub partition_tag: Option<String>,
}

impl FileKey {
    pub fn new<S: Into<String>>(filename: S, size: u64) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            size,
            partition_tag: None,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_partition_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.partition_tag = Some(tag.into());
        self
    }
}

/// Inclusive byte window for partial reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Number of bytes covered by the window when the object holds `total_size` bytes
    pub fn window_len(&self, total_size: u64) -> u64 {
        if total_size == 0 || self.start >= total_size || !self.is_valid() {
            return 0;
        }
        let last = self.end.min(total_size - 1);
        last - self.start + 1
    }

    /// HTTP `Range` header value
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Options for opening a write stream
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub content_type: Option<String>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

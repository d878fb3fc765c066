//! Key derivation for file records.
//!
//! Read-time keys are rebuilt from the copy info the framework recorded for this
//! adapter, falling back to the generic record fields. Write-time object keys have
//! the form `{partition}/{millis}-{filename}`, or `{millis}-{filename}` when no
//! partition applies.

use crate::{FileKey, FileRecord};

/// Build the file key for `record` as seen by the store named `store_name`
pub fn derive_file_key(record: &FileRecord, store_name: &str, partition_field: &str) -> FileKey {
    let info = record.info_for_copy(store_name);

    let id = info
        .and_then(|info| info.key.clone())
        .filter(|key| !key.is_empty())
        .or_else(|| Some(record.id.clone()).filter(|id| !id.is_empty()));

    let filename = info
        .and_then(|info| info.name.clone())
        .filter(|name| !name.is_empty())
        .or_else(|| record.name.clone().filter(|name| !name.is_empty()))
        .unwrap_or_else(|| format!("{}-{}", record.collection_name, record.id));

    let size = info
        .and_then(|info| info.size)
        .filter(|size| *size > 0)
        .or(record.size)
        .unwrap_or(0);

    FileKey {
        id,
        filename,
        size,
        partition_tag: partition_tag(&record.metadata, partition_field),
    }
}

/// Extract the partition tag from record metadata; strings and numbers are accepted
pub fn partition_tag(metadata: &serde_json::Value, field: &str) -> Option<String> {
    match metadata.get(field)? {
        serde_json::Value::String(tag) if !tag.is_empty() => Some(tag.clone()),
        serde_json::Value::Number(tag) => Some(tag.to_string()),
        _ => None,
    }
}

/// Backend object key for a new write
pub fn write_object_key(partition_tag: Option<&str>, filename: &str, timestamp_ms: i64) -> String {
    match partition_tag {
        Some(tag) if !tag.is_empty() => format!("{}/{}-{}", tag, timestamp_ms, filename),
        _ => format!("{}-{}", timestamp_ms, filename),
    }
}

/// Externally resolvable URL for an object behind a public base address
pub fn external_url(public_base: &str, object_key: &str) -> String {
    format!("{}/{}", public_base.trim_end_matches('/'), object_key)
}

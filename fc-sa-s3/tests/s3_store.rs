use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio_test::{assert_err, assert_ok};

use fc_sa_s3::{
    ByteRange, ByteStream, ClientCall, ClientError, CopyInfo, Fault, FileKey, FileRecord,
    MemoryObjectClient, S3Store, S3StoreConfig, StorageAdapter, StoreError, UploadRules,
    WriteOptions,
};

const BUCKET: &str = "assets";

/// Test factory functions
fn create_store(config: S3StoreConfig) -> (Arc<MemoryObjectClient>, S3Store) {
    let client = Arc::new(MemoryObjectClient::new());
    let store = S3Store::with_client(client.clone(), config).unwrap();
    (client, store)
}

fn private_config() -> S3StoreConfig {
    S3StoreConfig::new("images", BUCKET)
}

fn create_shop_key(filename: &str) -> FileKey {
    FileKey::new(filename, 0).with_partition_tag("shop-1")
}

async fn collect(mut stream: ByteStream) -> (Vec<u8>, Vec<StoreError>) {
    let mut data = Vec::new();
    let mut errors = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                assert!(!chunk.is_empty(), "empty chunk emitted");
                data.extend_from_slice(&chunk);
            }
            Err(err) => errors.push(err),
        }
    }
    (data, errors)
}

fn uploaded_parts(calls: &[ClientCall]) -> Vec<(i32, usize)> {
    calls
        .iter()
        .filter_map(|call| match call {
            ClientCall::UploadPart { part_number, len, .. } => Some((*part_number, *len)),
            _ => None,
        })
        .collect()
}

fn count_calls(calls: &[ClientCall], pred: impl Fn(&ClientCall) -> bool) -> usize {
    calls.iter().filter(|call| pred(call)).count()
}

/// W1. Chunks are uploaded as ordered parts and finalized in order
#[tokio::test]
async fn test_write_uploads_each_chunk_as_a_part() {
    let (client, store) = create_store(private_config());

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("a.txt"), WriteOptions::new()).await);
    assert_ok!(writer.write(Bytes::from_static(b"abc")).await);
    assert_ok!(writer.write(Bytes::from_static(b"defgh")).await);
    assert_eq!(writer.bytes_written(), 8);
    let stored = assert_ok!(writer.finish().await);

    assert_eq!(stored.size, 8);
    assert!(stored.file_key.starts_with("shop-1/"));
    assert!(stored.file_key.ends_with("-a.txt"));
    assert_eq!(stored.external_url, None);

    let calls = client.calls().await;
    assert_eq!(uploaded_parts(&calls), vec![(1, 3), (2, 5)]);
    match calls.last() {
        Some(ClientCall::CompleteMultipartUpload { parts, key, .. }) => {
            assert_eq!(key, &stored.file_key);
            let numbers: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
            assert_eq!(numbers, vec![1, 2]);
        }
        other => panic!("expected finalize as last call, got {:?}", other),
    }

    let object = client.object(BUCKET, &stored.file_key).await.unwrap();
    assert_eq!(object, Bytes::from_static(b"abcdefgh"));
}

/// W2. Keys without a partition tag carry no prefix
#[tokio::test]
async fn test_write_without_partition_tag() {
    let (_client, store) = create_store(private_config());

    let writer = assert_ok!(store.write_stream(&FileKey::new("b.bin", 0), WriteOptions::new()).await);
    let stored = assert_ok!(writer.finish().await);

    assert!(!stored.file_key.contains('/'));
    assert!(stored.file_key.ends_with("-b.bin"));
    assert_eq!(stored.size, 0);
}

/// W3. Public stores report a CDN URL built from the object key
#[tokio::test]
async fn test_public_store_reports_external_url() {
    let config = private_config().public("https://cdn.example.com/");
    let (client, store) = create_store(config);

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("c.png"), WriteOptions::new()).await);
    assert_ok!(writer.write(Bytes::from_static(b"png")).await);
    let stored = assert_ok!(writer.finish().await);

    // whole file in one chunk is a single part
    assert_eq!(uploaded_parts(&client.calls().await), vec![(1, 3)]);

    assert_eq!(
        stored.external_url,
        Some(format!("https://cdn.example.com/{}", stored.file_key))
    );
}

/// W3b. One-byte chunks each get their own consecutive part number
#[tokio::test]
async fn test_one_byte_chunks_number_parts_consecutively() {
    let (client, store) = create_store(private_config());
    let count = 50;

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("bytes"), WriteOptions::new()).await);
    for i in 0..count {
        assert_ok!(writer.write(Bytes::from(vec![b'a' + (i % 26) as u8])).await);
    }
    let stored = assert_ok!(writer.finish().await);

    assert_eq!(stored.size, count as u64);

    let calls = client.calls().await;
    let expected: Vec<(i32, usize)> = (1..=count as i32).map(|n| (n, 1)).collect();
    assert_eq!(uploaded_parts(&calls), expected);
    match calls.last() {
        Some(ClientCall::CompleteMultipartUpload { parts, .. }) => {
            let numbers: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
            assert_eq!(numbers, (1..=count as i32).collect::<Vec<_>>());
        }
        other => panic!("expected finalize as last call, got {:?}", other),
    }
}

/// W4. The ACL attribute is only sent when configured
#[tokio::test]
async fn test_object_acl_is_optional() {
    let (client, store) = create_store(private_config());
    let writer = assert_ok!(store.write_stream(&create_shop_key("d"), WriteOptions::new()).await);
    assert_ok!(writer.finish().await);

    let (acl_client, acl_store) = create_store(private_config().with_object_acl("public-read"));
    let options = WriteOptions::new().with_content_type("image/png");
    let writer = assert_ok!(acl_store.write_stream(&create_shop_key("d"), options).await);
    assert_ok!(writer.finish().await);

    match &client.calls().await[0] {
        ClientCall::CreateMultipartUpload { acl, content_type, .. } => {
            assert_eq!(acl, &None);
            assert_eq!(content_type, &None);
        }
        other => panic!("unexpected first call {:?}", other),
    }
    match &acl_client.calls().await[0] {
        ClientCall::CreateMultipartUpload { acl, content_type, .. } => {
            assert_eq!(acl.as_deref(), Some("public-read"));
            assert_eq!(content_type.as_deref(), Some("image/png"));
        }
        other => panic!("unexpected first call {:?}", other),
    }
}

/// W5. A failed initiation sends nothing else to the backend
#[tokio::test]
async fn test_init_failure_stops_before_parts() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::CreateUpload).await;

    let result = store.write_stream(&create_shop_key("e"), WriteOptions::new()).await;
    assert!(matches!(result, Err(StoreError::UploadInit { source: Some(_), .. })));

    let calls = client.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(client.pending_uploads().await, 0);
}

/// W6. A failed part surfaces as a write error and aborts the upload
#[tokio::test]
async fn test_part_failure_aborts_upload() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::UploadPart(2)).await;

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("f"), WriteOptions::new()).await);
    assert_ok!(writer.write(Bytes::from_static(b"first")).await);

    let err = assert_err!(writer.write(Bytes::from_static(b"second")).await);
    assert!(matches!(err, StoreError::PartUpload { part_number: 2, .. }));

    let err = assert_err!(writer.finish().await);
    assert!(matches!(err, StoreError::UploadAbandoned { .. }));

    let calls = client.calls().await;
    assert_eq!(
        count_calls(&calls, |c| matches!(c, ClientCall::AbortMultipartUpload { .. })),
        1
    );
    assert_eq!(
        count_calls(&calls, |c| matches!(c, ClientCall::CompleteMultipartUpload { .. })),
        0
    );
    assert_eq!(client.object_count().await, 0);
}

/// W7. A rejected finalize is reported and the upload aborted
#[tokio::test]
async fn test_finalize_failure() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::Complete).await;

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("g"), WriteOptions::new()).await);
    assert_ok!(writer.write(Bytes::from_static(b"data")).await);

    let err = assert_err!(writer.finish().await);
    assert!(matches!(err, StoreError::Finalize { .. }));
    assert_eq!(client.pending_uploads().await, 0);
    assert_eq!(client.object_count().await, 0);
}

/// W8. Coalescing rules group small chunks into larger parts
#[tokio::test]
async fn test_part_coalescing() {
    let config = private_config().with_upload_rules(UploadRules::new().with_min_part_bytes(5));
    let (client, store) = create_store(config);

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("h"), WriteOptions::new()).await);
    for chunk in ["ab", "cde", "f", "ghijk", "l"] {
        assert_ok!(writer.write(Bytes::from(chunk)).await);
    }
    let stored = assert_ok!(writer.finish().await);

    assert_eq!(stored.size, 12);
    assert_eq!(uploaded_parts(&client.calls().await), vec![(1, 5), (2, 6), (3, 1)]);
    assert_eq!(
        client.object(BUCKET, &stored.file_key).await.unwrap(),
        Bytes::from_static(b"abcdefghijkl")
    );
}

/// W9. store() drives a source stream to completion
#[tokio::test]
async fn test_store_drives_source_stream() {
    let (client, store) = create_store(private_config());

    let source: ByteStream = Box::pin(futures::stream::iter(vec![
        Ok::<_, StoreError>(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"world")),
    ]));
    let stored = assert_ok!(store.store(&create_shop_key("i.txt"), WriteOptions::new(), source).await);

    assert_eq!(stored.size, 11);
    assert_eq!(
        client.object(BUCKET, &stored.file_key).await.unwrap(),
        Bytes::from_static(b"hello world")
    );
}

/// W10. A source error aborts the upload and is returned unchanged
#[tokio::test]
async fn test_store_aborts_on_source_error() {
    let (client, store) = create_store(private_config());

    let source: ByteStream = Box::pin(futures::stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(StoreError::from(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "client went away",
        ))),
    ]));
    let err = assert_err!(store.store(&create_shop_key("j"), WriteOptions::new(), source).await);

    assert!(matches!(err, StoreError::Io { .. }));
    assert_eq!(client.pending_uploads().await, 0);
    assert_eq!(client.object_count().await, 0);
}

/// R1. A range read yields exactly the inclusive window
#[tokio::test]
async fn test_range_read_yields_window() {
    let (client, store) = create_store(private_config().with_read_chunk_bytes(3));
    client.insert_object(BUCKET, "shop-1/1-k", Bytes::from_static(b"0123456789")).await;

    let key = FileKey::new("k", 10).with_id("shop-1/1-k");
    let stream = assert_ok!(store.read_stream(&key, Some(ByteRange::new(2, 5))).await);
    let (data, errors) = collect(stream).await;

    assert!(errors.is_empty());
    assert_eq!(data, b"2345");
    assert_eq!(
        client.calls().await,
        vec![ClientCall::GetObject {
            key: "shop-1/1-k".to_string(),
            range: Some(ByteRange::new(2, 5)),
        }]
    );
}

/// R1b. Every inclusive window is emitted exactly, whatever the pull size
#[tokio::test]
async fn test_every_window_at_every_pull_size() {
    let content: &[u8] = b"0123456789";

    for chunk_bytes in [1, 2, 3, 7, 100] {
        let (client, store) = create_store(private_config().with_read_chunk_bytes(chunk_bytes));
        client.insert_object(BUCKET, "digits", Bytes::from_static(content)).await;
        let key = FileKey::new("digits", content.len() as u64).with_id("digits");

        for start in 0..content.len() as u64 {
            for end in start..content.len() as u64 {
                let stream = assert_ok!(store.read_stream(&key, Some(ByteRange::new(start, end))).await);
                let (data, errors) = collect(stream).await;

                assert!(errors.is_empty(), "errors for {}-{} at {}", start, end, chunk_bytes);
                assert_eq!(
                    data,
                    &content[start as usize..=end as usize],
                    "window {}-{} at pull size {}",
                    start,
                    end,
                    chunk_bytes
                );
            }
        }
    }
}

/// R2. An unranged read yields the whole object
#[tokio::test]
async fn test_full_read() {
    let (client, store) = create_store(private_config().with_read_chunk_bytes(4));
    client.insert_object(BUCKET, "obj", Bytes::from_static(b"0123456789")).await;

    let stream = assert_ok!(store.read_stream(&FileKey::new("obj", 10).with_id("obj"), None).await);
    let (data, errors) = collect(stream).await;

    assert!(errors.is_empty());
    assert_eq!(data, b"0123456789");
}

/// R2b. The recorded size bounds an unranged read even when the object is larger
#[tokio::test]
async fn test_recorded_size_bounds_full_read() {
    let (client, store) = create_store(private_config().with_read_chunk_bytes(4));
    client.insert_object(BUCKET, "grown", Bytes::from_static(b"0123456789")).await;

    let stream = assert_ok!(store.read_stream(&FileKey::new("grown", 6).with_id("grown"), None).await);
    let (data, errors) = collect(stream).await;

    assert!(errors.is_empty());
    assert_eq!(data, b"012345");
}

/// R3. Backend failures arrive on the stream, not when opening it
#[tokio::test]
async fn test_fetch_errors_arrive_on_stream() {
    let (client, store) = create_store(private_config());

    let missing = FileKey::new("gone", 5).with_id("gone");
    let stream = assert_ok!(store.read_stream(&missing, None).await);
    let (data, errors) = collect(stream).await;
    assert!(data.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_not_found());

    client.insert_object(BUCKET, "there", Bytes::from_static(b"abc")).await;
    client.inject(Fault::GetObject).await;
    let stream = assert_ok!(store.read_stream(&FileKey::new("there", 3).with_id("there"), None).await);
    let (_, errors) = collect(stream).await;
    assert!(matches!(
        errors.as_slice(),
        [StoreError::BackendFetch { source: ClientError::Service { .. }, .. }]
    ));
}

/// R4. Keys without an id and inverted ranges never reach the backend
#[tokio::test]
async fn test_invalid_reads_skip_backend() {
    let (client, store) = create_store(private_config());

    let stream = assert_ok!(store.read_stream(&FileKey::new("x", 3), None).await);
    let (_, errors) = collect(stream).await;
    assert!(matches!(errors.as_slice(), [StoreError::MissingObjectId]));

    let key = FileKey::new("x", 10).with_id("x");
    let stream = assert_ok!(store.read_stream(&key, Some(ByteRange::new(5, 2))).await);
    let (_, errors) = collect(stream).await;
    assert!(matches!(errors.as_slice(), [StoreError::InvalidRange { start: 5, end: 2 }]));

    assert!(client.calls().await.is_empty());
}

/// W11. Aborting a writer after a failed part succeeds without a second abort
#[tokio::test]
async fn test_abort_after_failed_part() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::UploadPart(1)).await;

    let mut writer = assert_ok!(store.write_stream(&create_shop_key("m"), WriteOptions::new()).await);
    assert_err!(writer.write(Bytes::from_static(b"x")).await);
    assert_ok!(writer.abort().await);

    let calls = client.calls().await;
    assert_eq!(
        count_calls(&calls, |c| matches!(c, ClientCall::AbortMultipartUpload { .. })),
        1
    );
}

/// W12. A rejected abort is reported as an abort failure
#[tokio::test]
async fn test_rejected_abort() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::AbortUpload).await;

    let writer = assert_ok!(store.write_stream(&create_shop_key("n"), WriteOptions::new()).await);
    let err = assert_err!(writer.abort().await);
    assert!(matches!(err, StoreError::Abort { .. }));
    assert_eq!(client.pending_uploads().await, 1);
}

/// D1. Removing a key without an id is a repeatable no-op
#[tokio::test]
async fn test_remove_without_id_is_noop() {
    let (client, store) = create_store(private_config());
    let key = FileKey::new("never-stored", 0);

    assert_ok!(store.remove(&key).await);
    assert_ok!(store.remove(&key).await);
    assert!(client.calls().await.is_empty());
}

/// D2. Remove deletes the object and tolerates an already missing one
#[tokio::test]
async fn test_remove_deletes_object() {
    let (client, store) = create_store(private_config());
    client.insert_object(BUCKET, "shop-1/1-z", Bytes::from_static(b"z")).await;
    let key = FileKey::new("z", 1).with_id("shop-1/1-z");

    assert_ok!(store.remove(&key).await);
    assert_eq!(client.object_count().await, 0);
    assert_ok!(store.remove(&key).await);
}

/// D3. Backend delete failures are reported
#[tokio::test]
async fn test_remove_failure() {
    let (client, store) = create_store(private_config());
    client.inject(Fault::DeleteObject).await;

    let err = assert_err!(store.remove(&FileKey::new("z", 1).with_id("z")).await);
    assert!(matches!(err, StoreError::Deletion { ref key, .. } if key == "z"));
}

/// K1. Derived keys feed the full write then read cycle
#[tokio::test]
async fn test_round_trip_through_derived_keys() {
    let (_client, store) = create_store(private_config());
    let record = FileRecord::new("rec-7", "Media")
        .with_name("notes.txt")
        .with_metadata("shopId", 42);

    let key = store.file_key(&record);
    assert_eq!(key.partition_tag.as_deref(), Some("42"));

    let mut writer = assert_ok!(store.write_stream(&key, WriteOptions::new()).await);
    assert_ok!(writer.write(Bytes::from_static(b"remember")).await);
    let stored = assert_ok!(writer.finish().await);
    assert!(stored.file_key.starts_with("42/"));

    let record = record.with_copy(
        "images",
        CopyInfo::new()
            .with_key(stored.file_key.clone())
            .with_size(stored.size),
    );
    let key = store.file_key(&record);
    assert_eq!(key.id.as_deref(), Some(stored.file_key.as_str()));
    assert_eq!(key.filename, "notes.txt");

    let stream = assert_ok!(store.read_stream(&key, None).await);
    let (data, errors) = collect(stream).await;
    assert!(errors.is_empty());
    assert_eq!(data, b"remember");
}

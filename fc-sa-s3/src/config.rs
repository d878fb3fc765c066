use crate::{StoreError, StoreResult};

/// Default prefix prepended to the adapter name to build the collection name
pub const DEFAULT_COLLECTION_PREFIX: &str = "fc_sa_s3.";

/// Metadata field that carries the partition tag by default
pub const DEFAULT_PARTITION_FIELD: &str = "shopId";

/// Default pull size for read streams (matches a typical stream high-water mark)
pub const DEFAULT_READ_CHUNK_BYTES: usize = 16 * 1024;

/// Configuration for an S3 storage adapter
#[derive(Debug, Clone)]
pub struct S3StoreConfig {
    /// Adapter name, used to look up per-adapter copy info on file records
    pub name: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers; implies path-style addressing
    pub endpoint: Option<String>,
    pub bucket: String,
    /// Public base address (CDN) used to build external URLs
    pub public_cdn_base: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Canned ACL sent on upload initiation; omitted entirely when `None`
    pub object_acl: Option<String>,
    pub is_public: bool,
    pub collection_prefix: String,
    pub partition_field: String,
    /// Prefix write keys with the partition tag when one is present
    pub partition_keys: bool,
    pub read_chunk_bytes: usize,
    pub upload_rules: UploadRules,
}

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            region: None,
            endpoint: None,
            bucket: String::new(),
            public_cdn_base: None,
            access_key_id: None,
            secret_access_key: None,
            object_acl: None,
            is_public: false,
            collection_prefix: DEFAULT_COLLECTION_PREFIX.to_string(),
            partition_field: DEFAULT_PARTITION_FIELD.to_string(),
            partition_keys: true,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            upload_rules: UploadRules::default(),
        }
    }
}

/// Rules for multipart writes
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Buffer chunks until this many bytes are pending before sending a part.
    /// Zero sends every chunk as its own part.
    pub min_part_bytes: usize,

    /// Abort the multipart upload when a part or the finalize call fails
    pub abort_on_failure: bool,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            min_part_bytes: 0,
            abort_on_failure: true,
        }
    }
}

impl UploadRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coalesce chunks into parts of at least `bytes` (S3 requires 5 MiB for non-final parts)
    pub fn with_min_part_bytes(mut self, bytes: usize) -> Self {
        self.min_part_bytes = bytes;
        self
    }

    /// Leave failed uploads open on the backend
    pub fn keep_failed_uploads(mut self) -> Self {
        self.abort_on_failure = false;
        self
    }
}

impl S3StoreConfig {
    pub fn new<N: Into<String>, B: Into<String>>(name: N, bucket: B) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Build a config from the process environment
    pub fn from_env<N: Into<String>>(name: N) -> StoreResult<Self> {
        Self::from_lookup(name, |key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source using the environment variable names
    pub fn from_lookup<N, F>(name: N, lookup: F) -> StoreResult<Self>
    where
        N: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bucket = get("AWS_S3_BUCKET").ok_or_else(|| {
            StoreError::configuration("AWS_S3_BUCKET environment variable required")
        })?;

        let is_public = match get("AWS_S3_PUBLIC") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                StoreError::configuration(format!("AWS_S3_PUBLIC has invalid value {:?}", value))
            })?,
            None => false,
        };

        let config = Self {
            region: get("AWS_S3_REGION"),
            endpoint: get("AWS_S3_ENDPOINT"),
            public_cdn_base: get("CDN_ENDPOINT"),
            access_key_id: get("AWS_ACCESS_KEY_ID"),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            object_acl: get("AWS_S3_OBJECT_ACL"),
            is_public,
            ..Self::new(name, bucket)
        };

        tracing::debug!(
            bucket = %config.bucket,
            region = ?config.region,
            endpoint = ?config.endpoint,
            cdn = ?config.public_cdn_base,
            "Loaded S3 store configuration"
        );

        Ok(config)
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials<K: Into<String>, S: Into<String>>(mut self, key_id: K, secret: S) -> Self {
        self.access_key_id = Some(key_id.into());
        self.secret_access_key = Some(secret.into());
        self
    }

    pub fn with_object_acl<S: Into<String>>(mut self, acl: S) -> Self {
        self.object_acl = Some(acl.into());
        self
    }

    /// Mark the store public; stored objects get `{cdn_base}/{key}` as external URL
    pub fn public<S: Into<String>>(mut self, cdn_base: S) -> Self {
        self.is_public = true;
        self.public_cdn_base = Some(cdn_base.into());
        self
    }

    pub fn with_collection_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.collection_prefix = prefix.into();
        self
    }

    pub fn with_partition_field<S: Into<String>>(mut self, field: S) -> Self {
        self.partition_field = field.into();
        self
    }

    pub fn without_partitioning(mut self) -> Self {
        self.partition_keys = false;
        self
    }

    pub fn with_read_chunk_bytes(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = bytes;
        self
    }

    pub fn with_upload_rules(mut self, rules: UploadRules) -> Self {
        self.upload_rules = rules;
        self
    }

    pub fn collection_name(&self) -> String {
        format!("{}{}", self.collection_prefix, self.name).trim().to_string()
    }

    /// Public base address when the store is configured as publicly readable
    pub fn public_base(&self) -> Option<&str> {
        if self.is_public {
            self.public_cdn_base.as_deref()
        } else {
            None
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::configuration("bucket name is required"));
        }
        if self.is_public && self.public_cdn_base.as_deref().map_or(true, str::is_empty) {
            return Err(StoreError::configuration(
                "a public store requires a public CDN base address",
            ));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StoreError::configuration(
                "access key id and secret access key must be given together",
            ));
        }
        if self.read_chunk_bytes == 0 {
            return Err(StoreError::configuration("read chunk size must be positive"));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

use thiserror::Error;

/// Result type for storage adapter operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for object storage client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the storage adapter to its callers
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to fetch object {key}: {source}")]
    BackendFetch {
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("File key has no object id to read from")]
    MissingObjectId,

    #[error("Invalid byte range: {start}-{end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Could not start multipart upload for {key}: {reason}")]
    UploadInit {
        key: String,
        reason: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error("Upload of part {part_number} failed for upload {upload_id}: {source}")]
    PartUpload {
        upload_id: String,
        part_number: i32,
        #[source]
        source: ClientError,
    },

    #[error("Failed to complete upload {upload_id}: {source}")]
    Finalize {
        upload_id: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to abort upload {upload_id}: {source}")]
    Abort {
        upload_id: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to delete object {key}: {source}")]
    Deletion {
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Upload {upload_id} was abandoned after a failed part")]
    UploadAbandoned { upload_id: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the error means the object does not exist in the backend
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BackendFetch {
                source: ClientError::NoSuchKey { .. },
                ..
            }
        )
    }
}

/// Errors reported by an object storage client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No such key: {key}")]
    NoSuchKey { key: String },

    #[error("No such upload: {upload_id}")]
    NoSuchUpload { upload_id: String },

    #[error("Invalid part list: {message}")]
    InvalidPart { message: String },

    #[error("Requested range not satisfiable: {message}")]
    InvalidRange { message: String },

    #[error("Backend did not return an upload id")]
    MissingUploadId,

    #[error("Backend did not return an ETag for part {part_number}")]
    MissingETag { part_number: i32 },

    #[error("Object storage service error: {source}")]
    Service {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ClientError {
    /// Wrap any transport or service error
    pub fn service<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Service {
            source: Box::new(error),
        }
    }

    pub fn invalid_part<S: Into<String>>(message: S) -> Self {
        Self::InvalidPart {
            message: message.into(),
        }
    }

    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. })
    }

    pub fn is_no_such_upload(&self) -> bool {
        matches!(self, Self::NoSuchUpload { .. })
    }
}

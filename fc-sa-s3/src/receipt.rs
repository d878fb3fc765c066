use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion record of a successful write, handed to the framework so it can
/// record the new object id on the file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    /// Object key returned by the backend at finalize time
    pub file_key: String,
    pub stored_at: DateTime<Utc>,
    /// Sum of all chunk lengths acknowledged by the backend
    pub size: u64,
    /// Public address of the object; only set for public stores
    pub external_url: Option<String>,
}

impl StoredResult {
    pub fn new<S: Into<String>>(file_key: S, size: u64) -> Self {
        Self {
            file_key: file_key.into(),
            stored_at: Utc::now(),
            size,
            external_url: None,
        }
    }

    pub fn with_external_url(mut self, url: Option<String>) -> Self {
        self.external_url = url;
        self
    }

    pub fn with_stored_at(mut self, stored_at: DateTime<Utc>) -> Self {
        self.stored_at = stored_at;
        self
    }

    pub fn is_public(&self) -> bool {
        self.external_url.is_some()
    }
}

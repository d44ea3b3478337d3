// # Object Store Traits
//
// Interfaces for uploading objects and issuing temporary credentials.
//
// ## Implementations
//
// - COS (`CosClient`) and STS (`StsClient`): `svckit-tencentcloud` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options for a single upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Content-Type header
    pub content_type: Option<String>,
    /// Canned ACL (e.g. "private", "public-read")
    pub acl: Option<String>,
}

impl PutOptions {
    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the canned ACL
    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    /// Object key
    pub key: String,
    /// ETag reported by the store
    pub etag: Option<String>,
    /// CRC64 reported by the store
    pub crc64: Option<String>,
}

/// Trait for object store implementations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body` under `key`
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<PutReceipt, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// A time-boxed, scope-restricted credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryCredential {
    /// Temporary secret id
    pub tmp_secret_id: String,
    /// Temporary secret key
    /// ⚠️ NEVER log this value
    pub tmp_secret_key: String,
    /// Session token to send alongside the key pair
    /// ⚠️ NEVER log this value
    pub session_token: String,
    /// Issue time (unix seconds, local clock)
    pub start_time: u64,
    /// Expiry time (unix seconds)
    pub expired_time: u64,
}

impl std::fmt::Debug for TemporaryCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredential")
            .field("tmp_secret_id", &self.tmp_secret_id)
            .field("tmp_secret_key", &"<REDACTED>")
            .field("session_token", &"<REDACTED>")
            .field("start_time", &self.start_time)
            .field("expired_time", &self.expired_time)
            .finish()
    }
}

/// Trait for temporary credential issuers
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue a temporary credential for the given request
    async fn issue(
        &self,
        request: &crate::config::StsConfig,
    ) -> Result<TemporaryCredential, crate::Error>;
}

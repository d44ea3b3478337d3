//! COS object storage client
//!
//! Objects are uploaded with a signed `PUT {bucket_url}/{key}`. With
//! temporary credentials the STS session token travels as
//! `x-cos-security-token`.
//!
//! ## Security Requirements
//!
//! - The secret key and session token NEVER appear in logs or Debug output

use async_trait::async_trait;
use percent_encoding::{AsciiSet, utf8_percent_encode};
use std::time::Duration;
use svckit_core::config::CosClientConfig;
use svckit_core::traits::{ObjectStore, PutOptions, PutReceipt, TemporaryCredential};
use svckit_core::{Error, Result};

use crate::sign::{Credential, UNRESERVED};

/// How long a request signature stays valid (in seconds)
const SIGNATURE_LIFETIME_SECS: i64 = 3600;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const CRC64_HEADER: &str = "x-cos-hash-crc64ecma";

/// Extensions accepted by [`CosClient::upload_image`]
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "gif", "jpeg", "webp"];

/// Error message for rejected image uploads
pub const IMAGE_REJECTED_MESSAGE: &str =
    "upload failed: only png, jpg, gif, jpeg, webp files are allowed";

/// Key characters kept as-is in the request path
const KEY_PATH: &AsciiSet = &UNRESERVED.remove(b'/');

static CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_XZ);

/// CRC-64/XZ (ECMA-182, reflected) of `data`, as COS reports it
pub fn crc64_ecma(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Content type of an image file name, `None` if it is not an accepted image
pub fn image_content_type(file_name: &str) -> Option<&'static str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Whether `file_name` has one of the accepted image extensions
pub fn is_image(file_name: &str) -> bool {
    image_content_type(file_name).is_some()
}

/// A file received from a client, e.g. one multipart form part
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original file name; only its extension is used
    pub file_name: String,
    pub body: Vec<u8>,
}

/// COS client for one bucket
pub struct CosClient {
    http: reqwest::Client,
    bucket_url: String,
    host: String,
    credential: Credential,
    enable_crc: bool,
}

impl std::fmt::Debug for CosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosClient")
            .field("bucket_url", &self.bucket_url)
            .field("credential", &self.credential)
            .field("enable_crc", &self.enable_crc)
            .finish()
    }
}

impl CosClient {
    /// Create a client from `config`
    pub fn new(config: &CosClientConfig) -> Result<Self> {
        config.validate()?;

        let url = reqwest::Url::parse(&config.bucket_url)
            .map_err(|e| Error::config(format!("Invalid COS bucket URL {}: {}", config.bucket_url, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::config(format!(
                    "COS bucket URL has no host: {}",
                    config.bucket_url
                )));
            }
        };

        let mut credential = Credential::new(config.secret_id.clone(), config.secret_key.clone());
        if config.is_sts {
            credential = credential.with_token(config.session_token.clone());
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            bucket_url: config.bucket_url.trim_end_matches('/').to_string(),
            host,
            credential,
            enable_crc: config.enable_crc,
        })
    }

    /// Create a client that signs with a temporary credential
    pub fn with_temporary_credential(
        credential: &TemporaryCredential,
        bucket_url: impl Into<String>,
        enable_crc: bool,
    ) -> Result<Self> {
        Self::new(&CosClientConfig {
            secret_id: credential.tmp_secret_id.clone(),
            secret_key: credential.tmp_secret_key.clone(),
            session_token: credential.session_token.clone(),
            bucket_url: bucket_url.into(),
            enable_crc,
            is_sts: true,
        })
    }

    /// Upload `body` under `key`, returning the response status with the receipt
    async fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(u16, PutReceipt)> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(Error::invalid_input("Object key cannot be empty"));
        }

        let path = format!("/{}", key);
        let url = format!("{}/{}", self.bucket_url, utf8_percent_encode(key, KEY_PATH));

        let mut headers: Vec<(&str, &str)> = vec![("host", self.host.as_str())];
        if let Some(content_type) = &options.content_type {
            headers.push(("content-type", content_type.as_str()));
        }
        if let Some(acl) = &options.acl {
            headers.push(("x-cos-acl", acl.as_str()));
        }

        let start = chrono::Utc::now().timestamp();
        let authorization = self.credential.cos_authorization(
            "PUT",
            &path,
            &[],
            &headers,
            start,
            start + SIGNATURE_LIFETIME_SECS,
        )?;

        let mut request = self
            .http
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, authorization);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }
        if let Some(token) = &self.credential.token {
            request = request.header("x-cos-security-token", token);
        }

        let expected_crc = self.enable_crc.then(|| crc64_ecma(&body));

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| Error::http(format!("cos request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::from_status("cos", status.as_u16(), "put object", &text));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let receipt = PutReceipt {
            key: key.to_string(),
            etag: header("etag").map(|etag| etag.trim_matches('"').to_string()),
            crc64: header(CRC64_HEADER),
        };

        if let Some(expected) = expected_crc {
            let reported = receipt.crc64.as_deref().ok_or_else(|| {
                Error::storage(format!("{} missing from upload response", CRC64_HEADER))
            })?;
            if reported != expected.to_string() {
                return Err(Error::storage(format!(
                    "CRC64 mismatch for {}: local {}, server {}",
                    key, expected, reported
                )));
            }
        }

        tracing::debug!("Uploaded {} ({})", key, status);
        Ok((status.as_u16(), receipt))
    }

    /// Upload an image with a private ACL and return its URL
    ///
    /// Files without a png, jpg, gif, jpeg or webp extension are rejected
    /// before any request is made. Any status other than 200 is an error.
    /// The returned URL is `secret_url` followed by `key`.
    pub async fn upload_image(&self, upload: ImageUpload, secret_url: &str, key: &str) -> Result<String> {
        let content_type = image_content_type(&upload.file_name)
            .ok_or_else(|| Error::invalid_input(IMAGE_REJECTED_MESSAGE))?;

        let options = PutOptions::default()
            .with_content_type(content_type)
            .with_acl("private");

        let (status, _) = self.put(key, upload.body, &options).await?;
        if status != 200 {
            return Err(Error::storage(format!(
                "upload failed: unexpected status {}",
                status
            )));
        }

        Ok(format!("{}{}", secret_url, key))
    }
}

#[async_trait]
impl ObjectStore for CosClient {
    async fn put_object(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<PutReceipt> {
        self.put(key, body, options).await.map(|(_, receipt)| receipt)
    }

    fn store_name(&self) -> &'static str {
        "cos"
    }
}

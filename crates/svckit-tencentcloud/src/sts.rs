//! Temporary COS credentials through STS `GetFederationToken`

use async_trait::async_trait;
use percent_encoding::utf8_percent_encode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use svckit_core::config::StsConfig;
use svckit_core::traits::{CredentialIssuer, TemporaryCredential};
use svckit_core::{Error, Result};

use crate::api::ApiClient;
use crate::sign::{Credential, UNRESERVED};

/// Default STS endpoint
pub const STS_ENDPOINT_DEFAULT: &str = "sts.tencentcloudapi.com";

const STS_VERSION: &str = "2018-08-13";
const STS_ACTION: &str = "GetFederationToken";
/// Federated user name shown in the audit log
const FEDERATION_NAME: &str = "cos-sts";
const STS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct Policy<'a> {
    version: &'static str,
    statement: [Statement<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Statement<'a> {
    action: &'a [String],
    effect: &'static str,
    resource: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FederationTokenRequest {
    name: &'static str,
    policy: String,
    duration_seconds: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FederationTokenResponse {
    credentials: Credentials,
    #[serde(default)]
    expired_time: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials {
    token: String,
    tmp_secret_id: String,
    tmp_secret_key: String,
}

/// Policy document for a normalized request
fn policy_json(config: &StsConfig) -> Result<String> {
    let policy = Policy {
        version: "2.0",
        statement: [Statement {
            action: &config.actions,
            effect: config.effect.as_str(),
            resource: &config.resources,
        }],
    };
    Ok(serde_json::to_string(&policy)?)
}

/// STS client
///
/// Holds no credentials; each request carries the permanent key pair it is
/// signed with.
#[derive(Debug, Clone)]
pub struct StsClient {
    endpoint: String,
}

impl Default for StsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StsClient {
    pub fn new() -> Self {
        Self {
            endpoint: STS_ENDPOINT_DEFAULT.to_string(),
        }
    }

    /// Use another endpoint (host or full URL)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Issue a temporary credential scoped by `config`
    ///
    /// Defaults are applied first: 3600s lifetime, post/put/get object on the
    /// whole bucket.
    pub async fn get_temporary_credential(&self, config: &StsConfig) -> Result<TemporaryCredential> {
        config.validate()?;
        let config = config.clone().with_defaults();

        let api = ApiClient::new(
            &self.endpoint,
            "sts",
            STS_VERSION,
            config.region.clone(),
            Credential::new(config.secret_id.clone(), config.secret_key.clone()),
            STS_TIMEOUT,
        )?;

        let request = FederationTokenRequest {
            name: FEDERATION_NAME,
            policy: utf8_percent_encode(&policy_json(&config)?, UNRESERVED).to_string(),
            duration_seconds: config.duration_seconds,
        };

        let start_time = u64::try_from(chrono::Utc::now().timestamp())
            .map_err(|_| Error::Other("System clock is before the unix epoch".to_string()))?;

        let response: FederationTokenResponse = api.call(STS_ACTION, &request).await?;

        // duration_seconds is within 1..=7200 after normalization
        let expired_time = response
            .expired_time
            .unwrap_or(start_time + config.duration_seconds as u64);

        tracing::info!(
            "Issued temporary credential for bucket {} ({}), expires at {}",
            config.bucket,
            config.effect.as_str(),
            expired_time
        );

        Ok(TemporaryCredential {
            tmp_secret_id: response.credentials.tmp_secret_id,
            tmp_secret_key: response.credentials.tmp_secret_key,
            session_token: response.credentials.token,
            start_time,
            expired_time,
        })
    }
}

#[async_trait]
impl CredentialIssuer for StsClient {
    async fn issue(&self, request: &StsConfig) -> Result<TemporaryCredential> {
        self.get_temporary_credential(request).await
    }
}

/// Issue a temporary credential through the default STS endpoint
pub async fn get_temporary_credential(config: &StsConfig) -> Result<TemporaryCredential> {
    StsClient::new().get_temporary_credential(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use svckit_core::config::Effect;

    fn config() -> StsConfig {
        StsConfig {
            app_id: "1250000000".to_string(),
            secret_id: "id".to_string(),
            secret_key: "key".to_string(),
            bucket: "photos-1250000000".to_string(),
            region: "ap-guangzhou".to_string(),
            actions: Vec::new(),
            effect: Effect::default(),
            duration_seconds: 0,
            resources: Vec::new(),
        }
    }

    #[test]
    fn test_default_policy() {
        let json = policy_json(&config().with_defaults()).unwrap();
        assert_eq!(
            json,
            r#"{"version":"2.0","statement":[{"action":["name/cos:PostObject","name/cos:PutObject","name/cos:GetObject"],"effect":"deny","resource":["qcs::cos:ap-guangzhou:uid/1250000000:photos-1250000000/*"]}]}"#
        );
    }

    #[test]
    fn test_allow_policy_with_custom_scope() {
        let mut config = config();
        config.effect = Effect::Allow;
        config.actions = vec!["name/cos:PutObject".to_string()];
        config.resources = vec!["qcs::cos:ap-guangzhou:uid/1250000000:photos-1250000000/avatars/*".to_string()];

        let json = policy_json(&config.with_defaults()).unwrap();
        assert!(json.contains(r#""effect":"allow""#));
        assert!(json.contains(r#""action":["name/cos:PutObject"]"#));
        assert!(json.contains("/avatars/*"));
    }

    #[test]
    fn test_request_encoding() {
        let request = FederationTokenRequest {
            name: FEDERATION_NAME,
            policy: utf8_percent_encode(r#"{"version":"2.0"}"#, UNRESERVED).to_string(),
            duration_seconds: 3600,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "Name": "cos-sts",
                "Policy": "%7B%22version%22%3A%222.0%22%7D",
                "DurationSeconds": 3600
            })
        );
    }
}

//! Tencent Cloud API 3.0 client
//!
//! Every action is a signed `POST /` with a JSON payload. Responses are
//! wrapped in a common envelope:
//!
//! ```json
//! {"Response": {"...": "...", "RequestId": "..."}}
//! {"Response": {"Error": {"Code": "AuthFailure.SignatureFailure", "Message": "..."}, "RequestId": "..."}}
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use svckit_core::{Error, Result};

use crate::sign::{Credential, TC3_CONTENT_TYPE};

/// Shared client for one service/version pair
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    /// Host header value, signed
    host: String,
    service: &'static str,
    version: &'static str,
    region: String,
    credential: Credential,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("service", &self.service)
            .field("version", &self.version)
            .field("region", &self.region)
            .field("credential", &self.credential)
            .finish()
    }
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

impl ApiClient {
    /// Create a client for `https://{endpoint}`
    pub fn new(
        endpoint: &str,
        service: &'static str,
        version: &'static str,
        region: impl Into<String>,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", endpoint.trim_end_matches('/'))
        };
        let url = reqwest::Url::parse(&base_url)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {}", endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::config(format!("Endpoint has no host: {}", endpoint))),
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            host,
            service,
            version,
            region: region.into(),
            credential,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Call `action` and decode the unwrapped response
    pub async fn call<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(request)?;
        let timestamp = chrono::Utc::now().timestamp();
        let authorization =
            self.credential
                .tc3_authorization(self.service, &self.host, timestamp, &payload)?;

        let mut builder = self
            .http
            .post(format!("{}/", self.base_url))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, TC3_CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", self.version)
            .header("X-TC-Timestamp", timestamp.to_string());
        if !self.region.is_empty() {
            builder = builder.header("X-TC-Region", &self.region);
        }
        if let Some(token) = &self.credential.token {
            builder = builder.header("X-TC-Token", token);
        }

        tracing::debug!("Calling {}:{} ({})", self.service, action, self.version);

        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", self.service, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read {} response: {}", self.service, e)))?;

        if !status.is_success() {
            return Err(Error::from_status(self.service, status.as_u16(), action, &body));
        }

        self.unwrap_envelope(&body)
    }

    fn unwrap_envelope<Resp: DeserializeOwned>(&self, body: &str) -> Result<Resp> {
        let Envelope { response } = serde_json::from_str(body).map_err(|e| {
            Error::provider(self.service, format!("Failed to parse response: {}", e))
        })?;

        if let Some(error) = response.get("Error") {
            let error: ApiError = serde_json::from_value(error.clone()).map_err(|e| {
                Error::provider(self.service, format!("Failed to parse error: {}", e))
            })?;
            let request_id = response
                .get("RequestId")
                .and_then(|id| id.as_str())
                .unwrap_or_default();
            tracing::warn!(
                "{} returned {} (request id {})",
                self.service,
                error.code,
                request_id
            );
            return Err(Error::provider(
                self.service,
                format!("[{}] {}", error.code, error.message),
            ));
        }

        serde_json::from_value(response).map_err(|e| {
            Error::provider(self.service, format!("Unexpected response shape: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> ApiClient {
        ApiClient::new(
            endpoint,
            "sms",
            "2021-01-11",
            "ap-guangzhou",
            Credential::new("id", "key"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_forms() {
        let api = client("sms.tencentcloudapi.com");
        assert_eq!(api.base_url, "https://sms.tencentcloudapi.com");
        assert_eq!(api.host, "sms.tencentcloudapi.com");

        let api = client("http://127.0.0.1:8080/");
        assert_eq!(api.base_url, "http://127.0.0.1:8080");
        assert_eq!(api.host, "127.0.0.1:8080");
    }

    #[test]
    fn test_envelope_error() {
        let api = client("sms.tencentcloudapi.com");
        let body = r#"{"Response":{"Error":{"Code":"AuthFailure.SecretIdNotFound","Message":"The SecretId is not found"},"RequestId":"r-1"}}"#;

        let err = api.unwrap_envelope::<serde_json::Value>(body).unwrap_err();
        match err {
            Error::Provider { provider, message } => {
                assert_eq!(provider, "sms");
                assert_eq!(message, "[AuthFailure.SecretIdNotFound] The SecretId is not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_envelope_success() {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Reply {
            request_id: String,
        }

        let api = client("sms.tencentcloudapi.com");
        let reply: Reply = api
            .unwrap_envelope(r#"{"Response":{"RequestId":"r-2"}}"#)
            .unwrap();
        assert_eq!(reply.request_id, "r-2");
    }
}

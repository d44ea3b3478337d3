//! Tencent Cloud SMS (`SendSms`, version 2021-01-11)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use svckit_core::config::SmsConfig;
use svckit_core::traits::{SendReceipt, SendStatus, SmsMessage, SmsSender};
use svckit_core::Result;

use crate::api::ApiClient;
use crate::sign::Credential;

const SMS_VERSION: &str = "2021-01-11";
const SMS_ACTION: &str = "SendSms";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsRequest<'a> {
    phone_number_set: &'a [String],
    sms_sdk_app_id: &'a str,
    sign_name: &'a str,
    template_id: &'a str,
    template_param_set: &'a [String],
    session_context: &'a str,
    extend_code: &'static str,
    sender_id: &'static str,
}

impl<'a> From<&'a SmsMessage> for SendSmsRequest<'a> {
    fn from(message: &'a SmsMessage) -> Self {
        Self {
            phone_number_set: &message.phone_numbers,
            sms_sdk_app_id: &message.sdk_app_id,
            sign_name: &message.sign_name,
            template_id: &message.template_id,
            template_param_set: &message.template_params,
            session_context: &message.session_context,
            extend_code: "",
            sender_id: "",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsResponse {
    #[serde(default)]
    send_status_set: Vec<SendStatusItem>,
    request_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase", default)]
#[derive(Default)]
struct SendStatusItem {
    serial_no: String,
    phone_number: String,
    fee: u64,
    code: String,
    message: String,
    iso_code: String,
}

impl From<SendStatusItem> for SendStatus {
    fn from(item: SendStatusItem) -> Self {
        Self {
            serial_no: item.serial_no,
            phone_number: item.phone_number,
            fee: item.fee,
            code: item.code,
            message: item.message,
            iso_code: item.iso_code,
        }
    }
}

/// SMS client
#[derive(Debug)]
pub struct SmsClient {
    api: ApiClient,
}

impl SmsClient {
    /// Create a client; a zero timeout selects 60 seconds
    pub fn new(config: SmsConfig) -> Result<Self> {
        let config = config.with_defaults();
        config.validate()?;

        let api = ApiClient::new(
            &config.endpoint,
            "sms",
            SMS_VERSION,
            config.region.clone(),
            Credential::new(config.secret_id.clone(), config.secret_key.clone()),
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self { api })
    }

    /// Send a templated message to up to 200 recipients
    ///
    /// Per-recipient rejections are reported in the receipt, not as an error.
    pub async fn send_sms(&self, message: &SmsMessage) -> Result<SendReceipt> {
        message.validate()?;

        let response: SendSmsResponse = self
            .api
            .call(SMS_ACTION, &SendSmsRequest::from(message))
            .await?;

        let receipt = SendReceipt {
            request_id: response.request_id,
            statuses: response.send_status_set.into_iter().map(SendStatus::from).collect(),
        };

        let failed = receipt.failed().count();
        if failed > 0 {
            tracing::warn!(
                "SMS template {}: {} of {} recipient(s) rejected (request id {})",
                message.template_id,
                failed,
                receipt.statuses.len(),
                receipt.request_id
            );
        } else {
            tracing::info!(
                "SMS template {} sent to {} recipient(s)",
                message.template_id,
                receipt.statuses.len()
            );
        }

        Ok(receipt)
    }
}

#[async_trait]
impl SmsSender for SmsClient {
    async fn send(&self, message: &SmsMessage) -> Result<SendReceipt> {
        self.send_sms(message).await
    }

    fn sender_name(&self) -> &'static str {
        "tencentcloud-sms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> SmsMessage {
        SmsMessage {
            sdk_app_id: "1400006666".to_string(),
            sign_name: "svckit".to_string(),
            template_id: "449739".to_string(),
            template_params: vec!["1234".to_string(), "5".to_string()],
            phone_numbers: vec!["+8613711112222".to_string()],
            session_context: "user-42".to_string(),
        }
    }

    #[test]
    fn test_request_body() {
        let message = message();
        let json = serde_json::to_value(SendSmsRequest::from(&message)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "PhoneNumberSet": ["+8613711112222"],
                "SmsSdkAppId": "1400006666",
                "SignName": "svckit",
                "TemplateId": "449739",
                "TemplateParamSet": ["1234", "5"],
                "SessionContext": "user-42",
                "ExtendCode": "",
                "SenderId": ""
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let response: SendSmsResponse = serde_json::from_str(
            r#"{
                "SendStatusSet": [{
                    "SerialNo": "5000:1045710669157053657849499619",
                    "PhoneNumber": "+8613711112222",
                    "Fee": 1,
                    "SessionContext": "user-42",
                    "Code": "Ok",
                    "Message": "send success",
                    "IsoCode": "CN"
                }],
                "RequestId": "a0aabda6-cf91-4f3e-a81f-9198114a2279"
            }"#,
        )
        .unwrap();

        let status = SendStatus::from(response.send_status_set.into_iter().next().unwrap());
        assert!(status.is_ok());
        assert_eq!(status.fee, 1);
        assert_eq!(status.iso_code, "CN");
        assert_eq!(response.request_id, "a0aabda6-cf91-4f3e-a81f-9198114a2279");
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(SmsClient::new(SmsConfig::default()).is_err());

        let client = SmsClient::new(SmsConfig {
            secret_id: "id".to_string(),
            secret_key: "key".to_string(),
            region: "ap-guangzhou".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.sender_name(), "tencentcloud-sms");
    }
}

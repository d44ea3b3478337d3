//! STS and SMS actions against a mock API 3.0 endpoint

use svckit_core::config::{Effect, SmsConfig, StsConfig};
use svckit_core::traits::{CredentialIssuer, SmsMessage, SmsSender};
use svckit_core::Error;
use svckit_tencentcloud::{SmsClient, StsClient};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sts_request() -> StsConfig {
    StsConfig {
        app_id: "1250000000".to_string(),
        secret_id: "AKIDexample".to_string(),
        secret_key: "sts-secret-key".to_string(),
        bucket: "photos-1250000000".to_string(),
        region: "ap-guangzhou".to_string(),
        actions: Vec::new(),
        effect: Effect::Allow,
        duration_seconds: 1800,
        resources: Vec::new(),
    }
}

fn sms_client(server: &MockServer) -> SmsClient {
    SmsClient::new(SmsConfig {
        secret_id: "AKIDexample".to_string(),
        secret_key: "sms-secret-key".to_string(),
        region: "ap-guangzhou".to_string(),
        timeout_secs: 5,
        endpoint: server.uri(),
    })
    .unwrap()
}

fn message(phone_numbers: &[&str]) -> SmsMessage {
    SmsMessage {
        sdk_app_id: "1400006666".to_string(),
        sign_name: "svckit".to_string(),
        template_id: "449739".to_string(),
        template_params: vec!["1234".to_string()],
        phone_numbers: phone_numbers.iter().map(|n| n.to_string()).collect(),
        session_context: String::new(),
    }
}

#[tokio::test]
async fn federation_token_is_requested_and_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-TC-Action", "GetFederationToken"))
        .and(header("X-TC-Version", "2018-08-13"))
        .and(header("X-TC-Region", "ap-guangzhou"))
        .and(header_exists("Authorization"))
        .and(body_partial_json(serde_json::json!({
            "Name": "cos-sts",
            "DurationSeconds": 1800
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Response": {
                "Credentials": {
                    "Token": "session-token",
                    "TmpSecretId": "AKIDtmp",
                    "TmpSecretKey": "tmp-secret-key"
                },
                "ExpiredTime": 1700001800u64,
                "Expiration": "2023-11-14T22:43:20Z",
                "RequestId": "r-sts"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let issuer = StsClient::new().with_endpoint(server.uri());
    let credential = issuer.issue(&sts_request()).await.unwrap();

    assert_eq!(credential.tmp_secret_id, "AKIDtmp");
    assert_eq!(credential.tmp_secret_key, "tmp-secret-key");
    assert_eq!(credential.session_token, "session-token");
    assert_eq!(credential.expired_time, 1700001800);
    assert!(credential.start_time > 0);

    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0].headers.get("Authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("TC3-HMAC-SHA256 Credential=AKIDexample/"));
    assert!(authorization.contains("/sts/tc3_request"));
    assert!(!authorization.contains("sts-secret-key"));

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let policy = body["Policy"].as_str().unwrap();
    assert!(policy.starts_with("%7B%22version%22%3A%222.0%22"));
    assert!(policy.contains("allow"));
}

#[tokio::test]
async fn federation_token_expiry_defaults_to_duration() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Response": {
                "Credentials": {
                    "Token": "t",
                    "TmpSecretId": "id",
                    "TmpSecretKey": "key"
                },
                "RequestId": "r-sts"
            }
        })))
        .mount(&server)
        .await;

    let credential = StsClient::new()
        .with_endpoint(server.uri())
        .get_temporary_credential(&sts_request())
        .await
        .unwrap();
    assert_eq!(credential.expired_time, credential.start_time + 1800);
}

#[tokio::test]
async fn federation_token_api_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Response": {
                "Error": {
                    "Code": "AuthFailure.SignatureFailure",
                    "Message": "The provided credentials could not be validated."
                },
                "RequestId": "r-err"
            }
        })))
        .mount(&server)
        .await;

    let err = StsClient::new()
        .with_endpoint(server.uri())
        .get_temporary_credential(&sts_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));
    assert!(err.to_string().contains("AuthFailure.SignatureFailure"));
}

#[tokio::test]
async fn federation_token_rejects_incomplete_request_without_calling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut request = sts_request();
    request.bucket.clear();

    let err = StsClient::new()
        .with_endpoint(server.uri())
        .get_temporary_credential(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn sms_receipt_lists_every_recipient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-TC-Action", "SendSms"))
        .and(header("X-TC-Version", "2021-01-11"))
        .and(body_partial_json(serde_json::json!({
            "PhoneNumberSet": ["+8613711112222", "+8613711113333"],
            "SmsSdkAppId": "1400006666",
            "TemplateId": "449739"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Response": {
                "SendStatusSet": [
                    {
                        "SerialNo": "5000:1",
                        "PhoneNumber": "+8613711112222",
                        "Fee": 1,
                        "SessionContext": "",
                        "Code": "Ok",
                        "Message": "send success",
                        "IsoCode": "CN"
                    },
                    {
                        "SerialNo": "",
                        "PhoneNumber": "+8613711113333",
                        "Fee": 0,
                        "SessionContext": "",
                        "Code": "LimitExceeded.PhoneNumberDailyLimit",
                        "Message": "daily limit reached",
                        "IsoCode": "CN"
                    }
                ],
                "RequestId": "r-sms"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = sms_client(&server);
    let receipt = client
        .send(&message(&["+8613711112222", "+8613711113333"]))
        .await
        .unwrap();

    assert_eq!(receipt.request_id, "r-sms");
    assert_eq!(receipt.statuses.len(), 2);
    assert!(receipt.statuses[0].is_ok());

    let failed: Vec<_> = receipt.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].phone_number, "+8613711113333");
}

#[tokio::test]
async fn sms_invalid_message_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = sms_client(&server).send(&message(&[])).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn sms_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = sms_client(&server)
        .send(&message(&["+8613711112222"]))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

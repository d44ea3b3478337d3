// # Tencent Cloud Integrations
//
// Clients for the Tencent Cloud services svckit talks to:
//
// - STS: temporary, policy-scoped COS credentials (`GetFederationToken`)
// - COS: signed object uploads with CRC64 verification
// - SMS: templated text messages (`SendSms`)
//
// API 3.0 calls (STS, SMS) are signed with TC3-HMAC-SHA256; COS requests
// carry the sha1 `q-sign-algorithm` authorization.
//
// ## Security Requirements
//
// - Secret keys and session tokens NEVER appear in logs or Debug output

pub mod api;
pub mod cos;
pub mod sign;
pub mod sms;
pub mod sts;

pub use api::ApiClient;
pub use cos::{CosClient, ImageUpload, crc64_ecma, is_image};
pub use sign::Credential;
pub use sms::SmsClient;
pub use sts::{StsClient, get_temporary_credential};

//! Request signing
//!
//! - [`Credential::tc3_authorization`]: TC3-HMAC-SHA256 for Tencent Cloud API 3.0
//!   (STS, SMS)
//! - [`Credential::cos_authorization`]: the `q-sign-algorithm=sha1` scheme of
//!   the COS XML API

use chrono::DateTime;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use svckit_core::{Error, Result};

/// Content type of every API 3.0 request
pub const TC3_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const TC3_ALGORITHM: &str = "TC3-HMAC-SHA256";
const TC3_SIGNED_HEADERS: &str = "content-type;host";

/// RFC 3986 unreserved characters stay as they are
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A secret id/key pair, optionally with an STS session token
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    /// ⚠️ NEVER log this value
    pub secret_key: String,
    /// ⚠️ NEVER log this value
    pub token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<REDACTED>")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

fn hmac_sha256(key: &[u8], msg: &str) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| Error::invalid_input(format!("Invalid HMAC key: {}", e)))?;
    mac.update(msg.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hmac_sha1_hex(key: &[u8], msg: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key)
        .map_err(|e| Error::invalid_input(format!("Invalid HMAC key: {}", e)))?;
    mac.update(msg.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

impl Credential {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    /// `Authorization` header for an API 3.0 `POST /` with a JSON payload
    ///
    /// The scope date is the UTC date of `timestamp`.
    pub fn tc3_authorization(
        &self,
        service: &str,
        host: &str,
        timestamp: i64,
        payload: &str,
    ) -> Result<String> {
        let canonical_request = format!(
            "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
            TC3_CONTENT_TYPE,
            host,
            TC3_SIGNED_HEADERS,
            sha256_hex(payload)
        );

        let date = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| Error::invalid_input(format!("Invalid timestamp: {}", timestamp)))?
            .format("%Y-%m-%d")
            .to_string();
        let scope = format!("{}/{}/tc3_request", date, service);

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            TC3_ALGORITHM,
            timestamp,
            scope,
            sha256_hex(&canonical_request)
        );

        let secret_date = hmac_sha256(format!("TC3{}", self.secret_key).as_bytes(), &date)?;
        let secret_service = hmac_sha256(&secret_date, service)?;
        let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
        let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            TC3_ALGORITHM, self.secret_id, scope, TC3_SIGNED_HEADERS, signature
        ))
    }

    /// `Authorization` header for a COS XML API request
    ///
    /// `params` and `headers` are the query parameters and headers covered by
    /// the signature; names are matched case-insensitively. The signature is
    /// valid from `start` to `end` (unix seconds).
    pub fn cos_authorization(
        &self,
        method: &str,
        path: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        start: i64,
        end: i64,
    ) -> Result<String> {
        let key_time = format!("{};{}", start, end);
        let sign_key = hmac_sha1_hex(self.secret_key.as_bytes(), &key_time)?;

        let (param_list, param_string) = cos_canonical_pairs(params);
        let (header_list, header_string) = cos_canonical_pairs(headers);

        let http_string = format!(
            "{}\n{}\n{}\n{}\n",
            method.to_lowercase(),
            path,
            param_string,
            header_string
        );
        let string_to_sign = format!(
            "sha1\n{}\n{}\n",
            key_time,
            hex::encode(Sha1::digest(http_string.as_bytes()))
        );
        let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign)?;

        Ok(format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={kt}&q-key-time={kt}&q-header-list={}&q-url-param-list={}&q-signature={}",
            self.secret_id,
            header_list,
            param_list,
            signature,
            kt = key_time
        ))
    }
}

/// Lowercase, encode and sort name/value pairs
///
/// Returns the `;`-joined name list and the `&`-joined `name=value` string.
fn cos_canonical_pairs(pairs: &[(&str, &str)]) -> (String, String) {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(name, value)| {
            (
                utf8_percent_encode(&name.to_lowercase(), UNRESERVED).to_string(),
                utf8_percent_encode(value, UNRESERVED).to_string(),
            )
        })
        .collect();
    encoded.sort();

    let names = encoded
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let joined = encoded
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");
    (names, joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tc3_authorization() {
        let credential = Credential::new(
            "AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE",
            "Gu5t9xGARNpq86cd98joQYCN3EXAMPLE",
        );
        let payload = r#"{"Limit": 1, "Filters": [{"Values": ["\u672a\u547d\u540d"], "Name": "instance-name"}]}"#;

        let authorization = credential
            .tc3_authorization("cvm", "cvm.tencentcloudapi.com", 1551113065, payload)
            .unwrap();

        assert_eq!(
            authorization,
            "TC3-HMAC-SHA256 Credential=AKIDz8krbsJ5yKBZQpn74WFkmLPx3EXAMPLE/2019-02-25/cvm/tc3_request, \
             SignedHeaders=content-type;host, \
             Signature=72e494ea809ad7a8c8f7a4507b9bddcbaa8e581f516e8da2f66e2c5a96525168"
        );
    }

    #[test]
    fn test_cos_authorization() {
        let credential = Credential::new(
            "AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q",
            "BQYIM75p8x0iWVFSIgqEKwFprpRSVHlz",
        );

        let authorization = credential
            .cos_authorization(
                "PUT",
                "/exampleobject(腾讯云)",
                &[],
                &[
                    ("Host", "examplebucket-1250000000.cos.ap-beijing.myqcloud.com"),
                    ("Content-Type", "text/plain"),
                    ("x-cos-acl", "private"),
                ],
                1557989753,
                1557996953,
            )
            .unwrap();

        assert_eq!(
            authorization,
            "q-sign-algorithm=sha1&q-ak=AKIDQjz3ltompVjBni5LitkWHFlFpwkn9U5q\
             &q-sign-time=1557989753;1557996953&q-key-time=1557989753;1557996953\
             &q-header-list=content-type;host;x-cos-acl&q-url-param-list=\
             &q-signature=a1c2ef59c0102b240690c1d7c2dcaf0266f51f4e"
        );
    }

    #[test]
    fn test_canonical_pairs_sorted_and_encoded() {
        let (names, joined) = cos_canonical_pairs(&[("X-Cos-Meta-Tag", "a b"), ("Host", "h")]);
        assert_eq!(names, "host;x-cos-meta-tag");
        assert_eq!(joined, "host=h&x-cos-meta-tag=a%20b");
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let credential = Credential::new("id", "super-secret-key").with_token("session-token");
        let debug_str = format!("{:?}", credential);
        assert!(!debug_str.contains("super-secret-key"));
        assert!(!debug_str.contains("session-token"));
    }
}

// Access tokens for servers with auth enabled
//
// POST `{context}/v1/auth/login` with `username` and `password` form fields
// returns `{"accessToken": "...", "tokenTtl": 18000, "globalAdmin": false}`.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Longest token lifetime honored, whatever the server reports
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub access_token: String,
    /// Token lifetime (in seconds)
    #[serde(default)]
    pub token_ttl: u64,
}

/// A cached access token
pub(crate) struct AccessToken {
    value: String,
    refresh_at: Instant,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<REDACTED>")
            .field("refresh_at", &self.refresh_at)
            .finish()
    }
}

impl AccessToken {
    /// Token refreshed once 90% of its lifetime has passed
    pub fn from_login(response: LoginResponse, now: Instant) -> Self {
        let ttl = Duration::from_secs(response.token_ttl).min(MAX_TOKEN_LIFETIME);
        let lifetime = ttl - ttl / 10;
        Self {
            value: response.access_token,
            refresh_at: now.checked_add(lifetime).unwrap_or(now),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

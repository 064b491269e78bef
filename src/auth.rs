//! Azure AD client-credentials token exchange
//!
//! Posts the service principal's id and secret to the v1 token endpoint
//! (`{authority}/{tenant}/oauth2/token`) and returns the bearer token used for
//! every store request in a cycle.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Tokens this many seconds from expiry are treated as expired
pub const EXPIRY_SKEW_SECS: i64 = 300;

/// Bearer token plus the instant it stops being valid
#[derive(Clone)]
pub struct AccessToken {
    /// Raw bearer token
    pub secret: String,
    /// Expiry reported by the token endpoint
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token can still be used at `now`, allowing for [`EXPIRY_SKEW_SECS`]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) < self.expires_on
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Client credentials for one token request
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Service principal id
    pub client_id: &'a str,
    /// Service principal secret
    pub client_secret: &'a str,
    /// Audience the token is issued for
    pub resource: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
    expires_on: Option<Value>,
}

// The v1 endpoint reports numeric fields as strings, v2 as numbers
fn seconds_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange client credentials for a bearer token
///
/// # Errors
///
/// - [`Error::Network`] if the endpoint cannot be reached
/// - [`Error::Auth`] if the endpoint rejects the credentials or answers with
///   something that does not contain a token
pub async fn acquire_token(
    http: &reqwest::Client,
    token_url: &Url,
    request: TokenRequest<'_>,
    now: DateTime<Utc>,
) -> Result<AccessToken> {
    debug!(url = %token_url, client_id = request.client_id, "requesting access token");

    let response = http
        .post(token_url.clone())
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
            ("resource", request.resource),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{}: {}", err.error, first_line(&desc)),
                None => err.error,
            },
            Err(_) => format!("token endpoint returned {}", status),
        };
        return Err(Error::Auth(reason));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| Error::Auth(format!("unreadable token response: {}", e)))?;

    let secret = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Auth("token response has no access_token".to_string()))?;

    let expires_on = parsed
        .expires_on
        .as_ref()
        .and_then(seconds_field)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .or_else(|| {
            parsed
                .expires_in
                .as_ref()
                .and_then(seconds_field)
                .map(|secs| now + ChronoDuration::seconds(secs))
        })
        .ok_or_else(|| Error::Auth("token response has no expiry".to_string()))?;

    Ok(AccessToken { secret, expires_on })
}

// AAD descriptions carry trace and correlation ids on later lines
fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s).trim()
}

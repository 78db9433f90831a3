//! Caller identity from the `X-Rh-Identity` header
//!
//! The header is base64-encoded JSON:
//! `{"identity":{"org_id":"..","account_number":"..","user":{"username":".."}}}`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use fleetcfg_client::OrgContext;

use crate::api::error::AppError;

/// Header carrying the caller identity
pub const IDENTITY_HEADER: &str = "x-rh-identity";

#[derive(Debug, Deserialize)]
struct Envelope {
    identity: RawIdentity,
}

#[derive(Debug, Deserialize)]
struct RawIdentity {
    #[serde(default)]
    org_id: String,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    username: Option<String>,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub org_id: String,
    pub account_number: Option<String>,
    pub username: Option<String>,
    /// Header value as received, forwarded to the inventory service
    pub raw: String,
}

impl Identity {
    /// Decode a header value
    ///
    /// # Errors
    /// Rejects invalid base64, invalid JSON and an empty org id
    pub fn decode(header: &str) -> Result<Self, AppError> {
        let bytes = STANDARD
            .decode(header.trim())
            .map_err(|e| AppError::bad_request(format!("invalid identity encoding: {e}")))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::bad_request(format!("invalid identity document: {e}")))?;

        let identity = envelope.identity;
        if identity.org_id.is_empty() {
            return Err(AppError::bad_request("identity has no org_id"));
        }

        Ok(Self {
            org_id: identity.org_id,
            account_number: identity.account_number.filter(|a| !a.is_empty()),
            username: identity.user.and_then(|u| u.username),
            raw: header.to_string(),
        })
    }

    /// Context for calls made on the caller's behalf
    #[must_use]
    pub fn org_context(&self) -> OrgContext {
        OrgContext::new(self.org_id.clone())
            .with_account(self.account_number.clone())
            .with_identity(self.raw.clone())
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(IDENTITY_HEADER)
            .ok_or_else(|| AppError::bad_request("missing X-Rh-Identity header"))?
            .to_str()
            .map_err(|_| AppError::bad_request("X-Rh-Identity header is not ASCII"))?;
        Self::decode(header)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;

    fn encode(value: &serde_json::Value) -> String {
        STANDARD.encode(value.to_string())
    }

    #[test]
    fn test_decode_full_identity() {
        let header = encode(&json!({
            "identity": {
                "org_id": "78606",
                "account_number": "0000001",
                "user": {"username": "jdoe"},
            }
        }));

        let identity = Identity::decode(&header).unwrap();

        assert_eq!(identity.org_id, "78606");
        assert_eq!(identity.account_number.as_deref(), Some("0000001"));
        assert_eq!(identity.username.as_deref(), Some("jdoe"));
        let org = identity.org_context();
        assert_eq!(org.identity.as_deref(), Some(header.as_str()));
    }

    #[test]
    fn test_empty_account_is_none() {
        let header = encode(&json!({"identity": {"org_id": "1", "account_number": ""}}));

        let identity = Identity::decode(&header).unwrap();

        assert_eq!(identity.account_number, None);
        assert_eq!(identity.username, None);
    }

    #[test]
    fn test_rejects_bad_input() {
        for header in [
            "%%%".to_string(),
            STANDARD.encode("not json"),
            encode(&json!({"identity": {"account_number": "1"}})),
        ] {
            let err = Identity::decode(&header).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }
}

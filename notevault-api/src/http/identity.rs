//! Identity extraction (§6): the caller's tenant id is the first non-empty
//! value among a chain of reverse-proxy-injected headers, with a `?user=`
//! query fallback enabled only in development mode. There is no session or
//! token validation here — the core trusts whatever sits in front of it to
//! have already authenticated the request and injected one of these headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use super::{AppError, AppState};

const IDENTITY_HEADERS: &[&str] = &[
    "x-auth-request-email",
    "x-forwarded-email",
    "x-auth-request-user",
    "x-forwarded-user",
    "x-user",
];

/// The authenticated caller's tenant id, extracted once per request.
pub struct Identity(pub String);

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        for header in IDENTITY_HEADERS {
            if let Some(value) = parts.headers.get(*header).and_then(|v| v.to_str().ok()) {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(Self(value.to_string()));
                }
            }
        }

        if state.config.server.development_mode {
            if let Some(user) = query_param(parts.uri.query().unwrap_or(""), "user") {
                if !user.is_empty() {
                    return Ok(Self(user));
                }
            }
        }

        Err(AppError::new(StatusCode::UNAUTHORIZED, "no identity header present"))
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key {
            Some(percent_encoding::percent_decode_str(v).decode_utf8_lossy().into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_decodes_percent_encoding() {
        assert_eq!(query_param("user=alice%40example.com", "user"), Some("alice@example.com".to_string()));
    }

    #[test]
    fn query_param_missing_key_is_none() {
        assert_eq!(query_param("foo=bar", "user"), None);
    }
}

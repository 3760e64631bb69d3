//! # Authentication
//!
//! Optional API key gate. When `CERTIS_API_KEY` is set, every request except
//! `GET /health` must carry `Authorization: Bearer <key>`.

use super::types::ApiFailure;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

pub const API_KEY_ENV: &str = "CERTIS_API_KEY";

/// The configured key, or `None` when unset or empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Constant-time comparison over equal-length padded buffers.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let len = provided.len().max(expected.len());
    let mut a = vec![0u8; len];
    let mut b = vec![0u8; len];
    a[..provided.len()].copy_from_slice(provided);
    b[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = a.ct_eq(&b).into();
    bytes_match && provided.len() == expected.len()
}

fn unauthorized(reason: &'static str) -> ApiFailure {
    tracing::warn!(event = "auth_failure", reason, "Authentication failed");
    ApiFailure::new(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
}

/// Bearer key middleware. Raw keys without the `Bearer ` prefix are accepted.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiFailure> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => Err(unauthorized("invalid_api_key")),
        None => Err(unauthorized("missing_authorization_header")),
    }
}

//! API handlers and shared utilities.
//!
//! Handlers marshal HTTP in and out of [`crate::auth::AuthService`]; every
//! decision with an invariant behind it lives in the auth core, not here.

pub mod auth;
pub mod health;
pub mod users;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::auth::rate_limit::{RateLimitAction, RateLimitDecision, RateLimiter};
use crate::auth::session::SessionClaims;
use crate::auth::{AuthError, AuthService};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Usernames: 3 to 32 lowercase alphanumerics or underscores.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[a-z0-9_]{3,32}$").is_ok_and(|re| re.is_match(username))
}

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// JSON error payload returned on every non-2xx response.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Message {
    pub message: String,
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn json_message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(Message {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Map an auth core error to its HTTP response.
///
/// Internal failures are logged in full but cross the boundary as an opaque
/// 500.
pub fn error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Conflict(message) => json_error(StatusCode::CONFLICT, message.clone()),
        AuthError::Unauthorized(message) => json_error(StatusCode::UNAUTHORIZED, *message),
        AuthError::Forbidden(message) => json_error(StatusCode::FORBIDDEN, *message),
        AuthError::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, *message),
        AuthError::NotFound(message) => json_error(StatusCode::NOT_FOUND, *message),
        AuthError::CorruptCredential | AuthError::Internal(_) => {
            error!("internal error: {err:?}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Pull the bearer token out of the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Best-effort client address for rate limiting, taken from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Run the rate limiter for one request; `Some` is the ready-made 429.
pub fn check_rate_limit(
    limiter: &dyn RateLimiter,
    headers: &HeaderMap,
    action: RateLimitAction,
) -> Option<Response> {
    let key = client_ip(headers);
    match limiter.check(key.as_deref(), action) {
        RateLimitDecision::Allowed => None,
        RateLimitDecision::Limited => Some(json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later",
        )),
    }
}

/// Authenticate the request from its bearer token.
///
/// # Errors
///
/// Returns a ready-made 401 response when the header is missing or the token
/// does not verify.
pub fn require_session(
    headers: &HeaderMap,
    service: &AuthService,
) -> Result<SessionClaims, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "Missing authorization header",
        ));
    };
    service
        .verify_session(token)
        .map_err(|err| error_response(&err))
}

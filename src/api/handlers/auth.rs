//! Registration, login and token-redemption handlers.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use super::{
    check_rate_limit, error_response, json_error, json_message, normalize_email,
    normalize_username, require_session, valid_email, valid_password, valid_username, ErrorBody,
    Message,
};
use crate::auth::rate_limit::{RateLimitAction, RateLimiter};
use crate::auth::store::PublicAccount;
use crate::auth::{AuthService, RegisterInput};

const FORGOT_PASSWORD_MESSAGE: &str = "If email exists, reset link has been sent";
const RESEND_VERIFICATION_MESSAGE: &str = "If email exists, a verification link has been sent";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    username: String,
    display_name: Option<String>,
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicAccount,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailRequest {
    email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    token: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email dispatched", body = PublicAccount),
        (status = 400, description = "Invalid username, email or password", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    if let Some(response) = check_rate_limit(&**limiter, &headers, RateLimitAction::Register) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let username = normalize_username(&payload.username);
    let email = normalize_email(&payload.email);
    if !valid_username(&username) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid username");
    }
    if !valid_email(&email) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid email");
    }
    if !valid_password(&payload.password) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid password");
    }

    let input = RegisterInput {
        username,
        display_name: payload
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        email,
        password: payload.password,
    };
    match service.register(input).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Unknown account or bad credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    if let Some(response) = check_rate_limit(&**limiter, &headers, RateLimitAction::Login) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&payload.email);
    match service.login(&email, &payload.password).await {
        Ok(outcome) => Json(LoginResponse {
            token: outcome.token,
            user: outcome.account,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Logout recorded", body = Message),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    service.logout(&claims);
    json_message(StatusCode::OK, "Logged out")
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Uniform response whether or not the email exists", body = Message),
        (status = 429, description = "Too many attempts", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<EmailRequest>>,
) -> Response {
    if let Some(response) = check_rate_limit(&**limiter, &headers, RateLimitAction::ForgotPassword)
    {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&payload.email);
    debug!("forgot password requested");
    match service.forgot_password(&email).await {
        Ok(()) => json_message(StatusCode::OK, FORGOT_PASSWORD_MESSAGE),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced, token consumed", body = Message),
        (status = 400, description = "Invalid or expired reset token", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    if let Some(response) = check_rate_limit(&**limiter, &headers, RateLimitAction::ResetPassword) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };
    if !valid_password(&payload.new_password) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid password");
    }

    match service
        .reset_password(&payload.token, &payload.new_password)
        .await
    {
        Ok(()) => json_message(StatusCode::OK, "Password has been reset"),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email marked verified, token consumed", body = Message),
        (status = 400, description = "Invalid or expired verification token", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Response {
    if let Some(response) = check_rate_limit(&**limiter, &headers, RateLimitAction::VerifyEmail) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    match service.verify_email(&payload.token).await {
        Ok(()) => json_message(StatusCode::OK, "Email verified"),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Uniform response whether or not the email exists", body = Message),
        (status = 429, description = "Too many attempts", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    service: Extension<Arc<AuthService>>,
    limiter: Extension<Arc<dyn RateLimiter>>,
    headers: HeaderMap,
    payload: Option<Json<EmailRequest>>,
) -> Response {
    if let Some(response) =
        check_rate_limit(&**limiter, &headers, RateLimitAction::ResendVerification)
    {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&payload.email);
    match service.resend_verification(&email).await {
        Ok(()) => json_message(StatusCode::OK, RESEND_VERIFICATION_MESSAGE),
        Err(err) => error_response(&err),
    }
}

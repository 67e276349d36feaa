//! Profile and account-management handlers. All of them require a session.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    error_response, json_error, json_message, normalize_email, normalize_username,
    require_session, valid_email, valid_password, valid_username, ErrorBody, Message,
};
use crate::auth::{AuthService, ProfileChanges, ProvisionInput};

/// Distinguishes an absent JSON field (leave untouched) from an explicit
/// `null` (clear the value).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    username: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    display_name: Option<Option<String>>,
    email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdatePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateUserRequest {
    username: String,
    display_name: Option<String>,
    email: String,
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account provisioned without a password", body = crate::auth::store::PublicAccount),
        (status = 400, description = "Invalid username or email", body = ErrorBody),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
        (status = 403, description = "Caller's email is not verified", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    payload: Option<Json<CreateUserRequest>>,
) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
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

    let input = ProvisionInput {
        username,
        display_name: payload
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        email,
    };
    match service.create_account(claims.sub, input).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "The authenticated account", body = crate::auth::store::PublicAccount),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn me(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    match service.get_account(claims.sub).await {
        Ok(account) => Json(account).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "All accounts, public fields only", body = [crate::auth::store::PublicAccount]),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    if let Err(response) = require_session(&headers, &service) {
        return response;
    }
    match service.list_accounts().await {
        Ok(accounts) => Json(accounts).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "The requested account, public fields only", body = crate::auth::store::PublicAccount),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
        (status = 404, description = "No such account", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(response) = require_session(&headers, &service) {
        return response;
    }
    match service.get_account(id).await {
        Ok(account) => Json(account).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Mutating routes are keyed by id but only the owner may touch them; there
/// are no admin roles.
fn owns(claims_sub: Uuid, id: Uuid) -> Result<(), Response> {
    if claims_sub == id {
        Ok(())
    } else {
        Err(json_error(
            StatusCode::FORBIDDEN,
            "Cannot modify another user's account",
        ))
    }
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = crate::auth::store::PublicAccount),
        (status = 400, description = "Invalid username or email", body = ErrorBody),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
        (status = 403, description = "Not the account owner", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_profile(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateProfileRequest>>,
) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    if let Err(response) = owns(claims.sub, id) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let username = payload.username.as_deref().map(normalize_username);
    if let Some(username) = &username {
        if !valid_username(username) {
            return json_error(StatusCode::BAD_REQUEST, "Invalid username");
        }
    }
    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        if !valid_email(email) {
            return json_error(StatusCode::BAD_REQUEST, "Invalid email");
        }
    }
    let display_name = payload.display_name.map(|name| {
        name.map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    });

    let changes = ProfileChanges {
        username,
        display_name,
        email,
    };
    match service.update_profile(id, changes).await {
        Ok(account) => Json(account).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/password",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = Message),
        (status = 400, description = "New password invalid or equal to the current one", body = ErrorBody),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
        (status = 403, description = "Current password mismatch or not the owner", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn update_password(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdatePasswordRequest>>,
) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    if let Err(response) = owns(claims.sub, id) {
        return response;
    }
    let Some(Json(payload)) = payload else {
        return json_error(StatusCode::BAD_REQUEST, "Missing payload");
    };
    if !valid_password(&payload.new_password) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid password");
    }

    match service
        .update_password(id, &payload.current_password, &payload.new_password)
        .await
    {
        Ok(()) => json_message(StatusCode::OK, "Password updated"),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deleted", body = Message),
        (status = 401, description = "Missing or invalid session token", body = ErrorBody),
        (status = 403, description = "Not the account owner", body = ErrorBody),
        (status = 404, description = "Account already gone", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let claims = match require_session(&headers, &service) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    if let Err(response) = owns(claims.sub, id) {
        return response;
    }
    match service.delete_account(id).await {
        Ok(()) => json_message(StatusCode::OK, "Account deleted"),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let absent: UpdateProfileRequest = serde_json::from_str("{}").expect("valid json");
        assert!(absent.display_name.is_none());

        let cleared: UpdateProfileRequest =
            serde_json::from_str(r#"{"display_name": null}"#).expect("valid json");
        assert_eq!(cleared.display_name, Some(None));

        let set: UpdateProfileRequest =
            serde_json::from_str(r#"{"display_name": "Alice"}"#).expect("valid json");
        assert_eq!(set.display_name, Some(Some("Alice".to_string())));
    }

    #[test]
    fn owns_rejects_other_accounts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(owns(a, a).is_ok());
        assert!(owns(a, b).is_err());
    }
}

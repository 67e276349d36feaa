//! OpenAPI document assembly. Served by Swagger UI at `/docs` and kept in
//! sync with the routes registered in [`super::router`].

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{auth, health, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::logout,
        auth::forgot_password,
        auth::reset_password,
        auth::verify_email,
        auth::resend_verification,
        users::me,
        users::list,
        users::create,
        users::get,
        users::update_profile,
        users::update_password,
        users::delete,
    ),
    components(schemas(
        super::handlers::ErrorBody,
        super::handlers::Message,
        health::Health,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::LoginResponse,
        auth::EmailRequest,
        auth::ResetPasswordRequest,
        auth::VerifyEmailRequest,
        users::CreateUserRequest,
        users::UpdateProfileRequest,
        users::UpdatePasswordRequest,
        crate::auth::store::PublicAccount,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "auth", description = "Registration, login and token redemption"),
        (name = "users", description = "Profile and account management"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_tags_and_paths() {
        let doc = openapi();
        let tags = doc.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "users"));
        assert!(doc.paths.paths.contains_key("/v1/auth/register"));
        assert!(doc.paths.paths.contains_key("/v1/auth/reset-password"));
        assert!(doc.paths.paths.contains_key("/v1/users/{id}/password"));
    }
}

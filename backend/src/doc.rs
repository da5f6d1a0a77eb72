//! OpenAPI document for the REST API.
//!
//! Served by Swagger UI in debug builds only.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{Error, ErrorCode, Post, User};
use crate::inbound::http::accounts::{RegisterBody, RegisteredBody};
use crate::inbound::http::posts::{CreatePostBody, UpdatePostBody};
use crate::inbound::http::users::LoginRequest;

/// Adds the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Encrypted session cookie issued by POST /api/v1/login.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Social backend API",
        description = "Posts with optimistic concurrency, account registration, and activation."
    ),
    servers((url = "/", description = "Relative to the deployment base URL")),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::posts::create_post,
        crate::inbound::http::posts::get_post,
        crate::inbound::http::posts::update_post,
        crate::inbound::http::posts::delete_post,
        crate::inbound::http::accounts::register,
        crate::inbound::http::accounts::activate,
        crate::inbound::http::users::login,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        Post,
        User,
        CreatePostBody,
        UpdatePostBody,
        RegisterBody,
        RegisteredBody,
        LoginRequest,
    )),
    tags(
        (name = "posts", description = "Versioned posts"),
        (name = "accounts", description = "Registration and activation"),
        (name = "users", description = "Session login"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

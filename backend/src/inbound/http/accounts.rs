//! Registration and activation handlers.
//!
//! ```text
//! POST /api/v1/auth/register {"username":"alice","email":"alice@x.com","password":"..."}
//! PUT  /api/v1/auth/activate/{token}
//! ```

use actix_web::{HttpResponse, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::domain::ports::Registration;
use crate::domain::{Error, PlaintextToken, RegistrationRequest, User};
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/v1/auth/register`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: Zeroizing<String>,
}

impl From<RegisterBody> for RegistrationRequest {
    fn from(body: RegisterBody) -> Self {
        Self {
            username: body.username,
            email: body.email,
            password: body.password,
        }
    }
}

/// Response for a successful registration.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredBody {
    pub user: User,
    /// Plaintext invitation token, as mailed.
    pub token: String,
    pub message: String,
}

impl From<Registration> for RegisteredBody {
    fn from(registration: Registration) -> Self {
        Self {
            user: registration.user,
            token: registration.token.as_str().to_owned(),
            message: "user registered; check your email to activate the account".to_owned(),
        }
    }
}

/// Register an account and mail its activation link.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterBody,
    responses(
        (status = 201, description = "Account created, invitation sent", body = RegisteredBody),
        (status = 400, description = "Invalid request", body = Error),
        (status = 409, description = "Username or email taken", body = Error),
        (status = 502, description = "Activation mail could not be delivered", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterBody>,
) -> ApiResult<HttpResponse> {
    let registration = state
        .registration
        .register(payload.into_inner().into())
        .await?;
    Ok(HttpResponse::Created().json(RegisteredBody::from(registration)))
}

/// Redeem an invitation token.
#[utoipa::path(
    put,
    path = "/api/v1/auth/activate/{token}",
    params(("token" = String, Path, description = "Invitation token from the activation mail")),
    responses(
        (status = 204, description = "Account activated"),
        (status = 400, description = "Malformed token", body = Error),
        (status = 404, description = "Unknown or already used token", body = Error),
        (status = 409, description = "Account already active", body = Error),
        (status = 410, description = "Token expired", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "activate",
    security([])
)]
#[put("/auth/activate/{token}")]
pub async fn activate(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let token = PlaintextToken::new(path.into_inner());
    state.activation.activate(&token).await?;
    Ok(HttpResponse::NoContent().finish())
}

//! Post API handlers.
//!
//! ```text
//! POST   /api/v1/posts        {"title":"..","content":"..","tags":["rust"]}
//! GET    /api/v1/posts/{id}
//! PATCH  /api/v1/posts/{id}   {"title":"..","version":3}
//! DELETE /api/v1/posts/{id}
//! ```

use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Error, NewPostRequest, Post, PostId, PostPatch, Version};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Request body for `POST /api/v1/posts`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<CreatePostBody> for NewPostRequest {
    fn from(body: CreatePostBody) -> Self {
        Self {
            title: body.title,
            content: body.content,
            tags: body.tags,
        }
    }
}

/// Request body for `PATCH /api/v1/posts/{id}`.
///
/// `version`, when present, must equal the stored version or the update is
/// refused with `409`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostBody {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    #[schema(value_type = Option<i32>)]
    pub version: Option<Version>,
}

impl From<UpdatePostBody> for PostPatch {
    fn from(body: UpdatePostBody) -> Self {
        Self {
            title: body.title,
            content: body.content,
            tags: body.tags,
            expected_version: body.version,
        }
    }
}

/// Create a post owned by the session user.
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = CreatePostBody,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Login required", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["posts"],
    operation_id = "createPost"
)]
#[post("/posts")]
pub async fn create_post(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<CreatePostBody>,
) -> ApiResult<HttpResponse> {
    let author = session.require_user_id()?;
    let post = state
        .posts
        .create_post(author, payload.into_inner().into())
        .await?;
    Ok(HttpResponse::Created().json(post))
}

/// Fetch a post by id.
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 404, description = "Unknown post", body = Error)
    ),
    tags = ["posts"],
    operation_id = "getPost",
    security([])
)]
#[get("/posts/{id}")]
pub async fn get_post(
    state: web::Data<HttpState>,
    path: web::Path<i64>,
) -> ApiResult<web::Json<Post>> {
    let post = state.posts.get_post(PostId::new(path.into_inner())).await?;
    Ok(web::Json(post))
}

/// Apply a partial update under optimistic concurrency control.
///
/// Concurrent writers are retried internally; `409` means the retry limit
/// ran out or the supplied `version` was stale.
#[utoipa::path(
    patch,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body = UpdatePostBody,
    responses(
        (status = 200, description = "Updated post", body = Post),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Login required", body = Error),
        (status = 403, description = "Not the post owner", body = Error),
        (status = 404, description = "Unknown post", body = Error),
        (status = 409, description = "Version conflict", body = Error),
        (status = 503, description = "Storage unavailable", body = Error)
    ),
    tags = ["posts"],
    operation_id = "updatePost"
)]
#[patch("/posts/{id}")]
pub async fn update_post(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
    payload: web::Json<UpdatePostBody>,
) -> ApiResult<web::Json<Post>> {
    let actor = session.require_user_id()?;
    let post = state
        .posts
        .update_post(actor, PostId::new(path.into_inner()), payload.into_inner().into())
        .await?;
    Ok(web::Json(post))
}

/// Delete a post owned by the session user.
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Login required", body = Error),
        (status = 403, description = "Not the post owner", body = Error),
        (status = 404, description = "Unknown post", body = Error)
    ),
    tags = ["posts"],
    operation_id = "deletePost"
)]
#[delete("/posts/{id}")]
pub async fn delete_post(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let actor = session.require_user_id()?;
    state
        .posts
        .delete_post(actor, PostId::new(path.into_inner()))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

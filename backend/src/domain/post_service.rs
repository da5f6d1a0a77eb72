//! Post use-cases built on the mutation coordinator.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::domain::ports::{PostCommand, PostRepository, PostRepositoryError};
use crate::domain::{
    Error, MutationRejected, NewPostRequest, Post, PostDraft, PostId, PostMutationCoordinator,
    PostPatch, RejectionKind, RequestValidator, UserId,
};

fn post_not_found(id: PostId) -> Error {
    Error::not_found("post not found").with_details(json!({
        "code": "post_not_found",
        "postId": id,
    }))
}

/// Maps post storage failures onto domain errors.
pub(crate) fn map_post_error(error: PostRepositoryError) -> Error {
    match error {
        PostRepositoryError::NotFound { id } => post_not_found(PostId::new(id)),
        PostRepositoryError::VersionConflict { id, expected } => {
            Error::conflict("post was modified by another request").with_details(json!({
                "code": "version_conflict",
                "postId": id,
                "expectedVersion": expected,
            }))
        }
        PostRepositoryError::Rejected { rejection } => map_rejection(&rejection),
        PostRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("post store unavailable: {message}"))
        }
        PostRepositoryError::Timeout { operation } => {
            Error::service_unavailable(format!("post store timed out during {operation}"))
        }
        PostRepositoryError::Query { message } => {
            Error::internal(format!("post store error: {message}"))
        }
    }
}

fn map_rejection(rejection: &MutationRejected) -> Error {
    match rejection.kind() {
        RejectionKind::NotOwner => Error::forbidden(rejection.reason())
            .with_details(json!({"code": "not_post_owner"})),
        RejectionKind::Stale => Error::conflict(rejection.reason())
            .with_details(json!({"code": "version_conflict"})),
        RejectionKind::Invalid => Error::invalid_request(rejection.reason())
            .with_details(json!({"code": "mutation_rejected"})),
    }
}

fn apply_patch(actor: UserId, patch: &PostPatch, post: &mut Post) -> Result<(), MutationRejected> {
    if post.owner() != actor {
        return Err(MutationRejected::not_owner(actor));
    }
    if let Some(expected) = patch.expected_version {
        if expected != post.version() {
            return Err(MutationRejected::stale(expected, post.version()));
        }
    }
    if let Some(title) = &patch.title {
        post.set_title(title.clone());
    }
    if let Some(content) = &patch.content {
        post.set_content(content.clone());
    }
    if let Some(tags) = &patch.tags {
        post.set_tags(tags.clone());
    }
    Ok(())
}

/// [`PostCommand`] implementation.
pub struct PostService<R: ?Sized> {
    repository: Arc<R>,
    coordinator: PostMutationCoordinator<R>,
    validator: Arc<dyn RequestValidator>,
}

impl<R> PostService<R>
where
    R: PostRepository + ?Sized,
{
    pub fn new(repository: Arc<R>, validator: Arc<dyn RequestValidator>) -> Self {
        Self {
            coordinator: PostMutationCoordinator::new(Arc::clone(&repository)),
            repository,
            validator,
        }
    }
}

#[async_trait]
impl<R> PostCommand for PostService<R>
where
    R: PostRepository + ?Sized,
{
    async fn create_post(&self, author: UserId, request: NewPostRequest) -> Result<Post, Error> {
        self.validator.validate_new_post(&request)?;
        let draft = PostDraft {
            title: request.title,
            content: request.content,
            tags: request.tags,
        };
        let post = self
            .repository
            .create(author, &draft)
            .await
            .map_err(map_post_error)?;
        info!(post_id = %post.id(), user_id = %author, "post created");
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Post, Error> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(map_post_error)?
            .ok_or_else(|| post_not_found(id))
    }

    async fn update_post(&self, actor: UserId, id: PostId, patch: PostPatch) -> Result<Post, Error> {
        self.validator.validate_patch(&patch)?;
        let mutate = move |post: &mut Post| apply_patch(actor, &patch, post);
        let post = self
            .coordinator
            .update_with_retry(id, &mutate)
            .await
            .map_err(map_post_error)?;
        info!(post_id = %id, version = %post.version(), "post updated");
        Ok(post)
    }

    async fn delete_post(&self, actor: UserId, id: PostId) -> Result<(), Error> {
        let post = self.get_post(id).await?;
        if post.owner() != actor {
            return Err(map_rejection(&MutationRejected::not_owner(actor)));
        }
        if !self.repository.delete(id).await.map_err(map_post_error)? {
            return Err(post_not_found(id));
        }
        info!(post_id = %id, "post deleted");
        Ok(())
    }
}

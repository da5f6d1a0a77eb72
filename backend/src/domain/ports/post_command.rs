//! Driving port for post use-cases.
//!
//! The authenticated user and addressed post are explicit arguments so the
//! service never reads ambient request state.

use async_trait::async_trait;

use crate::domain::{Error, NewPostRequest, Post, PostId, PostPatch, UserId};

/// Post operations exposed to inbound adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostCommand: Send + Sync {
    async fn create_post(&self, author: UserId, request: NewPostRequest) -> Result<Post, Error>;

    async fn get_post(&self, id: PostId) -> Result<Post, Error>;

    /// Apply a partial update under optimistic concurrency. Owner only.
    async fn update_post(&self, actor: UserId, id: PostId, patch: PostPatch) -> Result<Post, Error>;

    /// Delete a post. Owner only.
    async fn delete_post(&self, actor: UserId, id: PostId) -> Result<(), Error>;
}

//! Optimistic concurrency control for post updates.
//!
//! A mutation is a pure callback applied to a fresh read of the post. The
//! write is conditional on the version read; when another writer got there
//! first the whole read-modify-write cycle runs again, up to
//! [`MAX_UPDATE_ATTEMPTS`] times in total.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::ports::{PostMutation, PostRepository, PostRepositoryError};
use crate::domain::{Post, PostId};

/// Total attempts, first try included.
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Runs bounded-retry read-modify-write cycles against a [`PostRepository`].
pub struct PostMutationCoordinator<R: ?Sized> {
    repository: Arc<R>,
    max_attempts: u32,
}

impl<R: ?Sized> Clone for PostMutationCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            max_attempts: self.max_attempts,
        }
    }
}

impl<R> PostMutationCoordinator<R>
where
    R: PostRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            max_attempts: MAX_UPDATE_ATTEMPTS,
        }
    }

    /// Override the attempt bound. Values below one are treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Update under a row lock, retrying on version conflicts.
    ///
    /// Each attempt locks the row with `SELECT ... FOR UPDATE`, applies
    /// `mutate`, and writes conditionally on the version it read. Not-found,
    /// rejections, and infrastructure failures end the loop immediately.
    pub async fn update_with_retry(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError> {
        let mut attempt = 1;
        loop {
            match self.repository.update_locked(id, mutate).await {
                Err(err) if err.is_version_conflict() && attempt < self.max_attempts => {
                    debug!(post_id = %id, attempt, "version conflict on locked update, retrying");
                    attempt += 1;
                }
                Err(err) if err.is_version_conflict() => {
                    warn!(post_id = %id, attempts = attempt, "locked update retries exhausted");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    /// Update without holding a lock, retrying on version conflicts.
    ///
    /// Reads the current row, applies `mutate` to a copy, and issues the
    /// conditional write outside any transaction.
    pub async fn update_optimistic(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError> {
        let mut attempt = 1;
        loop {
            match self.optimistic_cycle(id, mutate).await {
                Err(err) if err.is_version_conflict() && attempt < self.max_attempts => {
                    debug!(post_id = %id, attempt, "version conflict on optimistic update, retrying");
                    attempt += 1;
                }
                Err(err) if err.is_version_conflict() => {
                    warn!(post_id = %id, attempts = attempt, "optimistic update retries exhausted");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    async fn optimistic_cycle(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError> {
        let mut post = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| PostRepositoryError::not_found(id.get()))?;
        let read_version = post.version();
        mutate(&mut post).map_err(PostRepositoryError::rejected)?;
        self.repository
            .compare_and_swap(id, read_version, &post.draft())
            .await
    }
}

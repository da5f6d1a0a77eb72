//! Driven port for versioned post storage.
//!
//! Every write is conditional on the version the caller read. Adapters must
//! never apply an update whose `WHERE version = ?` predicate fails.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{MutationRejected, Post, PostDraft, PostId, UserId, Version};

/// Pure change applied to a locked copy of a post.
///
/// Implementations must not perform I/O; the callback may run once per retry
/// attempt.
pub type PostMutation<'a> = &'a (dyn Fn(&mut Post) -> Result<(), MutationRejected> + Send + Sync);

define_port_error! {
    /// Errors raised by post repository adapters.
    pub enum PostRepositoryError {
        /// Pool checkout or connection establishment failed.
        Connection { message: String } => "post repository connection failed: {message}",
        /// A statement failed to execute.
        Query { message: String } => "post repository query failed: {message}",
        /// The per-operation deadline elapsed.
        Timeout { operation: String } => "post repository timed out during {operation}",
        /// No row exists for the id.
        NotFound { id: i64 } => "post {id} not found",
        /// The conditional write matched no row at the expected version.
        VersionConflict { id: i64, expected: i32 } =>
            "post {id} was modified by another request (expected version {expected})",
        /// The mutation callback refused the change.
        Rejected { rejection: MutationRejected } => "mutation rejected: {rejection}",
    }
}

impl PostRepositoryError {
    /// Whether a fresh read-modify-write cycle may succeed.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Storage for posts.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post at [`Version::INITIAL`].
    async fn create(&self, owner: UserId, draft: &PostDraft) -> Result<Post, PostRepositoryError>;

    /// Read a post without locking.
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, PostRepositoryError>;

    /// Remove a post. Returns `false` when no row existed.
    async fn delete(&self, id: PostId) -> Result<bool, PostRepositoryError>;

    /// One locked read-modify-write cycle in a single transaction.
    ///
    /// Reads the row `FOR UPDATE`, applies `mutate`, then writes title,
    /// content, and tags with `version = version + 1` conditional on the
    /// version read. A rejection rolls the transaction back.
    async fn update_locked(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError>;

    /// Conditional write outside a transaction.
    ///
    /// Zero affected rows yields `NotFound` when the row is gone and
    /// `VersionConflict` otherwise.
    async fn compare_and_swap(
        &self,
        id: PostId,
        expected: Version,
        draft: &PostDraft,
    ) -> Result<Post, PostRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn only_version_conflicts_are_retryable() {
        assert!(PostRepositoryError::version_conflict(5_i64, 1).is_version_conflict());
        assert!(!PostRepositoryError::not_found(5_i64).is_version_conflict());
        assert!(!PostRepositoryError::query("boom").is_version_conflict());
    }

    #[rstest]
    fn rejection_message_is_preserved() {
        let err = PostRepositoryError::rejected(MutationRejected::new("owner only"));
        assert_eq!(err.to_string(), "mutation rejected: owner only");
    }
}

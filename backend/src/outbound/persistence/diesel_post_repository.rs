//! PostgreSQL-backed `PostRepository` with row-locked conditional writes.
//!
//! `update_locked` holds `SELECT ... FOR UPDATE` for the whole
//! read-modify-write cycle, so concurrent callers queue on the row. The write
//! itself is still guarded by `WHERE version = <read version>`; if that ever
//! matches nothing the transaction rolls back and the caller sees a
//! `VersionConflict`.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::AsyncConnection as _;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};

use crate::domain::ports::{PostMutation, PostRepository, PostRepositoryError};
use crate::domain::{MutationRejected, Post, PostDraft, PostId, UserId, Version};

use super::error_mapping::{DieselFailure, classify_diesel_error, classify_pool_error};
use super::models::{NewPostRow, PostContentChangeset, PostRow};
use super::pool::{DbPool, PoolError};
use super::schema::posts;

/// Diesel adapter for post storage.
#[derive(Clone)]
pub struct DieselPostRepository {
    pool: DbPool,
}

impl DieselPostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn deadline<T, F>(&self, operation: &'static str, work: F) -> Result<T, PostRepositoryError>
    where
        F: Future<Output = Result<T, PostRepositoryError>>,
    {
        match self.pool.with_deadline(work).await {
            Some(result) => result,
            None => {
                warn!(operation, "post repository deadline elapsed");
                Err(PostRepositoryError::timeout(operation))
            }
        }
    }
}

fn map_pool_error(error: PoolError) -> PostRepositoryError {
    map_failure(classify_pool_error(error))
}

fn map_diesel_error(error: DieselError) -> PostRepositoryError {
    map_failure(classify_diesel_error(error))
}

fn map_failure(failure: DieselFailure) -> PostRepositoryError {
    match failure {
        DieselFailure::Connection(message) => PostRepositoryError::connection(message),
        DieselFailure::UniqueViolation(constraint) => PostRepositoryError::query(format!(
            "unique violation on {}",
            constraint.as_deref().unwrap_or("unknown constraint")
        )),
        DieselFailure::Query(message) => PostRepositoryError::query(message),
    }
}

/// Outcome carried out of the locked transaction; any `Err` rolls back.
enum LockedUpdateError {
    Diesel(DieselError),
    NotFound,
    Rejected(MutationRejected),
    Conflict(Version),
}

impl From<DieselError> for LockedUpdateError {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

/// `UPDATE posts SET ... WHERE id = ? AND version = ? RETURNING *`.
async fn conditional_write(
    conn: &mut AsyncPgConnection,
    id: PostId,
    expected: Version,
    draft: &PostDraft,
) -> Result<Option<PostRow>, DieselError> {
    diesel::update(
        posts::table
            .filter(posts::id.eq(id.get()))
            .filter(posts::version.eq(expected.get())),
    )
    .set((
        PostContentChangeset::from(draft),
        posts::version.eq(posts::version + 1),
        posts::updated_at.eq(Utc::now()),
    ))
    .returning(PostRow::as_returning())
    .get_result(conn)
    .await
    .optional()
}

async fn post_exists(conn: &mut AsyncPgConnection, id: PostId) -> Result<bool, DieselError> {
    diesel::select(diesel::dsl::exists(
        posts::table.filter(posts::id.eq(id.get())),
    ))
    .get_result(conn)
    .await
}

#[async_trait]
impl PostRepository for DieselPostRepository {
    async fn create(&self, owner: UserId, draft: &PostDraft) -> Result<Post, PostRepositoryError> {
        self.deadline("create", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let row: PostRow = diesel::insert_into(posts::table)
                .values(NewPostRow {
                    title: &draft.title,
                    content: &draft.content,
                    tags: &draft.tags,
                    user_id: owner.get(),
                })
                .returning(PostRow::as_returning())
                .get_result(&mut conn)
                .await
                .map_err(map_diesel_error)?;
            Ok(row.into())
        })
        .await
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, PostRepositoryError> {
        self.deadline("find_by_id", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let row: Option<PostRow> = posts::table
                .filter(posts::id.eq(id.get()))
                .select(PostRow::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;
            Ok(row.map(Post::from))
        })
        .await
    }

    async fn delete(&self, id: PostId) -> Result<bool, PostRepositoryError> {
        self.deadline("delete", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let removed = diesel::delete(posts::table.filter(posts::id.eq(id.get())))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn update_locked(
        &self,
        id: PostId,
        mutate: PostMutation<'_>,
    ) -> Result<Post, PostRepositoryError> {
        self.deadline("update_locked", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let outcome = conn
                .transaction::<PostRow, LockedUpdateError, _>(|conn| {
                    async move {
                        let current: PostRow = posts::table
                            .filter(posts::id.eq(id.get()))
                            .select(PostRow::as_select())
                            .for_update()
                            .first(conn)
                            .await
                            .optional()?
                            .ok_or(LockedUpdateError::NotFound)?;
                        let read_version = Version::new(current.version);

                        let mut post = Post::from(current);
                        mutate(&mut post).map_err(LockedUpdateError::Rejected)?;

                        conditional_write(conn, id, read_version, &post.draft())
                            .await?
                            .ok_or(LockedUpdateError::Conflict(read_version))
                    }
                    .scope_boxed()
                })
                .await;

            match outcome {
                Ok(row) => Ok(row.into()),
                Err(LockedUpdateError::NotFound) => Err(PostRepositoryError::not_found(id.get())),
                Err(LockedUpdateError::Rejected(rejection)) => {
                    debug!(post_id = %id, reason = rejection.reason(), "mutation rejected");
                    Err(PostRepositoryError::rejected(rejection))
                }
                Err(LockedUpdateError::Conflict(expected)) => Err(
                    PostRepositoryError::version_conflict(id.get(), expected.get()),
                ),
                Err(LockedUpdateError::Diesel(error)) => Err(map_diesel_error(error)),
            }
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        id: PostId,
        expected: Version,
        draft: &PostDraft,
    ) -> Result<Post, PostRepositoryError> {
        self.deadline("compare_and_swap", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            if let Some(row) = conditional_write(&mut conn, id, expected, draft)
                .await
                .map_err(map_diesel_error)?
            {
                return Ok(row.into());
            }
            // Zero rows: the post is gone or someone else won the race.
            if post_exists(&mut conn, id).await.map_err(map_diesel_error)? {
                Err(PostRepositoryError::version_conflict(id.get(), expected.get()))
            } else {
                Err(PostRepositoryError::not_found(id.get()))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DieselFailure::Connection("gone".into()), "post repository connection failed: gone")]
    #[case(DieselFailure::Query("bad".into()), "post repository query failed: bad")]
    #[case(
        DieselFailure::UniqueViolation(None),
        "post repository query failed: unique violation on unknown constraint"
    )]
    fn failures_map_to_port_errors(#[case] failure: DieselFailure, #[case] expected: &str) {
        assert_eq!(map_failure(failure).to_string(), expected);
    }

    #[rstest]
    fn pool_checkout_failure_is_connection_error() {
        let err = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(err, PostRepositoryError::Connection { .. }));
    }
}

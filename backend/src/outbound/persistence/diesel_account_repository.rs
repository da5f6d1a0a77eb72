//! PostgreSQL-backed `AccountRepository`.
//!
//! The account row and its invitation are inserted in one transaction; the
//! unique constraints on `users` decide duplicate usernames and emails.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::AsyncConnection as _;
use diesel_async::RunQueryDsl;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use tracing::warn;

use crate::domain::ports::{
    AccountRepository, AccountRepositoryError, NewInvitation, PendingActivation, StoredCredentials,
};
use crate::domain::{NewAccount, TokenDigest, User, UserId};

use super::error_mapping::{
    DieselFailure, EMAIL_CONSTRAINT, USERNAME_CONSTRAINT, classify_diesel_error,
    classify_pool_error,
};
use super::models::{InvitationRow, NewInvitationRow, NewUserRow, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::{user_invitations, users};

/// Diesel adapter for accounts and invitations.
#[derive(Clone)]
pub struct DieselAccountRepository {
    pool: DbPool,
}

impl DieselAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn deadline<T, F>(
        &self,
        operation: &'static str,
        work: F,
    ) -> Result<T, AccountRepositoryError>
    where
        F: Future<Output = Result<T, AccountRepositoryError>>,
    {
        match self.pool.with_deadline(work).await {
            Some(result) => result,
            None => {
                warn!(operation, "account repository deadline elapsed");
                Err(AccountRepositoryError::timeout(operation))
            }
        }
    }
}

fn map_pool_error(error: PoolError) -> AccountRepositoryError {
    map_failure(classify_pool_error(error), None)
}

fn map_diesel_error(error: DieselError) -> AccountRepositoryError {
    map_failure(classify_diesel_error(error), None)
}

/// Map a failure, naming the offending value when a unique key was hit.
fn map_failure(failure: DieselFailure, account: Option<&NewAccount>) -> AccountRepositoryError {
    match failure {
        DieselFailure::Connection(message) => AccountRepositoryError::connection(message),
        DieselFailure::Query(message) => AccountRepositoryError::query(message),
        DieselFailure::UniqueViolation(constraint) => {
            match (constraint.as_deref(), account) {
                (Some(USERNAME_CONSTRAINT), Some(account)) => {
                    AccountRepositoryError::username_taken(account.username.as_str())
                }
                (Some(EMAIL_CONSTRAINT), Some(account)) => {
                    AccountRepositoryError::email_taken(account.email.as_str())
                }
                (other, _) => AccountRepositoryError::query(format!(
                    "unique violation on {}",
                    other.unwrap_or("unknown constraint")
                )),
            }
        }
    }
}

#[async_trait]
impl AccountRepository for DieselAccountRepository {
    async fn create_with_invitation(
        &self,
        account: &NewAccount,
        invitation: &NewInvitation,
    ) -> Result<User, AccountRepositoryError> {
        self.deadline("create_with_invitation", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let row = conn
                .transaction::<UserRow, DieselError, _>(|conn| {
                    async move {
                        let user: UserRow = diesel::insert_into(users::table)
                            .values(NewUserRow {
                                username: &account.username,
                                email: &account.email,
                                password_digest: &account.password_digest,
                            })
                            .returning(UserRow::as_returning())
                            .get_result(conn)
                            .await?;
                        diesel::insert_into(user_invitations::table)
                            .values(NewInvitationRow {
                                token_digest: invitation.digest.as_bytes(),
                                user_id: user.id,
                                expiry: invitation.expires_at,
                            })
                            .execute(conn)
                            .await?;
                        Ok(user)
                    }
                    .scope_boxed()
                })
                .await
                .map_err(|err| map_failure(classify_diesel_error(err), Some(account)))?;
            Ok(row.into())
        })
        .await
    }

    async fn find_invitation(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<PendingActivation>, AccountRepositoryError> {
        self.deadline("find_invitation", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let found: Option<(InvitationRow, UserRow)> = user_invitations::table
                .inner_join(users::table)
                .filter(user_invitations::token_digest.eq(digest.as_bytes()))
                .select((InvitationRow::as_select(), UserRow::as_select()))
                .first(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;

            found
                .map(|(invitation, user)| {
                    let digest = TokenDigest::from_slice(&invitation.token_digest)
                        .map_err(|err| AccountRepositoryError::query(err.to_string()))?;
                    Ok(PendingActivation {
                        user: user.into(),
                        digest,
                        expires_at: invitation.expiry,
                    })
                })
                .transpose()
        })
        .await
    }

    async fn activate(&self, user: UserId) -> Result<bool, AccountRepositoryError> {
        self.deadline("activate", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let updated = diesel::update(
                users::table
                    .filter(users::id.eq(user.get()))
                    .filter(users::activated.eq(false)),
            )
            .set((users::activated.eq(true), users::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_invitation(&self, digest: &TokenDigest) -> Result<(), AccountRepositoryError> {
        self.deadline("delete_invitation", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::delete(
                user_invitations::table
                    .filter(user_invitations::token_digest.eq(digest.as_bytes())),
            )
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
            Ok(())
        })
        .await
    }

    async fn delete_user(&self, user: UserId) -> Result<(), AccountRepositoryError> {
        self.deadline("delete_user", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            diesel::delete(users::table.filter(users::id.eq(user.get())))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;
            Ok(())
        })
        .await
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, AccountRepositoryError> {
        self.deadline("find_credentials", async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            let row: Option<UserRow> = users::table
                .filter(users::username.eq(username))
                .select(UserRow::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map_err(map_diesel_error)?;
            Ok(row.map(|row| StoredCredentials {
                password_digest: row.password_digest.clone(),
                user: row.into(),
            }))
        })
        .await
    }
}

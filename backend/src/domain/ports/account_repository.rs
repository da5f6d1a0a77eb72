//! Driven port for accounts and their invitations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::{NewAccount, TokenDigest, User, UserId};

/// Invitation row to insert alongside a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvitation {
    pub digest: TokenDigest,
    pub expires_at: DateTime<Utc>,
}

/// An invitation joined to the account it activates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingActivation {
    pub user: User,
    pub digest: TokenDigest,
    pub expires_at: DateTime<Utc>,
}

/// Account plus the stored password digest, for login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub user: User,
    pub password_digest: String,
}

define_port_error! {
    /// Errors raised by account repository adapters.
    pub enum AccountRepositoryError {
        /// Pool checkout or connection establishment failed.
        Connection { message: String } => "account repository connection failed: {message}",
        /// A statement failed to execute.
        Query { message: String } => "account repository query failed: {message}",
        /// The per-operation deadline elapsed.
        Timeout { operation: String } => "account repository timed out during {operation}",
        /// The username unique constraint was violated.
        UsernameTaken { username: String } => "username already taken: {username}",
        /// The email unique constraint was violated.
        EmailTaken { email: String } => "email already registered: {email}",
    }
}

/// Storage for accounts and single-use invitations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert the account and its invitation atomically.
    ///
    /// Either both rows commit or neither does.
    async fn create_with_invitation(
        &self,
        account: &NewAccount,
        invitation: &NewInvitation,
    ) -> Result<User, AccountRepositoryError>;

    /// Look up an invitation by digest, joined to its account.
    async fn find_invitation(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<PendingActivation>, AccountRepositoryError>;

    /// Flip `activated` to true if it is still false.
    ///
    /// Returns `false` when the account was already active or is gone.
    async fn activate(&self, user: UserId) -> Result<bool, AccountRepositoryError>;

    /// Remove an invitation. Missing rows are not an error.
    async fn delete_invitation(&self, digest: &TokenDigest) -> Result<(), AccountRepositoryError>;

    /// Remove an account and, by cascade, its invitations.
    async fn delete_user(&self, user: UserId) -> Result<(), AccountRepositoryError>;

    /// Fetch the account and password digest for a username.
    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, AccountRepositoryError>;
}

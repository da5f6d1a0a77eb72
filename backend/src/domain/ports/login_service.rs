//! Driving port for login.
//!
//! Handlers authenticate through this trait so their tests can substitute a
//! double instead of wiring persistence and password hashing.

use async_trait::async_trait;

use crate::domain::{Error, LoginCredentials, UserId};

/// Authenticates activated accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginService: Send + Sync {
    /// Validate credentials and return the authenticated user id.
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<UserId, Error>;
}

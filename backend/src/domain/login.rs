//! Password login for activated accounts.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::domain::ports::{AccountRepository, LoginService, PasswordHasher};
use crate::domain::registration::{map_account_error, map_hash_error};
use crate::domain::{Error, LoginCredentials, UserId};

fn invalid_credentials() -> Error {
    Error::unauthorized("invalid credentials")
}

/// [`LoginService`] backed by account storage and a password hasher.
pub struct PasswordLoginService<A: ?Sized, H: ?Sized> {
    accounts: Arc<A>,
    hasher: Arc<H>,
}

impl<A: ?Sized, H: ?Sized> PasswordLoginService<A, H> {
    pub fn new(accounts: Arc<A>, hasher: Arc<H>) -> Self {
        Self { accounts, hasher }
    }
}

#[async_trait]
impl<A, H> LoginService for PasswordLoginService<A, H>
where
    A: AccountRepository + ?Sized,
    H: PasswordHasher + ?Sized,
{
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<UserId, Error> {
        let Some(stored) = self
            .accounts
            .find_credentials(credentials.username())
            .await
            .map_err(map_account_error)?
        else {
            debug!("login for unknown username");
            return Err(invalid_credentials());
        };
        let matches = self
            .hasher
            .verify(credentials.password(), &stored.password_digest)
            .await
            .map_err(map_hash_error)?;
        if !matches {
            return Err(invalid_credentials());
        }
        if !stored.user.is_activated() {
            return Err(Error::forbidden("account is not activated")
                .with_details(json!({"code": "account_not_activated"})));
        }
        Ok(stored.user.id())
    }
}

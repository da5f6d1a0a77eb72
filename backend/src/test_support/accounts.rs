//! In-memory account and invitation storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    AccountRepository, AccountRepositoryError, NewInvitation, PendingActivation,
    StoredCredentials,
};
use crate::domain::{NewAccount, TokenDigest, User, UserId};

struct AccountRow {
    user: User,
    password_digest: String,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<UserId, AccountRow>,
    invitations: HashMap<TokenDigest, (UserId, DateTime<Utc>)>,
    next_id: i64,
}

/// Account storage double enforcing username and email uniqueness.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    state: Mutex<State>,
    fail_invitation_delete: Mutex<Option<AccountRepositoryError>>,
}

impl InMemoryAccountRepository {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every invitation delete fail with `error`.
    pub fn fail_invitation_deletes(&self, error: AccountRepositoryError) {
        *self
            .fail_invitation_delete
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        self.lock()
            .accounts
            .values()
            .find(|row| row.user.username() == username)
            .map(|row| row.user.clone())
    }

    pub fn has_invitation(&self, digest: &TokenDigest) -> bool {
        self.lock().invitations.contains_key(digest)
    }

    pub fn invitation_count(&self) -> usize {
        self.lock().invitations.len()
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    /// Move an invitation's expiry, for expiry scenarios.
    pub fn set_invitation_expiry(&self, digest: &TokenDigest, expires_at: DateTime<Utc>) {
        if let Some(entry) = self.lock().invitations.get_mut(digest) {
            entry.1 = expires_at;
        }
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create_with_invitation(
        &self,
        account: &NewAccount,
        invitation: &NewInvitation,
    ) -> Result<User, AccountRepositoryError> {
        let mut state = self.lock();
        if state
            .accounts
            .values()
            .any(|row| row.user.username() == account.username)
        {
            return Err(AccountRepositoryError::username_taken(account.username.clone()));
        }
        if state
            .accounts
            .values()
            .any(|row| row.user.email() == account.email)
        {
            return Err(AccountRepositoryError::email_taken(account.email.clone()));
        }
        state.next_id += 1;
        let id = UserId::new(state.next_id);
        let user = User::new(id, &account.username, &account.email, false, Utc::now());
        state.accounts.insert(
            id,
            AccountRow {
                user: user.clone(),
                password_digest: account.password_digest.clone(),
            },
        );
        state
            .invitations
            .insert(invitation.digest, (id, invitation.expires_at));
        Ok(user)
    }

    async fn find_invitation(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<PendingActivation>, AccountRepositoryError> {
        let state = self.lock();
        Ok(state.invitations.get(digest).and_then(|(user_id, expires_at)| {
            state.accounts.get(user_id).map(|row| PendingActivation {
                user: row.user.clone(),
                digest: *digest,
                expires_at: *expires_at,
            })
        }))
    }

    async fn activate(&self, user: UserId) -> Result<bool, AccountRepositoryError> {
        let mut state = self.lock();
        let Some(row) = state.accounts.get_mut(&user) else {
            return Ok(false);
        };
        if row.user.is_activated() {
            return Ok(false);
        }
        row.user = User::new(
            row.user.id(),
            row.user.username(),
            row.user.email(),
            true,
            row.user.created_at(),
        );
        Ok(true)
    }

    async fn delete_invitation(&self, digest: &TokenDigest) -> Result<(), AccountRepositoryError> {
        if let Some(error) = self
            .fail_invitation_delete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        self.lock().invitations.remove(digest);
        Ok(())
    }

    async fn delete_user(&self, user: UserId) -> Result<(), AccountRepositoryError> {
        let mut state = self.lock();
        state.accounts.remove(&user);
        state.invitations.retain(|_, (owner, _)| *owner != user);
        Ok(())
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, AccountRepositoryError> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|row| row.user.username() == username)
            .map(|row| StoredCredentials {
                user: row.user.clone(),
                password_digest: row.password_digest.clone(),
            }))
    }
}

//! Invitation redemption.
//!
//! An account moves from invited to activated exactly once. The checks run
//! in a fixed order: unknown token, already activated, expired. Expired
//! invitations are left in place.
//!
//! In digest link mode the link carries the stored digest itself, so a
//! 64-character hex token is looked up as-is rather than hashed again.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::domain::ports::{AccountActivation, AccountRepository};
use crate::domain::registration::map_account_error;
use crate::domain::{
    ActivationLinkToken, Error, InvitationTokens, PlaintextToken, TokenDigest, TokenValidity,
    UserId,
};

fn token_invalid() -> Error {
    Error::not_found("invalid activation token").with_details(json!({"code": "token_invalid"}))
}

fn token_expired() -> Error {
    Error::gone("activation token has expired").with_details(json!({"code": "token_expired"}))
}

fn already_activated(user: UserId) -> Error {
    Error::conflict("user is already activated").with_details(json!({
        "code": "user_already_activated",
        "userId": user,
    }))
}

/// Activation state machine.
pub struct ActivationService<A: ?Sized> {
    accounts: Arc<A>,
    tokens: InvitationTokens,
    link_token: ActivationLinkToken,
}

impl<A: ?Sized> ActivationService<A> {
    pub fn new(accounts: Arc<A>, tokens: InvitationTokens) -> Self {
        Self {
            accounts,
            tokens,
            link_token: ActivationLinkToken::default(),
        }
    }

    /// Accept tokens in the shape the registration links embed.
    #[must_use]
    pub fn with_link_token(mut self, link_token: ActivationLinkToken) -> Self {
        self.link_token = link_token;
        self
    }

    /// Digest to look the invitation up by.
    ///
    /// Issued plaintext tokens are 32 hex characters, so a 64-character hex
    /// string can only be a digest.
    fn lookup_digest(&self, token: &PlaintextToken) -> TokenDigest {
        match self.link_token {
            ActivationLinkToken::Digest => TokenDigest::from_hex(token.as_str())
                .unwrap_or_else(|| self.tokens.digest(token)),
            ActivationLinkToken::Plaintext => self.tokens.digest(token),
        }
    }
}

#[async_trait]
impl<A> AccountActivation for ActivationService<A>
where
    A: AccountRepository + ?Sized,
{
    async fn activate(&self, token: &PlaintextToken) -> Result<(), Error> {
        if token.as_str().trim().is_empty() {
            return Err(Error::invalid_request("token is required")
                .with_details(json!({"field": "token", "code": "required"})));
        }
        let digest = self.lookup_digest(token);
        let pending = self
            .accounts
            .find_invitation(&digest)
            .await
            .map_err(map_account_error)?
            .ok_or_else(token_invalid)?;
        let user_id = pending.user.id();

        if pending.user.is_activated() {
            return Err(already_activated(user_id));
        }
        match self
            .tokens
            .validate(&digest, &pending.digest, pending.expires_at)
        {
            TokenValidity::Valid => {}
            TokenValidity::Expired => return Err(token_expired()),
            TokenValidity::Mismatch => return Err(token_invalid()),
        }

        if !self
            .accounts
            .activate(user_id)
            .await
            .map_err(map_account_error)?
        {
            return Err(already_activated(user_id));
        }
        info!(user_id = %user_id, "account activated");

        // The account is active either way; a leftover row is rejected on
        // any later redemption.
        if let Err(err) = self.accounts.delete_invitation(&digest).await {
            warn!(user_id = %user_id, error = %err, "failed to delete redeemed invitation");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ports::{
        AccountRepositoryError, MockAccountRepository, NewInvitation, PendingActivation,
    };
    use crate::domain::{DEFAULT_INVITATION_TTL, ErrorCode, NewAccount, TokenDigest, User};
    use crate::test_support::{InMemoryAccountRepository, MutableClock};

    struct Harness {
        clock: Arc<MutableClock>,
        accounts: Arc<InMemoryAccountRepository>,
        service: ActivationService<InMemoryAccountRepository>,
        token: PlaintextToken,
    }

    #[fixture]
    async fn harness() -> Harness {
        let clock = Arc::new(MutableClock::new(DateTime::UNIX_EPOCH));
        let tokens = InvitationTokens::new(clock.clone(), DEFAULT_INVITATION_TTL);
        let accounts = Arc::new(InMemoryAccountRepository::default());
        let issued = tokens.issue();
        accounts
            .create_with_invitation(
                &NewAccount {
                    username: "alice".to_owned(),
                    email: "alice@x.com".to_owned(),
                    password_digest: "plain$pw".to_owned(),
                },
                &NewInvitation {
                    digest: issued.digest,
                    expires_at: issued.expires_at,
                },
            )
            .await
            .expect("seed account");
        Harness {
            clock,
            service: ActivationService::new(accounts.clone(), tokens),
            accounts,
            token: issued.plaintext,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn activates_and_consumes_token(#[future] harness: Harness) {
        let h = harness.await;

        h.service.activate(&h.token).await.expect("activation succeeds");

        let user = h.accounts.user_by_username("alice").expect("account");
        assert!(user.is_activated());
        assert!(!h.accounts.has_invitation(&TokenDigest::of(&h.token)));
    }

    #[rstest]
    #[tokio::test]
    async fn second_redemption_is_invalid(#[future] harness: Harness) {
        let h = harness.await;
        h.service.activate(&h.token).await.expect("first redemption");

        let err = h.service.activate(&h.token).await.expect_err("replay");

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.detail_code(), Some("token_invalid"));
    }

    #[rstest]
    #[tokio::test]
    async fn expired_token_is_rejected_and_kept(#[future] harness: Harness) {
        let h = harness.await;
        h.clock.advance_seconds(TimeDelta::hours(72).num_seconds() + 1);

        let err = h.service.activate(&h.token).await.expect_err("expired");

        assert_eq!(err.code(), ErrorCode::Gone);
        assert_eq!(err.detail_code(), Some("token_expired"));
        assert!(h.accounts.has_invitation(&TokenDigest::of(&h.token)));
        let user = h.accounts.user_by_username("alice").expect("account");
        assert!(!user.is_activated());
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_token_is_invalid(#[future] harness: Harness) {
        let h = harness.await;
        let err = h
            .service
            .activate(&PlaintextToken::new("0".repeat(32)))
            .await
            .expect_err("unknown");
        assert_eq!(err.detail_code(), Some("token_invalid"));
    }

    #[rstest]
    #[tokio::test]
    async fn blank_token_is_invalid_request(#[future] harness: Harness) {
        let h = harness.await;
        let err = h
            .service
            .activate(&PlaintextToken::new("  "))
            .await
            .expect_err("blank");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn digest_mode_redeems_hex_digest(#[future] harness: Harness) {
        let h = harness.await;
        let service = ActivationService::new(
            h.accounts.clone(),
            InvitationTokens::new(h.clock.clone(), DEFAULT_INVITATION_TTL),
        )
        .with_link_token(ActivationLinkToken::Digest);
        let link_token = PlaintextToken::new(TokenDigest::of(&h.token).to_hex());

        service.activate(&link_token).await.expect("digest link activates");

        let user = h.accounts.user_by_username("alice").expect("account");
        assert!(user.is_activated());
        assert!(!h.accounts.has_invitation(&TokenDigest::of(&h.token)));
    }

    #[rstest]
    #[tokio::test]
    async fn digest_mode_still_accepts_plaintext(#[future] harness: Harness) {
        let h = harness.await;
        let service = ActivationService::new(
            h.accounts.clone(),
            InvitationTokens::new(h.clock.clone(), DEFAULT_INVITATION_TTL),
        )
        .with_link_token(ActivationLinkToken::Digest);

        service.activate(&h.token).await.expect("plaintext activates");
    }

    #[rstest]
    #[tokio::test]
    async fn plaintext_mode_does_not_accept_digests(#[future] harness: Harness) {
        let h = harness.await;
        let link_token = PlaintextToken::new(TokenDigest::of(&h.token).to_hex());

        let err = h.service.activate(&link_token).await.expect_err("digest");

        assert_eq!(err.detail_code(), Some("token_invalid"));
    }

    fn pending(activated: bool, token: &PlaintextToken) -> PendingActivation {
        PendingActivation {
            user: User::new(UserId::new(3), "bob", "bob@x.com", activated, DateTime::UNIX_EPOCH),
            digest: TokenDigest::of(token),
            expires_at: DateTime::UNIX_EPOCH,
        }
    }

    fn mock_service(accounts: MockAccountRepository) -> ActivationService<MockAccountRepository> {
        // Clock after expiry so the ordering of checks is observable.
        let clock = Arc::new(MutableClock::new(DateTime::UNIX_EPOCH + TimeDelta::days(10)));
        ActivationService::new(
            Arc::new(accounts),
            InvitationTokens::new(clock, DEFAULT_INVITATION_TTL),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn already_activated_is_checked_before_expiry() {
        let token = PlaintextToken::new("feedface");
        let found = pending(true, &token);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_invitation()
            .times(1)
            .return_once(move |_| Ok(Some(found)));
        accounts.expect_activate().never();

        let err = mock_service(accounts)
            .activate(&token)
            .await
            .expect_err("already active");

        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(err.detail_code(), Some("user_already_activated"));
    }

    #[rstest]
    #[tokio::test]
    async fn lost_activation_race_reports_already_activated() {
        let token = PlaintextToken::new("feedface");
        let mut found = pending(false, &token);
        found.expires_at = DateTime::UNIX_EPOCH + TimeDelta::days(30);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_invitation()
            .return_once(move |_| Ok(Some(found)));
        accounts.expect_activate().times(1).return_once(|_| Ok(false));
        accounts.expect_delete_invitation().never();

        let err = mock_service(accounts)
            .activate(&token)
            .await
            .expect_err("raced");

        assert_eq!(err.detail_code(), Some("user_already_activated"));
    }

    #[rstest]
    #[tokio::test]
    async fn invitation_cleanup_failure_still_activates() {
        let token = PlaintextToken::new("feedface");
        let mut found = pending(false, &token);
        found.expires_at = DateTime::UNIX_EPOCH + TimeDelta::days(30);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_invitation()
            .return_once(move |_| Ok(Some(found)));
        accounts.expect_activate().return_once(|_| Ok(true));
        accounts
            .expect_delete_invitation()
            .times(1)
            .return_once(|_| Err(AccountRepositoryError::connection("reset")));

        mock_service(accounts)
            .activate(&token)
            .await
            .expect("activation stands");
    }

    #[rstest]
    #[tokio::test]
    async fn store_timeout_is_unavailable() {
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_find_invitation()
            .return_once(|_| Err(AccountRepositoryError::timeout("find_invitation")));

        let err = mock_service(accounts)
            .activate(&PlaintextToken::new("feedface"))
            .await
            .expect_err("timeout");

        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}

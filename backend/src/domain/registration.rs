//! Account registration saga.
//!
//! Step one inserts the account and its invitation in one transaction. Step
//! two mails the activation link. If the mail cannot be delivered the
//! invitation is deleted (and, when configured, the account too) so no live
//! token exists that its owner never received. Compensation failures are
//! logged and swallowed; the caller always sees the mail failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::ports::{
    AccountRegistration, AccountRepository, AccountRepositoryError, INVITATION_TEMPLATE,
    MailError, MailMessage, MailSender, NewInvitation, PasswordHashError, PasswordHasher,
    Registration,
};
use crate::domain::{
    Error, InvitationTokens, IssuedToken, NewAccount, RegistrationRequest, RequestValidator,
    TokenDigest, User,
};

/// What to undo when the invitation mail fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// Delete the invitation; keep the inactive account.
    #[default]
    InvitationOnly,
    /// Delete the invitation and the account.
    InvitationAndUser,
}

/// Which token the activation link embeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationLinkToken {
    /// The plaintext token. The link is the only place it ever appears.
    #[default]
    Plaintext,
    /// The lowercase hex digest of the token.
    ///
    /// Links stay redeemable as long as [`crate::domain::ActivationService`]
    /// runs with the same mode, which looks the digest up directly. The
    /// link then grants activation on its own, exactly like a plaintext one.
    Digest,
}

/// Tunables for the saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    pub frontend_base_url: String,
    pub compensation: CompensationPolicy,
    pub link_token: ActivationLinkToken,
}

impl RegistrationSettings {
    pub fn new(frontend_base_url: impl Into<String>) -> Self {
        Self {
            frontend_base_url: frontend_base_url.into(),
            compensation: CompensationPolicy::default(),
            link_token: ActivationLinkToken::default(),
        }
    }

    #[must_use]
    pub fn with_compensation(mut self, compensation: CompensationPolicy) -> Self {
        self.compensation = compensation;
        self
    }

    #[must_use]
    pub fn with_link_token(mut self, link_token: ActivationLinkToken) -> Self {
        self.link_token = link_token;
        self
    }

    fn activation_url(&self, issued: &IssuedToken) -> String {
        let token = match self.link_token {
            ActivationLinkToken::Plaintext => issued.plaintext.as_str().to_owned(),
            ActivationLinkToken::Digest => issued.digest.to_hex(),
        };
        format!(
            "{}/activate/{token}",
            self.frontend_base_url.trim_end_matches('/')
        )
    }
}

/// Maps account storage failures onto domain errors.
pub(crate) fn map_account_error(error: AccountRepositoryError) -> Error {
    match error {
        AccountRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("account store unavailable: {message}"))
        }
        AccountRepositoryError::Timeout { operation } => {
            Error::service_unavailable(format!("account store timed out during {operation}"))
        }
        AccountRepositoryError::Query { message } => {
            Error::internal(format!("account store error: {message}"))
        }
        AccountRepositoryError::UsernameTaken { .. } => Error::conflict("username already taken")
            .with_details(json!({"field": "username", "code": "username_taken"})),
        AccountRepositoryError::EmailTaken { .. } => Error::conflict("email already registered")
            .with_details(json!({"field": "email", "code": "email_taken"})),
    }
}

pub(crate) fn map_hash_error(error: PasswordHashError) -> Error {
    Error::internal(format!("password hashing failed: {error}"))
}

fn mail_failure(error: &MailError) -> Error {
    Error::bad_gateway("failed to send activation email").with_details(json!({
        "code": "mail_delivery_failed",
        "reason": error.to_string(),
    }))
}

/// Registration saga orchestrator.
pub struct RegistrationService<A: ?Sized, M: ?Sized, H: ?Sized> {
    accounts: Arc<A>,
    mailer: Arc<M>,
    hasher: Arc<H>,
    validator: Arc<dyn RequestValidator>,
    tokens: InvitationTokens,
    settings: RegistrationSettings,
}

impl<A: ?Sized, M: ?Sized, H: ?Sized> RegistrationService<A, M, H> {
    pub fn new(
        accounts: Arc<A>,
        mailer: Arc<M>,
        hasher: Arc<H>,
        validator: Arc<dyn RequestValidator>,
        tokens: InvitationTokens,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            accounts,
            mailer,
            hasher,
            validator,
            tokens,
            settings,
        }
    }
}

impl<A, M, H> RegistrationService<A, M, H>
where
    A: AccountRepository + ?Sized,
    M: MailSender + ?Sized,
    H: PasswordHasher + ?Sized,
{
    fn invitation_message(&self, user: &User, issued: &IssuedToken) -> MailMessage {
        MailMessage {
            template: INVITATION_TEMPLATE.to_owned(),
            recipient_name: user.username().to_owned(),
            recipient_email: user.email().to_owned(),
            variables: [
                ("username".to_owned(), user.username().to_owned()),
                ("activation_url".to_owned(), self.settings.activation_url(issued)),
            ]
            .into_iter()
            .collect(),
        }
    }

    async fn compensate(&self, user: &User, digest: &TokenDigest) {
        if let Err(err) = self.accounts.delete_invitation(digest).await {
            error!(user_id = %user.id(), error = %err, "failed to delete invitation after mail failure");
        }
        if self.settings.compensation == CompensationPolicy::InvitationAndUser {
            if let Err(err) = self.accounts.delete_user(user.id()).await {
                error!(user_id = %user.id(), error = %err, "failed to delete account after mail failure");
            }
        }
    }
}

#[async_trait]
impl<A, M, H> AccountRegistration for RegistrationService<A, M, H>
where
    A: AccountRepository + ?Sized,
    M: MailSender + ?Sized,
    H: PasswordHasher + ?Sized,
{
    async fn register(&self, request: RegistrationRequest) -> Result<Registration, Error> {
        self.validator.validate_registration(&request)?;
        let password_digest = self
            .hasher
            .hash(&request.password)
            .await
            .map_err(map_hash_error)?;
        let account = NewAccount {
            username: request.username.trim().to_owned(),
            email: request.email.trim().to_owned(),
            password_digest,
        };
        let issued = self.tokens.issue();
        let invitation = NewInvitation {
            digest: issued.digest,
            expires_at: issued.expires_at,
        };

        let user = self
            .accounts
            .create_with_invitation(&account, &invitation)
            .await
            .map_err(map_account_error)?;
        info!(user_id = %user.id(), "account created; sending invitation");

        let message = self.invitation_message(&user, &issued);
        if let Err(mail_error) = self.mailer.send(&message).await {
            warn!(user_id = %user.id(), error = %mail_error, "invitation mail failed; compensating");
            self.compensate(&user, &issued.digest).await;
            return Err(mail_failure(&mail_error));
        }

        Ok(Registration {
            user,
            token: issued.plaintext,
        })
    }
}

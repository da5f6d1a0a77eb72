//! Wires adapters into domain services for the HTTP state.

use std::sync::Arc;

use mockable::DefaultClock;
use social_backend::domain::ports::MailSender;
use social_backend::domain::{
    ActivationService, DefaultRequestValidator, InvitationTokens, PasswordLoginService,
    PostService, RegistrationService,
};
use social_backend::inbound::http::state::HttpState;
use social_backend::outbound::mail::{HttpMailSender, LoggingMailSender};
use social_backend::outbound::password::Argon2PasswordHasher;
use social_backend::outbound::persistence::{DieselAccountRepository, DieselPostRepository};
use tracing::{info, warn};

use super::ServerConfig;

fn build_mail_sender(config: &ServerConfig) -> std::io::Result<Arc<dyn MailSender>> {
    match &config.mail {
        Some(mail) => {
            let sender = HttpMailSender::new(mail.clone())
                .map_err(|err| std::io::Error::other(format!("mail client: {err}")))?;
            info!(endpoint = %mail.endpoint, sandbox = mail.sandbox, "using HTTP mail sender");
            Ok(Arc::new(sender))
        }
        None => {
            warn!("no mail provider configured; activation mail will only be logged");
            Ok(Arc::new(LoggingMailSender))
        }
    }
}

/// Build the handler state from configuration.
///
/// # Errors
///
/// Returns [`std::io::Error`] when the mail client cannot be constructed.
pub(crate) fn build_http_state(config: &ServerConfig) -> std::io::Result<HttpState> {
    let posts = Arc::new(DieselPostRepository::new(config.db_pool.clone()));
    let accounts = Arc::new(DieselAccountRepository::new(config.db_pool.clone()));
    let hasher = Arc::new(Argon2PasswordHasher);
    let validator = Arc::new(DefaultRequestValidator);
    let tokens = InvitationTokens::new(Arc::new(DefaultClock), config.invitation_ttl);
    let mailer = build_mail_sender(config)?;

    let post_service = PostService::new(posts, validator.clone());
    let registration = RegistrationService::new(
        accounts.clone(),
        mailer,
        hasher.clone(),
        validator,
        tokens.clone(),
        config.registration.clone(),
    );
    let activation = ActivationService::new(accounts.clone(), tokens)
        .with_link_token(config.registration.link_token);
    let login = PasswordLoginService::new(accounts, hasher);

    Ok(HttpState::new(
        Arc::new(post_service),
        Arc::new(registration),
        Arc::new(activation),
        Arc::new(login),
    ))
}

//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod account_onboarding;
mod account_repository;
mod login_service;
mod mail_sender;
mod password_hasher;
mod post_command;
mod post_repository;

#[cfg(test)]
pub use account_onboarding::{MockAccountActivation, MockAccountRegistration};
pub use account_onboarding::{AccountActivation, AccountRegistration, Registration};
#[cfg(test)]
pub use account_repository::MockAccountRepository;
pub use account_repository::{
    AccountRepository, AccountRepositoryError, NewInvitation, PendingActivation,
    StoredCredentials,
};
pub use login_service::LoginService;
#[cfg(test)]
pub use login_service::MockLoginService;
#[cfg(test)]
pub use mail_sender::MockMailSender;
pub use mail_sender::{INVITATION_TEMPLATE, MailError, MailMessage, MailSender};
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use password_hasher::{PasswordHashError, PasswordHasher};
#[cfg(test)]
pub use post_command::MockPostCommand;
pub use post_command::PostCommand;
pub use post_repository::{PostMutation, PostRepository, PostRepositoryError};

//! Driving ports for signup and activation.

use async_trait::async_trait;

use crate::domain::{Error, PlaintextToken, RegistrationRequest, User};

/// Outcome of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Plaintext invitation token; only its digest was stored.
    pub token: PlaintextToken,
}

/// Creates inactive accounts and sends their invitations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRegistration: Send + Sync {
    async fn register(&self, request: RegistrationRequest) -> Result<Registration, Error>;
}

/// Redeems invitation tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountActivation: Send + Sync {
    async fn activate(&self, token: &PlaintextToken) -> Result<(), Error>;
}

//! Driven port for transactional mail.
//!
//! Adapters own delivery retries; callers see one outcome per message.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::define_port_error;

/// Template rendered for activation invitations.
pub const INVITATION_TEMPLATE: &str = "user_invitation";

/// A templated message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub template: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub variables: BTreeMap<String, String>,
}

define_port_error! {
    /// Errors raised by mail adapters after their retries are exhausted.
    pub enum MailError {
        /// The provider could not be reached.
        Transport { message: String } => "mail transport failed: {message}",
        /// The provider answered with a non-success status.
        Rejected { status: u16, message: String } => "mail provider rejected message ({status}): {message}",
        /// The provider did not answer in time.
        Timeout { message: String } => "mail provider timed out: {message}",
        /// No template is registered under the name.
        UnknownTemplate { template: String } => "unknown mail template: {template}",
    }
}

impl MailError {
    /// Whether another delivery attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::UnknownTemplate { .. } => false,
        }
    }
}

/// Sends templated mail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

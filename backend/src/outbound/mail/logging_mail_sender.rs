//! Development sender that renders each message and logs it.

use async_trait::async_trait;
use tracing::info;

use super::templates::render;
use crate::domain::ports::{MailError, MailMessage, MailSender};

/// Logs rendered mail instead of delivering it.
///
/// Activation links appear in the log output, so only use it where logs
/// are private.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMailSender;

#[async_trait]
impl MailSender for LoggingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let rendered = render(message)?;
        info!(
            template = %message.template,
            to = %message.recipient_email,
            subject = %rendered.subject,
            body = %rendered.html,
            "mail not delivered (logging sender)"
        );
        Ok(())
    }
}

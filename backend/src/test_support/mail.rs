//! Mail sender doubles.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{MailError, MailMessage, MailSender};

/// Accepts every message and keeps a copy.
#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailSender {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Rejects every message with a transport error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMailSender;

#[async_trait]
impl MailSender for FailingMailSender {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Err(MailError::transport("connection refused"))
    }
}

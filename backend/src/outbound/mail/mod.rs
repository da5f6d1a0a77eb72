//! Mail sender adapters.

mod http_mail_sender;
mod logging_mail_sender;
mod templates;

pub use http_mail_sender::{HttpMailConfig, HttpMailSender, MAX_DELIVERY_ATTEMPTS};
pub use logging_mail_sender::LoggingMailSender;
pub use templates::{RenderedMail, render};

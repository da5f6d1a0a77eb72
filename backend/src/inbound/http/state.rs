//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and depend only on driving
//! ports, so they stay testable with mocks.

use std::sync::Arc;

use crate::domain::ports::{AccountActivation, AccountRegistration, LoginService, PostCommand};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<dyn PostCommand>,
    pub registration: Arc<dyn AccountRegistration>,
    pub activation: Arc<dyn AccountActivation>,
    pub login: Arc<dyn LoginService>,
}

impl HttpState {
    pub fn new(
        posts: Arc<dyn PostCommand>,
        registration: Arc<dyn AccountRegistration>,
        activation: Arc<dyn AccountActivation>,
        login: Arc<dyn LoginService>,
    ) -> Self {
        Self {
            posts,
            registration,
            activation,
            login,
        }
    }
}

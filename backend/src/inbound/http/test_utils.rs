//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;

use crate::domain::ports::{
    MockAccountActivation, MockAccountRegistration, MockLoginService, MockPostCommand,
};
use crate::inbound::http::state::HttpState;

/// Session middleware with a fresh key, cookie `session`, and `Secure` off.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// The `session` cookie set on a response.
pub fn session_cookie(response: &ServiceResponse) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}

/// Mock driving ports; unset expectations panic when called.
#[derive(Default)]
pub struct MockPorts {
    pub posts: MockPostCommand,
    pub registration: MockAccountRegistration,
    pub activation: MockAccountActivation,
    pub login: MockLoginService,
}

impl MockPorts {
    pub fn into_state(self) -> HttpState {
        HttpState::new(
            Arc::new(self.posts),
            Arc::new(self.registration),
            Arc::new(self.activation),
            Arc::new(self.login),
        )
    }
}

//! HTTP server configuration object.

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::cookie::{Key, SameSite};
use social_backend::domain::RegistrationSettings;
use social_backend::outbound::mail::HttpMailConfig;
use social_backend::outbound::persistence::DbPool;

/// Everything `create_server` needs, resolved from settings.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: DbPool,
    pub(crate) registration: RegistrationSettings,
    pub(crate) invitation_ttl: Duration,
    pub(crate) mail: Option<HttpMailConfig>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(key: Key, cookie_secure: bool, bind_addr: SocketAddr, db_pool: DbPool) -> Self {
        Self {
            key,
            cookie_secure,
            same_site: SameSite::Lax,
            bind_addr,
            db_pool,
            registration: RegistrationSettings::new("http://localhost:3000"),
            invitation_ttl: social_backend::domain::DEFAULT_INVITATION_TTL,
            mail: None,
        }
    }

    #[must_use]
    pub fn with_registration(mut self, registration: RegistrationSettings, ttl: Duration) -> Self {
        self.registration = registration;
        self.invitation_ttl = ttl;
        self
    }

    /// Deliver mail over HTTP instead of logging it.
    #[must_use]
    pub fn with_mail(mut self, mail: Option<HttpMailConfig>) -> Self {
        self.mail = mail;
        self
    }
}

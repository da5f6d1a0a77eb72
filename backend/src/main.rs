//! Backend entry-point: loads settings, migrates, and serves the REST API.

mod server;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use social_backend::inbound::http::health::HealthState;
use social_backend::outbound::persistence::{DbPool, run_pending_migrations};
use social_backend::settings::ServerSettings;

use server::{ServerConfig, create_server, load_session_key};

fn other(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {err}"))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServerSettings::load_from_iter(std::env::args_os()).map_err(|e| other("settings", e))?;
    let bind_addr = settings.bind_addr().map_err(|e| other("settings", e))?;
    let database_url = settings.database_url().map_err(|e| other("settings", e))?;
    run_pending_migrations(database_url)
        .await
        .map_err(|e| other("migrations", e))?;

    let pool_config = settings.pool_config().map_err(|e| other("settings", e))?;
    let db_pool = DbPool::new(pool_config)
        .await
        .map_err(|e| other("database pool", e))?;

    let key = load_session_key(&settings.session_key_file(), settings.session_allow_ephemeral)
        .map_err(|e| other("session key", e))?;
    let registration = settings.registration().map_err(|e| other("settings", e))?;
    let mail = settings.mail().map_err(|e| other("settings", e))?;

    let config = ServerConfig::new(key, settings.cookie_secure(), bind_addr, db_pool)
        .with_registration(registration, settings.invitation_ttl())
        .with_mail(mail);

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    info!(%bind_addr, "listening");
    server.await
}

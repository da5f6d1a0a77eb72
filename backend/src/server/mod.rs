//! Server construction and middleware wiring.

mod config;
mod session_key;
mod state_builders;

pub use config::ServerConfig;
pub use session_key::load_session_key;

use state_builders::build_http_state;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use social_backend::Trace;
#[cfg(debug_assertions)]
use social_backend::doc::ApiDoc;
use social_backend::inbound::http::accounts::{activate, register};
use social_backend::inbound::http::health::{HealthState, live, ready};
use social_backend::inbound::http::posts::{create_post, delete_post, get_post, update_post};
use social_backend::inbound::http::state::HttpState;
use social_backend::inbound::http::users::login;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Cookie settings shared by every worker.
#[derive(Clone)]
struct SessionPolicy {
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
}

impl SessionPolicy {
    /// Encrypted cookie holding only the user id, valid for two hours.
    fn middleware(&self) -> SessionMiddleware<CookieSessionStore> {
        SessionMiddleware::builder(CookieSessionStore::default(), self.key.clone())
            .cookie_name(SESSION_COOKIE.to_owned())
            .cookie_path("/".to_owned())
            .cookie_secure(self.cookie_secure)
            .cookie_http_only(true)
            .cookie_content_security(CookieContentSecurity::Private)
            .cookie_same_site(self.same_site)
            .session_lifecycle(PersistentSession::default().session_ttl(SESSION_TTL))
            .build()
    }
}

const SESSION_COOKIE: &str = "session";
const SESSION_TTL: actix_web::cookie::time::Duration = actix_web::cookie::time::Duration::hours(2);

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    session: SessionMiddleware<CookieSessionStore>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let api = web::scope("/api/v1")
        .wrap(session)
        .service(login)
        .service(register)
        .service(activate)
        .service(create_post)
        .service(get_post)
        .service(update_post)
        .service(delete_post);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Construct the HTTP server and mark the process ready.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when building adapters or binding fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(build_http_state(&config)?);
    let policy = SessionPolicy {
        key: config.key,
        cookie_secure: config.cookie_secure,
        same_site: config.same_site,
    };

    let workers_health = health_state.clone();
    let server = HttpServer::new(move || {
        build_app(
            workers_health.clone(),
            http_state.clone(),
            policy.middleware(),
        )
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}

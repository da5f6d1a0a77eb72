//! Server settings loaded via OrthoConfig.
//!
//! Every field can be set from the command line, a config file, or an
//! environment variable prefixed `SOCIAL_` (e.g. `SOCIAL_DATABASE_URL`).
//! Typed accessors validate values and fill in defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use serde::de::IntoDeserializer;
use url::Url;

use crate::domain::{
    ActivationLinkToken, CompensationPolicy, DEFAULT_INVITATION_TTL, RegistrationSettings,
};
use crate::outbound::mail::HttpMailConfig;
use crate::outbound::persistence::{DEFAULT_OPERATION_TIMEOUT, PoolConfig};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_KEY_PATH: &str = "/var/run/secrets/session_key";
const DEFAULT_MAIL_FROM: &str = "noreply@social.invalid";

/// Invalid or missing settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("missing required setting {name}")]
    Missing { name: &'static str },
    #[error("invalid value for {name}='{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl SettingsError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Raw server settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SOCIAL")]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub pool_max_size: Option<u32>,
    /// Per-operation database deadline in milliseconds.
    pub statement_timeout_ms: Option<u64>,
    /// Base URL activation links point at.
    pub frontend_base_url: Option<String>,
    /// Invitation lifetime in hours.
    pub invitation_ttl_hours: Option<u64>,
    /// `plaintext` or `digest`.
    pub activation_link_token: Option<String>,
    /// `invitation_only` or `invitation_and_user`.
    pub compensation: Option<String>,
    /// Mail provider send endpoint; unset selects the logging sender.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: Option<String>,
    /// Mark outgoing mail as sandboxed.
    #[ortho_config(default = false)]
    pub mail_sandbox: bool,
    /// File holding the session cookie key material.
    pub session_key_file: Option<PathBuf>,
    /// Fall back to a random session key when the file is unreadable.
    #[ortho_config(default = false)]
    pub session_allow_ephemeral: bool,
    /// Send the session cookie only over HTTPS; on unless set to `false`.
    pub cookie_secure: Option<bool>,
}

fn parse_choice<'de, T: Deserialize<'de>>(
    name: &'static str,
    raw: Option<&'de str>,
) -> Result<T, SettingsError>
where
    T: Default,
{
    match raw {
        None => Ok(T::default()),
        Some(value) => {
            T::deserialize(value.trim().into_deserializer()).map_err(
                |err: serde::de::value::Error| SettingsError::invalid(name, value, err),
            )
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse()
            .map_err(|err| SettingsError::invalid("bind_addr", raw, err))
    }

    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SettingsError::Missing {
                name: "database_url",
            })
    }

    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let mut config = PoolConfig::new(self.database_url()?).with_operation_timeout(
            self.statement_timeout_ms
                .map_or(DEFAULT_OPERATION_TIMEOUT, Duration::from_millis),
        );
        if let Some(size) = self.pool_max_size {
            if size == 0 {
                return Err(SettingsError::invalid("pool_max_size", "0", "must be positive"));
            }
            config = config.with_max_size(size);
        }
        Ok(config)
    }

    pub fn invitation_ttl(&self) -> Duration {
        self.invitation_ttl_hours
            .map_or(DEFAULT_INVITATION_TTL, |hours| {
                Duration::from_secs(hours.saturating_mul(60 * 60))
            })
    }

    pub fn registration(&self) -> Result<RegistrationSettings, SettingsError> {
        let base = self
            .frontend_base_url
            .as_deref()
            .unwrap_or(DEFAULT_FRONTEND_BASE_URL);
        Url::parse(base).map_err(|err| SettingsError::invalid("frontend_base_url", base, err))?;
        let compensation: CompensationPolicy =
            parse_choice("compensation", self.compensation.as_deref())?;
        let link_token: ActivationLinkToken =
            parse_choice("activation_link_token", self.activation_link_token.as_deref())?;
        Ok(RegistrationSettings::new(base)
            .with_compensation(compensation)
            .with_link_token(link_token))
    }

    /// HTTP mail settings, or `None` to use the logging sender.
    pub fn mail(&self) -> Result<Option<HttpMailConfig>, SettingsError> {
        let Some(raw_url) = self.mail_api_url.as_deref() else {
            return Ok(None);
        };
        let endpoint =
            Url::parse(raw_url).map_err(|err| SettingsError::invalid("mail_api_url", raw_url, err))?;
        let api_key = self
            .mail_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(SettingsError::Missing {
                name: "mail_api_key",
            })?;
        let from = self.mail_from.as_deref().unwrap_or(DEFAULT_MAIL_FROM);
        if !from.contains('@') {
            return Err(SettingsError::invalid("mail_from", from, "not an email address"));
        }
        Ok(Some(
            HttpMailConfig::new(endpoint, api_key, from).with_sandbox(self.mail_sandbox),
        ))
    }

    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure.unwrap_or(true)
    }

    pub fn session_key_file(&self) -> PathBuf {
        self.session_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_KEY_PATH))
    }
}

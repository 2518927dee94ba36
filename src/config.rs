// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into an
//! explicit [`Config`] and handed to constructors. Nothing reads the
//! environment after that.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HMAC secret for session tokens | Required |
//! | `JWT_ISSUER` | Session token issuer claim | `meetly-api` |
//! | `SESSION_TTL_SECS` | Session token lifetime | `86400` |
//! | `GOOGLE_CLIENT_ID` | Google OAuth client id | Required |
//! | `GOOGLE_CLIENT_SECRET` | Google OAuth client secret | Required |
//! | `GOOGLE_REDIRECT_URL` | OAuth callback URL registered with Google | Required |
//! | `REDIS_URL` | Confirmation ledger | In-memory (dev only) |
//! | `IDENTITY_DB_PATH` | redb credential store file | In-memory (dev only) |
//! | `CONFIRMATION_URL` | Base URL of the confirmation page | `https://meetlyplus.ru/confirm` |
//! | `EMAIL_WEBHOOK_URL` | Endpoint the mail relay POSTs to | Log only |
//! | `REQUEST_TIMEOUT_SECS` | Deadline for outbound calls per request | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::token::DEFAULT_ISSUER;
use crate::providers::GoogleConfig;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// HMAC signing secret. Startup fails if unset or empty.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";

pub const GOOGLE_CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";
pub const GOOGLE_CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";
pub const GOOGLE_REDIRECT_URL_ENV: &str = "GOOGLE_REDIRECT_URL";

/// Redis connection URL for the short-lived ledger.
///
/// When unset the service falls back to a process-local ledger, which loses
/// pending confirmations on restart and is not shared between replicas.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Path of the redb credential store. Unset means in-memory.
pub const IDENTITY_DB_PATH_ENV: &str = "IDENTITY_DB_PATH";

pub const CONFIRMATION_URL_ENV: &str = "CONFIRMATION_URL";
pub const EMAIL_WEBHOOK_URL_ENV: &str = "EMAIL_WEBHOOK_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_CONFIRMATION_URL: &str = "https://meetlyplus.ru/confirm";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub jwt_issuer: String,
    pub session_ttl: Duration,
    pub google: GoogleConfig,
    pub redis_url: Option<String>,
    pub identity_db_path: Option<PathBuf>,
    pub confirmation_url: Url,
    pub email_webhook_url: Option<Url>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("session_ttl", &self.session_ttl)
            .field("google_client_id", &self.google.client_id)
            .field("redis", &self.redis_url.is_some())
            .field("identity_db_path", &self.identity_db_path)
            .field("confirmation_url", &self.confirmation_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => parse_number::<u16>(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| ConfigError::Invalid {
            name: HOST_ENV,
            reason: format!("{e}"),
        })?;

        let jwt_secret = required(JWT_SECRET_ENV)?.into_bytes();
        let jwt_issuer = get(JWT_ISSUER_ENV).unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let session_ttl = Duration::from_secs(match get(SESSION_TTL_ENV) {
            Some(raw) => positive(SESSION_TTL_ENV, parse_number::<u64>(SESSION_TTL_ENV, &raw)?)?,
            None => DEFAULT_SESSION_TTL_SECS,
        });

        let google = GoogleConfig {
            client_id: required(GOOGLE_CLIENT_ID_ENV)?,
            client_secret: required(GOOGLE_CLIENT_SECRET_ENV)?,
            redirect_url: parse_url(GOOGLE_REDIRECT_URL_ENV, &required(GOOGLE_REDIRECT_URL_ENV)?)?.into(),
        };

        let confirmation_url = parse_url(
            CONFIRMATION_URL_ENV,
            &get(CONFIRMATION_URL_ENV).unwrap_or_else(|| DEFAULT_CONFIRMATION_URL.to_string()),
        )?;
        let email_webhook_url = get(EMAIL_WEBHOOK_URL_ENV)
            .map(|raw| parse_url(EMAIL_WEBHOOK_URL_ENV, &raw))
            .transpose()?;

        let request_timeout = Duration::from_secs(match get(REQUEST_TIMEOUT_ENV) {
            Some(raw) => positive(REQUEST_TIMEOUT_ENV, parse_number::<u64>(REQUEST_TIMEOUT_ENV, &raw)?)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        });

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_issuer,
            session_ttl,
            google,
            redis_url: get(REDIS_URL_ENV),
            identity_db_path: get(IDENTITY_DB_PATH_ENV).map(PathBuf::from),
            confirmation_url,
            email_webhook_url,
            request_timeout,
        })
    }
}

impl LogFormat {
    /// Read the log format on its own, so logging is up before the rest of
    /// the config is validated.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (JWT_SECRET_ENV, "s3cret"),
            (GOOGLE_CLIENT_ID_ENV, "client-id"),
            (GOOGLE_CLIENT_SECRET_ENV, "client-secret"),
            (GOOGLE_REDIRECT_URL_ENV, "https://app.example.com/auth/google/callback"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.jwt_issuer, "meetly-api");
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.confirmation_url.as_str(), "https://meetlyplus.ru/confirm");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.redis_url.is_none());
        assert!(config.identity_db_path.is_none());
        assert!(config.email_webhook_url.is_none());
    }

    #[test]
    fn missing_or_empty_secret_is_fatal() {
        let mut env = base_env();
        env.remove(JWT_SECRET_ENV);
        assert!(matches!(load(&env), Err(ConfigError::Missing(JWT_SECRET_ENV))));

        env.insert(JWT_SECRET_ENV, "   ");
        assert!(matches!(load(&env), Err(ConfigError::Missing(JWT_SECRET_ENV))));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = base_env();
        env.insert(PORT_ENV, "9090");
        env.insert(SESSION_TTL_ENV, "3600");
        env.insert(REDIS_URL_ENV, "redis://127.0.0.1:6379/0");
        env.insert(IDENTITY_DB_PATH_ENV, "/var/lib/meetly/identities.redb");

        let config = load(&env).unwrap();
        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379/0"));
        assert_eq!(
            config.identity_db_path,
            Some(PathBuf::from("/var/lib/meetly/identities.redb"))
        );
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut env = base_env();
        env.insert(PORT_ENV, "eighty");
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: PORT_ENV, .. })));

        let mut env = base_env();
        env.insert(REQUEST_TIMEOUT_ENV, "0");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: REQUEST_TIMEOUT_ENV, .. })
        ));

        let mut env = base_env();
        env.insert(CONFIRMATION_URL_ENV, "not a url");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: CONFIRMATION_URL_ENV, .. })
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("client-secret"));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SUPABASE_URL` | Supabase project URL; JWKS endpoint and issuer derive from it | Required |
//! | `SUPABASE_JWT_SECRET` | Shared secret for the local-development HMAC fallback | Unset |
//! | `SUPABASE_JWT_AUDIENCE` | Expected JWT audience claim | Unset |
//! | `JWKS_CACHE_TTL_SECS` | Key-set cache TTL in seconds | `300` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3210` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated allowed origins | local dev + entrenar.app |
//! | `SEED_USER_IDS` | Comma-separated subjects provisioned at startup | Unset |
//! | `SEED_ADMIN_IDS` | Comma-separated subjects provisioned as admins at startup | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::auth::jwks::DEFAULT_CACHE_TTL;
use crate::auth::verifier::VerifierConfig;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_JWT_SECRET_ENV: &str = "SUPABASE_JWT_SECRET";
pub const SUPABASE_JWT_AUDIENCE_ENV: &str = "SUPABASE_JWT_AUDIENCE";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const SEED_USER_IDS_ENV: &str = "SEED_USER_IDS";
pub const SEED_ADMIN_IDS_ENV: &str = "SEED_ADMIN_IDS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3210;
pub const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:3210,http://localhost:5173,https://entrenar.app,https://www.entrenar.app";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

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

/// Identity provider settings.
#[derive(Clone)]
pub struct AuthSettings {
    /// Provider base URL without trailing slash
    pub provider_url: String,
    pub jwt_secret: Option<String>,
    pub audience: Option<String>,
    pub cache_ttl: Duration,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("provider_url", &self.provider_url)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("audience", &self.audience)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl AuthSettings {
    /// `<base>/auth/v1/.well-known/jwks.json`
    pub fn jwks_url(&self) -> String {
        format!("{}/auth/v1/.well-known/jwks.json", self.provider_url)
    }

    /// `<base>/auth/v1`
    pub fn issuer(&self) -> String {
        format!("{}/auth/v1", self.provider_url)
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            issuer: self.issuer(),
            audience: self.audience.clone(),
            fallback_secret: self.jwt_secret.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub seed_user_ids: Vec<String>,
    pub seed_admin_ids: Vec<String>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        // Empty values count as unset
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let provider_url = get(SUPABASE_URL_ENV).ok_or(ConfigError::Missing(SUPABASE_URL_ENV))?;
        let provider_url = validate_provider_url(&provider_url)?;

        let cache_ttl = match get(JWKS_CACHE_TTL_ENV) {
            Some(raw) => Duration::from_secs(parse_number(JWKS_CACHE_TTL_ENV, &raw)?),
            None => DEFAULT_CACHE_TTL,
        };

        let port = match get(PORT_ENV) {
            Some(raw) => parse_number(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            auth: AuthSettings {
                provider_url,
                jwt_secret: get(SUPABASE_JWT_SECRET_ENV),
                audience: get(SUPABASE_JWT_AUDIENCE_ENV),
                cache_ttl,
            },
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            cors_origins: split_list(
                &get(CORS_ALLOWED_ORIGINS_ENV).unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
            ),
            seed_user_ids: get(SEED_USER_IDS_ENV)
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            seed_admin_ids: get(SEED_ADMIN_IDS_ENV)
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            log_format,
        })
    }
}

/// HTTPS is required except for a provider running on loopback.
fn validate_provider_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: SUPABASE_URL_ENV,
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );

    match url.scheme() {
        "https" => {}
        "http" if loopback => {}
        scheme => return Err(invalid(format!("scheme `{scheme}` is not allowed"))),
    }

    Ok(raw.trim_end_matches('/').to_string())
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

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

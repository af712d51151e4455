use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ServiceError};
use crate::store::DEFAULT_TTL_SECS;

const DEFAULT_LOGIN_URL: &str = "https://login.meteomatics.com/api/v1/token";
const DEFAULT_API_URL: &str = "https://api.meteomatics.com";

/// Where lookup results are cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ServiceError::Config(format!(
                "CACHE_BACKEND must be \"redis\" or \"memory\", got {other:?}"
            ))),
        }
    }
}

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_user: String,
    pub api_password: String,
    pub login_url: String,
    pub api_url: String,
    pub upstream_timeout: Duration,
    pub auth_max_attempts: u32,
    pub cache_backend: CacheBackendKind,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_tls: bool,
    pub cache_ttl: Duration,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ServiceError::Config(format!("{key} is not set")))
        };

        let port = parse_or(&lookup, "PORT", 3000)?;
        let api_user = required("METEOMATICS_USER")?;
        let api_password = required("METEOMATICS_PASSWORD")?;

        let login_url =
            lookup("METEOMATICS_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
        let api_url = lookup("METEOMATICS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let upstream_timeout =
            Duration::from_secs(parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 10)?);
        let auth_max_attempts = parse_or(&lookup, "AUTH_MAX_ATTEMPTS", 5)?;

        let cache_backend = match lookup("CACHE_BACKEND") {
            Some(value) => value.parse()?,
            None => CacheBackendKind::Redis,
        };

        let redis_host = lookup("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let redis_port = parse_or(&lookup, "REDIS_PORT", 6379)?;
        let redis_password = lookup("REDIS_PASSWORD").filter(|v| !v.is_empty());
        let redis_tls = parse_or(&lookup, "REDIS_TLS", false)?;

        let cache_ttl = Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", DEFAULT_TTL_SECS)?);

        Ok(Self {
            port,
            api_user,
            api_password,
            login_url,
            api_url,
            upstream_timeout,
            auth_max_attempts,
            cache_backend,
            redis_host,
            redis_port,
            redis_password,
            redis_tls,
            cache_ttl,
        })
    }

    /// Connection URL for database 0, `rediss://` when TLS is enabled
    pub fn redis_url(&self) -> String {
        let scheme = if self.redis_tls { "rediss" } else { "redis" };
        let auth = self
            .redis_password
            .as_deref()
            .map(|p| format!(":{}@", urlencoding::encode(p)))
            .unwrap_or_default();
        format!(
            "{}://{}{}:{}/0",
            scheme, auth, self.redis_host, self.redis_port
        )
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ServiceError::Config(format!("{key} has invalid value {value:?}"))),
        None => Ok(default),
    }
}

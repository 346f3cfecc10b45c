use std::collections::HashMap;
use std::env;
use std::fmt;

/// Raised when the environment does not describe a usable configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set (or is empty).
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    /// Domain of the identity provider, e.g. `tenant.eu.auth0.com`.
    pub auth0_domain: String,
    /// Audience every access token must be issued for.
    pub api_audience: String,
    /// Overrides the JWKS location derived from `auth0_domain`.
    pub jwks_url: Option<String>,
    pub jwks_timeout_secs: u64,
    /// Zero disables key-set caching.
    pub jwks_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required(vars, "DATABASE_URL")?,
            server_port: parsed(vars, "SERVER_PORT", 8080)?,
            server_host: optional(vars, "SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            auth0_domain: required(vars, "AUTH0_DOMAIN")?,
            api_audience: required(vars, "API_AUDIENCE")?,
            jwks_url: optional(vars, "JWKS_URL"),
            jwks_timeout_secs: parsed(vars, "JWKS_TIMEOUT_SECS", 5)?,
            jwks_cache_ttl_secs: parsed(vars, "JWKS_CACHE_TTL_SECS", 0)?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// The `iss` value tokens must carry.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.auth0_domain)
    }
}

fn optional(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(vars: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    optional(vars, key).ok_or(ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match optional(vars, key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

//! Process configuration, read once from the environment at startup.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use stockroom_observability::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("MONGO_URI"))
            .filter(|url| !url.trim().is_empty());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                expected: "a port number",
                value: raw,
            })?,
            None => 8080,
        };

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "BIND_ADDR",
                expected: "an IP address",
                value: raw,
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let timeout_secs: u64 = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "REQUEST_TIMEOUT_SECS",
                        expected: "a positive number of seconds",
                        value: raw,
                    });
                }
            },
            None => 10,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "LOG_FORMAT",
                expected: "'json' or 'pretty'",
                value: raw,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            database_url,
            bind_addr,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            log_format,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

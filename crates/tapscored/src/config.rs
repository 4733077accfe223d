//! Relay configuration, read once from the environment at startup.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::broadcaster::BroadcastConfig;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Errors that abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid PORT '{value}': expected an integer in 1-65535")]
    InvalidPort { value: String },

    #[error("invalid BIND_ADDRESS '{value}': expected an IP address")]
    InvalidBindAddress { value: String },
}

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to bind the listener to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Enable per-connection and per-message debug logs
    pub debug: bool,
    /// Best-player broadcast timing
    pub broadcast: BroadcastConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            debug: false,
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Loads config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads config through `lookup`, which maps a variable name to its value.
    ///
    /// Unset variables fall back to defaults; set but unparseable ones are
    /// errors rather than silently ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("BIND_ADDRESS") {
            config.bind_address = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress { value })?;
        }

        if let Some(value) = lookup("PORT") {
            config.port = match value.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(ConfigError::InvalidPort { value }),
            };
        }

        if let Some(value) = lookup("DEBUG") {
            config.debug = parse_flag(&value);
        }

        Ok(config)
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Empty, `0`, `false`, `no` and `off` (any case) are off; anything else is on.
fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

//! Environment-backed configuration for the `tally` binary.
//!
//! Pool settings live in [`PoolConfig`]; this layer adds the HTTP listener.
//! Override with `TALLY_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;

use crate::pool::PoolConfig;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8090;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `TALLY_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8090`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Verifier pool settings.
    pub pool: PoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            pool: PoolConfig::default(),
        }
    }
}

impl Config {
    /// Listening port, read by `from_env` and the health check.
    pub const ENV_PORT: &'static str = "TALLY_PORT";
    pub const ENV_BIND_ADDR: &'static str = "TALLY_BIND_ADDR";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let pool = PoolConfig::from_env();

        Ok(Self {
            port,
            bind_addr,
            pool,
        })
    }

    /// Validates pool settings and the audit path (does not create files).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool
            .validate()
            .map_err(|e| ConfigError::InvalidPool {
                reason: e.to_string(),
            })?;

        if self.pool.write_failed && self.pool.audit_path.is_dir() {
            return Err(ConfigError::NotAFile {
                path: self.pool.audit_path.clone(),
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        match self.bind_addr {
            IpAddr::V4(addr) => format!("{}:{}", addr, self.port),
            IpAddr::V6(addr) => format!("[{}]:{}", addr, self.port),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }
}

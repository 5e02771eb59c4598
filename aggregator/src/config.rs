use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Listener and admin listener both bind {0}")]
    ListenerConflict(String),

    #[error("Upstream timeout must be at least one second")]
    InvalidTimeout,

    #[error("Manual store path is empty")]
    EmptyStorePath,
}

/// Service configuration. Upstream URLs and credentials are not part of it;
/// they come from the environment on every request (see `env`).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Public API and manual data endpoints
    pub listener: Listener,
    /// Health and readiness probes
    pub admin_listener: Listener,
    pub manual_store: ManualStoreConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener.overlaps(&self.admin_listener) {
            return Err(ValidationError::ListenerConflict(format!(
                "port {}",
                self.listener.port
            )));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if let ManualStoreConfig::Filesystem { path } = &self.manual_store
            && path.as_os_str().is_empty()
        {
            return Err(ValidationError::EmptyStorePath);
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    /// Whether both listeners would claim the same socket. A wildcard host
    /// binds every interface, so it collides with any host on that port.
    fn overlaps(&self, other: &Listener) -> bool {
        self.port == other.port
            && (self.host == other.host || is_wildcard(&self.host) || is_wildcard(&other.host))
    }
}

fn is_wildcard(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_unspecified())
}

/// Where the manual document lives. `memory` keeps it for the lifetime of
/// the process only.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum ManualStoreConfig {
    Filesystem { path: PathBuf },
    Memory,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

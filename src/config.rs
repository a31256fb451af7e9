//! Resolved server configuration
//!
//! The host receives a single, already-merged configuration bundle; source
//! precedence (CLI over environment over file) is the caller's concern. The
//! server binary resolves this from clap arguments.

use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};
use crate::filter::FilterPolicy;

/// Transport the server listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

impl std::str::FromStr for TransportKind {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => Err(HostError::Config(format!(
                "unknown transport \"{other}\" (expected \"stdio\" or \"http\")"
            ))),
        }
    }
}

/// What happens to calls arriving past the concurrency ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for a slot, up to `queue_depth` waiters; beyond that, busy
    Queue,
    /// Answer `ServerBusy` immediately
    Reject,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queue" => Ok(OverflowPolicy::Queue),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(HostError::Config(format!(
                "unknown overflow policy \"{other}\" (expected \"queue\" or \"reject\")"
            ))),
        }
    }
}

/// Fully-resolved configuration value bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    /// Per-call time budget in milliseconds
    pub call_timeout_ms: u64,
    /// Maximum simultaneous in-flight calls
    pub max_concurrency: usize,
    pub overflow: OverflowPolicy,
    /// Bound on waiting calls under the queue policy
    pub queue_depth: usize,
    pub filter: FilterPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "toolhost".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 8000,
            call_timeout_ms: 30_000,
            max_concurrency: 10,
            overflow: OverflowPolicy::Queue,
            queue_depth: 64,
            filter: FilterPolicy::allow_all(),
        }
    }
}

impl ServerConfig {
    /// Reject inconsistent bundles before the server starts
    pub fn validate(&self) -> Result<()> {
        if self.server_name.is_empty() {
            return Err(HostError::Config("server_name must be non-empty".into()));
        }
        if self.call_timeout_ms == 0 {
            return Err(HostError::Config("call_timeout_ms must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(HostError::Config("max_concurrency must be at least 1".into()));
        }
        if self.overflow == OverflowPolicy::Queue && self.queue_depth == 0 {
            return Err(HostError::Config(
                "queue_depth must be at least 1 under the queue policy".into(),
            ));
        }
        if self.transport == TransportKind::Http && self.host.is_empty() {
            return Err(HostError::Config("host must be non-empty for http".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ServerConfig {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ServerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_queue_depth_only_matters_for_queue_policy() {
        let queued = ServerConfig {
            queue_depth: 0,
            overflow: OverflowPolicy::Queue,
            ..Default::default()
        };
        assert!(queued.validate().is_err());

        let rejecting = ServerConfig {
            queue_depth: 0,
            overflow: OverflowPolicy::Reject,
            ..Default::default()
        };
        assert!(rejecting.validate().is_ok());
    }

    #[test]
    fn transport_parses_from_str() {
        assert_eq!("stdio".parse::<TransportKind>().unwrap(), TransportKind::Stdio);
        assert_eq!("http".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert!("websocket".parse::<TransportKind>().is_err());
    }
}

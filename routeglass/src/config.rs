//! Service configuration.
//!
//! Loaded once at startup and handed to
//! [`LookingGlass`](crate::service::LookingGlass); nothing reads it from
//! global state.
//!
//! ```json
//! {
//!   "logFile": "commands.log",
//!   "timeouts": { "command": 60, "stream": 300 },
//!   "ssh": { "security": "legacyCompatible", "hostKeyVerification": "disabled" },
//!   "verification": { "enabled": false },
//!   "routers": [ ... ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::driver::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_STREAM_TIMEOUT};
use crate::error::ConfigError;
use crate::inventory::{DeviceProfile, Inventory};
use crate::transport::SshOptions;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Audit log file. Empty or absent disables file logging.
    pub log_file: Option<PathBuf>,

    pub timeouts: Timeouts,

    pub ssh: SshOptions,

    pub verification: VerificationConfig,

    /// Devices, in display order.
    pub routers: Vec<DeviceProfile>,
}

impl Config {
    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The audit log path, if file logging is enabled.
    pub fn audit_path(&self) -> Option<&Path> {
        self.log_file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Move the device list into an [`Inventory`].
    pub fn take_inventory(&mut self) -> Result<Inventory, ConfigError> {
        Inventory::from_profiles(std::mem::take(&mut self.routers))
    }
}

/// Execution deadlines, in whole seconds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    /// Buffered execution deadline.
    #[serde(with = "seconds")]
    pub command: Duration,

    /// Streaming execution deadline.
    #[serde(with = "seconds")]
    pub stream: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND_TIMEOUT,
            stream: DEFAULT_STREAM_TIMEOUT,
        }
    }
}

/// Human-verification gate.
///
/// The token itself is checked by the HTTP layer; when enabled, requests
/// without one are rejected here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationConfig {
    pub enabled: bool,
}

/// `Duration` as whole seconds.
pub(crate) mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HostKeyVerification, SecurityLevel};

    const SAMPLE: &str = r#"{
        "logFile": "commands.log",
        "timeouts": { "command": 30 },
        "ssh": { "security": "balanced" },
        "verification": { "enabled": true },
        "routers": [
            {
                "name": "r1",
                "title": "Router 1",
                "osType": "huawei",
                "ipv6Enabled": true,
                "connection": { "host": "192.0.2.1", "username": "lg", "password": "x" }
            },
            {
                "name": "r2",
                "title": "Router 2",
                "osType": "junos",
                "connection": { "host": "192.0.2.2", "port": 2222, "username": "lg", "password": "x" }
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.audit_path(), Some(Path::new("commands.log")));
        assert_eq!(config.timeouts.command, Duration::from_secs(30));
        assert_eq!(config.timeouts.stream, DEFAULT_STREAM_TIMEOUT);
        assert_eq!(config.ssh.security, SecurityLevel::Balanced);
        assert!(matches!(
            config.ssh.host_key_verification,
            HostKeyVerification::Disabled
        ));
        assert!(config.verification.enabled);

        let inventory = config.take_inventory().unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.get("r2").unwrap().connection.port, 2222);
        assert!(config.routers.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.audit_path(), None);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.ssh.security, SecurityLevel::LegacyCompatible);
        assert!(!config.verification.enabled);
    }

    #[test]
    fn test_empty_log_file_disables_audit_file() {
        let config = Config::from_json(r#"{"logFile": ""}"#).unwrap();
        assert_eq!(config.audit_path(), None);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_path("/nonexistent/routeglass.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

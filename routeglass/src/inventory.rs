//! Device inventory.

use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::channel::NoisePattern;
use crate::command::AddressFamily;
use crate::config::seconds;
use crate::error::ConfigError;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default bound on handshake plus authentication.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// How to reach one device.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(deserialize_with = "secret")]
    pub password: SecretString,

    /// Connect timeout, in whole seconds on the wire.
    #[serde(default = "default_connect_timeout", with = "seconds")]
    pub timeout: Duration,
}

impl ConnectionDescriptor {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: SecretString::from(password.into()),
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port`, for logging.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Static description of one looking-glass device.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    /// Identifier used in requests.
    pub name: String,

    /// Display name.
    pub title: String,

    /// Dialect name (`junos`, `huawei`, ...).
    #[serde(rename = "osType")]
    pub dialect: String,

    #[serde(default)]
    pub location: String,

    #[serde(default = "enabled")]
    pub ipv4_enabled: bool,

    #[serde(default)]
    pub ipv6_enabled: bool,

    /// Device-specific noise, in addition to the dialect's defaults.
    #[serde(default)]
    pub noise: Vec<NoisePattern>,

    pub connection: ConnectionDescriptor,
}

fn enabled() -> bool {
    true
}

impl DeviceProfile {
    pub fn new(
        name: impl Into<String>,
        dialect: impl Into<String>,
        connection: ConnectionDescriptor,
    ) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            dialect: dialect.into(),
            location: String::new(),
            ipv4_enabled: true,
            ipv6_enabled: false,
            noise: Vec::new(),
            connection,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_families(mut self, ipv4: bool, ipv6: bool) -> Self {
        self.ipv4_enabled = ipv4;
        self.ipv6_enabled = ipv6;
        self
    }

    pub fn with_noise_pattern(mut self, pattern: NoisePattern) -> Self {
        self.noise.push(pattern);
        self
    }

    /// Whether the device serves queries of this family.
    pub fn supports(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.ipv4_enabled,
            AddressFamily::Ipv6 => self.ipv6_enabled,
        }
    }

    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            value: self.name.clone(),
            text: self.title.clone(),
            location: self.location.clone(),
            ipv4_enabled: self.ipv4_enabled,
            ipv6_enabled: self.ipv6_enabled,
        }
    }
}

/// Public projection of a [`DeviceProfile`], without connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub value: String,
    pub text: String,
    pub location: String,
    pub ipv4_enabled: bool,
    pub ipv6_enabled: bool,
}

/// Devices by identifier, in configuration order.
#[derive(Debug, Default)]
pub struct Inventory {
    devices: IndexMap<String, DeviceProfile>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from profiles, rejecting duplicate identifiers.
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = DeviceProfile>,
    ) -> Result<Self, ConfigError> {
        let mut inventory = Self::new();
        for profile in profiles {
            inventory.insert(profile)?;
        }
        Ok(inventory)
    }

    pub fn insert(&mut self, profile: DeviceProfile) -> Result<(), ConfigError> {
        if self.devices.contains_key(&profile.name) {
            return Err(ConfigError::DuplicateDevice(profile.name));
        }
        self.devices.insert(profile.name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DeviceProfile> {
        self.devices.get(name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.devices.values()
    }

    pub fn summaries(&self) -> Vec<DeviceSummary> {
        self.iter().map(DeviceProfile::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn profile(name: &str) -> DeviceProfile {
        DeviceProfile::new(name, "junos", ConnectionDescriptor::new("192.0.2.1", "lg", "pw"))
    }

    #[test]
    fn test_deserialize_profile() {
        let profile: DeviceProfile = serde_json::from_str(
            r#"{
                "name": "mil1",
                "title": "Milan MX204",
                "osType": "junos",
                "location": "Milan",
                "ipv4Enabled": true,
                "ipv6Enabled": true,
                "noise": [{"suffix": "@mil1>"}],
                "connection": {
                    "type": "ssh",
                    "host": "192.0.2.10",
                    "username": "lg",
                    "password": "hunter2",
                    "timeout": 5
                }
            }"#,
        )
        .unwrap();

        assert_eq!(profile.dialect, "junos");
        assert!(profile.supports(AddressFamily::Ipv6));
        assert_eq!(profile.noise, vec![NoisePattern::suffix("@mil1>")]);
        assert_eq!(profile.connection.port, 22);
        assert_eq!(profile.connection.timeout, Duration::from_secs(5));
        assert_eq!(profile.connection.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let descriptor = ConnectionDescriptor::new("192.0.2.1", "lg", "hunter2");
        assert!(!format!("{descriptor:?}").contains("hunter2"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Inventory::from_profiles([profile("r1"), profile("r1")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDevice(name) if name == "r1"));
    }

    #[test]
    fn test_summaries_keep_order() {
        let inventory =
            Inventory::from_profiles([profile("zrh"), profile("ams"), profile("mil")]).unwrap();
        let names: Vec<_> = inventory.summaries().into_iter().map(|s| s.value).collect();
        assert_eq!(names, ["zrh", "ams", "mil"]);
    }

    #[test]
    fn test_summary_json() {
        let summary = profile("r1")
            .with_title("Router 1")
            .with_location("Milan")
            .with_families(true, true)
            .summary();
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            serde_json::json!({
                "value": "r1",
                "text": "Router 1",
                "location": "Milan",
                "ipv4Enabled": true,
                "ipv6Enabled": true
            })
        );
    }
}

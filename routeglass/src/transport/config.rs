//! SSH connection options.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::Preferred;
use russh::keys::PublicKey;
use serde::{Deserialize, Serialize};

use super::algorithms;

/// Algorithm policy for the SSH handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityLevel {
    /// Modern algorithms only.
    Secure,
    /// Modern algorithms plus SHA-1 RSA keys, CBC ciphers, and HMAC-SHA1.
    Balanced,
    /// Everything russh can negotiate, including SHA-1 key exchange and
    /// 3DES. Default, since looking-glass targets are often old routers.
    #[default]
    LegacyCompatible,
}

impl SecurityLevel {
    /// russh algorithm preferences for this level.
    pub fn preferred(self) -> Preferred {
        let (kex, key, cipher, mac) = match self {
            SecurityLevel::Secure => (
                algorithms::SECURE_KEX_ORDER,
                algorithms::SECURE_KEY_TYPES,
                algorithms::SECURE_CIPHERS,
                algorithms::SECURE_MAC_ALGORITHMS,
            ),
            SecurityLevel::Balanced => (
                algorithms::BALANCED_KEX_ORDER,
                algorithms::BALANCED_KEY_TYPES,
                algorithms::BALANCED_CIPHERS,
                algorithms::BALANCED_MAC_ALGORITHMS,
            ),
            SecurityLevel::LegacyCompatible => (
                algorithms::LEGACY_KEX_ORDER,
                algorithms::LEGACY_KEY_TYPES,
                algorithms::LEGACY_CIPHERS,
                algorithms::LEGACY_MAC_ALGORITHMS,
            ),
        };
        Preferred {
            kex: Cow::Borrowed(kex),
            key: Cow::Borrowed(key),
            cipher: Cow::Borrowed(cipher),
            mac: Cow::Borrowed(mac),
            ..Preferred::default()
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Secure => "secure",
            SecurityLevel::Balanced => "balanced",
            SecurityLevel::LegacyCompatible => "legacyCompatible",
        }
    }
}

/// Decides whether a server host key is trusted.
pub trait HostKeyVerifier: Send + Sync {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool;
}

/// Host key verification mode.
///
/// Defaults to [`Disabled`](Self::Disabled): looking-glass routers are
/// reached over management networks and are frequently re-keyed.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostKeyVerification {
    /// Accept any key.
    #[default]
    Disabled,

    /// Accept and learn unknown keys, reject changed keys.
    AcceptNew,

    /// Reject unknown and changed keys.
    Strict,

    /// Accept only keys whose SHA-256 fingerprint (`SHA256:...`) is listed.
    Pinned(Vec<String>),

    /// Delegate to a caller-supplied policy.
    #[serde(skip)]
    Custom(Arc<dyn HostKeyVerifier>),
}

impl fmt::Debug for HostKeyVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyVerification::Disabled => f.write_str("Disabled"),
            HostKeyVerification::AcceptNew => f.write_str("AcceptNew"),
            HostKeyVerification::Strict => f.write_str("Strict"),
            HostKeyVerification::Pinned(fingerprints) => {
                f.debug_tuple("Pinned").field(fingerprints).finish()
            }
            HostKeyVerification::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Options shared by every connection a connector makes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SshOptions {
    /// Algorithm policy.
    pub security: SecurityLevel,

    /// Host key policy.
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file for `AcceptNew`/`Strict` (default: `~/.ssh/known_hosts`).
    pub known_hosts_path: Option<PathBuf>,

    /// Drop the connection after this long without traffic.
    #[serde(skip)]
    pub inactivity_timeout: Option<Duration>,
}

impl SshOptions {
    pub fn with_security(mut self, security: SecurityLevel) -> Self {
        self.security = security;
        self
    }

    pub fn with_host_key_verification(mut self, verification: HostKeyVerification) -> Self {
        self.host_key_verification = verification;
        self
    }

    pub fn with_known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

//! Error types for routeglass.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::transport::ExitStatus;

/// Main error type for routeglass operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Request and translation errors
    #[error("{0}")]
    Query(#[from] QueryError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether the error was caused by the request rather than the device
    /// or the network (4xx rather than 5xx for an HTTP front end).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Query(_))
    }
}

/// Transport layer errors (SSH connection, authentication, channel setup).
#[derive(Error, Debug)]
pub enum TransportError {
    /// TCP connect or SSH handshake failed
    #[error("SSH connection to {host}:{port} failed: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: russh::Error,
    },

    /// Handshake and authentication did not finish in time
    #[error("SSH connection to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host not present in known_hosts under strict verification
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host key rejected by a pinned or custom policy
    #[error("Host key for {host}:{port} rejected ({fingerprint})")]
    HostKeyRejected {
        host: String,
        port: u16,
        fingerprint: String,
    },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Opening the session channel failed
    #[error("SSH session failed: {0}")]
    SessionFailed(#[source] russh::Error),

    /// Attaching the command's output streams failed
    #[error("Output pipe setup failed: {0}")]
    PipeFailed(#[source] russh::Error),

    /// The device refused to start the command
    #[error("Command start failed: {reason}")]
    StartFailed { reason: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,
}

/// Errors raised while a started command is running.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Deadline exceeded before any output was captured
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),

    /// Command failed without producing any output
    #[error("Command failed: {status}")]
    CommandFailed { status: ExitStatus },
}

/// Request validation and translation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// No command template exists for this combination
    #[error("Unsupported query '{query}' ({family}) for dialect '{dialect}'")]
    UnsupportedCombination {
        dialect: String,
        query: String,
        family: String,
    },

    /// Query name is not recognised
    #[error("Unsupported query type '{0}'")]
    UnknownQuery(String),

    /// Protocol name is not recognised
    #[error("Unsupported protocol '{0}'")]
    UnknownFamily(String),

    /// Query needs a target address but none was given
    #[error("Address is required for query '{query}'")]
    AddressRequired { query: String },

    /// Target address failed validation
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Command text cannot be submitted as one invocation
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Unknown device identifier
    #[error("Invalid router selection '{0}'")]
    DeviceNotFound(String),

    /// Device does not serve the requested address family
    #[error("{family} is not enabled on '{device}'")]
    FamilyDisabled { device: String, family: String },

    /// Human verification rejected
    #[error("Verification failed")]
    VerificationFailed,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two devices share one identifier
    #[error("Duplicate router name '{0}'")]
    DuplicateDevice(String),

    /// A noise pattern regex does not compile
    #[error("Invalid noise pattern for '{device}': {source}")]
    InvalidNoisePattern {
        device: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type alias using routeglass's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let err: Error = QueryError::DeviceNotFound("r9".into()).into();
        assert!(err.is_client_error());

        let err: Error = TransportError::Disconnected.into();
        assert!(!err.is_client_error());

        let err: Error = ExecutionError::Timeout(Duration::from_secs(60)).into();
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_query_error_messages() {
        let err = QueryError::AddressRequired {
            query: "ping".into(),
        };
        assert_eq!(err.to_string(), "Address is required for query 'ping'");
    }
}

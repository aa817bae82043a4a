//! The looking-glass service: request validation, execution, and audit.
//!
//! HTTP parsing, rate limiting, and captcha round trips belong to the
//! caller. [`LookingGlass`] takes a parsed [`ExecutionRequest`] and does
//! everything after that.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditRecord, AuditSink, FileAuditLog, LogAuditSink};
use crate::channel::OutputFilter;
use crate::command::{AddressFamily, Command, CommandTranslator, QueryKind};
use crate::config::{Config, VerificationConfig};
use crate::driver::{
    BufferedExecutor, EventSink, ExecutionResult, StreamOutcome, StreamingExecutor,
};
use crate::error::{ConfigError, Error, QueryError};
use crate::inventory::{DeviceProfile, DeviceSummary, Inventory};
use crate::platform::DialectRegistry;
use crate::transport::{SecurityLevel, SshConnector, Transport};

/// A diagnostic request as received from a client.
///
/// Field names match the JSON bodies of the web front end:
/// `{"query":"bgp","protocol":"IPv4","addr":"192.0.2.0/24","router":"r1","token":"..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub query: String,
    pub protocol: String,
    #[serde(default)]
    pub addr: Option<String>,
    pub router: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Originating client, set by the HTTP layer.
    #[serde(skip)]
    pub client: String,
}

impl ExecutionRequest {
    pub fn new(
        query: impl Into<String>,
        protocol: impl Into<String>,
        router: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            protocol: protocol.into(),
            router: router.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// The address, treating an empty string as absent.
    pub fn address(&self) -> Option<&str> {
        self.addr.as_deref().filter(|a| !a.trim().is_empty())
    }

    fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub routers: usize,
    pub protocol: &'static str,
    pub algorithms: &'static str,
}

/// Looking-glass engine over a [`Transport`].
///
/// # Example
///
/// ```rust,no_run
/// use routeglass::config::Config;
/// use routeglass::service::{ExecutionRequest, LookingGlass};
///
/// # async fn example() -> Result<(), routeglass::Error> {
/// let glass = LookingGlass::from_config(Config::from_path("config.json")?)?;
///
/// let request = ExecutionRequest::new("summary", "IPv6", "r1").with_client("198.51.100.7");
/// let result = glass.execute_buffered(&request).await?;
/// println!("{}", result.output);
/// # Ok(())
/// # }
/// ```
pub struct LookingGlass<T> {
    translator: CommandTranslator,
    inventory: Inventory,
    filters: HashMap<String, OutputFilter>,
    buffered: BufferedExecutor<T>,
    streaming: StreamingExecutor<T>,
    audit: Arc<dyn AuditSink>,
    verification: VerificationConfig,
    security: SecurityLevel,
}

impl LookingGlass<SshConnector> {
    /// Build the SSH-backed service, auditing to the configured log file
    /// (or to the `log` facade when none is set).
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let audit: Arc<dyn AuditSink> = match config.audit_path() {
            Some(path) => Arc::new(FileAuditLog::open(path).map_err(|source| {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?),
            None => Arc::new(LogAuditSink),
        };
        let transport = SshConnector::new(config.ssh.clone());
        Ok(Self::new(config, transport, audit)?)
    }
}

impl<T: Transport> LookingGlass<T> {
    pub fn new(
        mut config: Config,
        transport: T,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let inventory = config.take_inventory()?;
        let translator = CommandTranslator::with_builtin();
        let filters = build_filters(&translator, &inventory)?;
        let transport = Arc::new(transport);

        info!(
            "Looking glass ready: {} routers, {} algorithms",
            inventory.len(),
            config.ssh.security.as_str()
        );

        Ok(Self {
            translator,
            inventory,
            filters,
            buffered: BufferedExecutor::new(transport.clone()).with_timeout(config.timeouts.command),
            streaming: StreamingExecutor::new(transport).with_timeout(config.timeouts.stream),
            audit,
            verification: config.verification,
            security: config.ssh.security,
        })
    }

    /// Replace the dialect table, e.g. to add vendors beyond the built-in
    /// ones.
    pub fn with_registry(mut self, registry: DialectRegistry) -> Result<Self, ConfigError> {
        let translator = CommandTranslator::new(registry);
        self.filters = build_filters(&translator, &self.inventory)?;
        self.translator = translator;
        Ok(self)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn translator(&self) -> &CommandTranslator {
        &self.translator
    }

    /// Public view of the configured devices, in configuration order.
    pub fn list_devices(&self) -> Vec<DeviceSummary> {
        self.inventory.summaries()
    }

    /// Validate a request and translate it for its device.
    ///
    /// Checks run in order: query name known, address present when the
    /// query needs one, verification token, device exists, family enabled
    /// on the device, translation. An unknown query is reported as such
    /// even when the address is also missing.
    pub fn prepare(
        &self,
        request: &ExecutionRequest,
    ) -> Result<(&DeviceProfile, Command), QueryError> {
        let kind: QueryKind = request.query.parse()?;
        let address = request.address();
        if kind.requires_target() && address.is_none() {
            return Err(QueryError::AddressRequired {
                query: kind.to_string(),
            });
        }

        if self.verification.enabled && !request.has_token() {
            return Err(QueryError::VerificationFailed);
        }

        let device = self
            .inventory
            .get(&request.router)
            .ok_or_else(|| QueryError::DeviceNotFound(request.router.clone()))?;

        let family: AddressFamily = request.protocol.parse()?;
        if !device.supports(family) {
            return Err(QueryError::FamilyDisabled {
                device: device.name.clone(),
                family: family.to_string(),
            });
        }

        let command = self
            .translator
            .translate(kind, family, address, &device.dialect)?;
        Ok((device, command))
    }

    /// Run a request and return its filtered output.
    pub async fn execute_buffered(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, Error> {
        let (device, command) = self.prepare(request)?;

        info!("Executing command on {}: {}", device.name, command);
        let outcome = self
            .buffered
            .execute(&device.connection, &command, &self.filter_for(device))
            .await;

        self.record(request, device, &command, outcome.is_ok());

        let mut result = outcome?;
        result.router = Some(device.title.clone());
        Ok(result)
    }

    /// Run a request, forwarding events to `sink`.
    ///
    /// A rejected request returns an error and sends nothing. Once the
    /// request is accepted every outcome, failures included, reaches the
    /// sink as events.
    pub async fn execute_streaming<S: EventSink>(
        &self,
        request: &ExecutionRequest,
        sink: S,
    ) -> Result<StreamOutcome, QueryError> {
        let (device, command) = self.prepare(request)?;

        info!(
            "Starting streaming command from {}: {}",
            client_label(request),
            command
        );
        let outcome = self
            .streaming
            .execute(&device.connection, &command, &self.filter_for(device), sink)
            .await;

        self.record(request, device, &command, outcome.is_success());
        Ok(outcome)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            version: env!("CARGO_PKG_VERSION"),
            routers: self.inventory.len(),
            protocol: "SSH",
            algorithms: self.security.as_str(),
        }
    }

    fn filter_for(&self, device: &DeviceProfile) -> OutputFilter {
        self.filters.get(&device.name).cloned().unwrap_or_default()
    }

    fn record(
        &self,
        request: &ExecutionRequest,
        device: &DeviceProfile,
        command: &Command,
        success: bool,
    ) {
        self.audit.record(&AuditRecord::new(
            client_label(request),
            device.name.as_str(),
            command.as_str(),
            success,
        ));
    }
}

fn client_label(request: &ExecutionRequest) -> &str {
    if request.client.is_empty() {
        "unknown"
    } else {
        &request.client
    }
}

/// Compile each device's noise patterns (dialect defaults first, then the
/// device's own).
fn build_filters(
    translator: &CommandTranslator,
    inventory: &Inventory,
) -> Result<HashMap<String, OutputFilter>, ConfigError> {
    let mut filters = HashMap::with_capacity(inventory.len());
    for device in inventory.iter() {
        let defaults = match translator.dialect(&device.dialect) {
            Some(dialect) => dialect.noise_patterns.as_slice(),
            None => {
                warn!(
                    "Router '{}' uses unknown dialect '{}'; its queries will be rejected",
                    device.name, device.dialect
                );
                &[]
            }
        };
        let filter = OutputFilter::new(defaults.iter().chain(&device.noise)).map_err(|source| {
            ConfigError::InvalidNoisePattern {
                device: device.name.clone(),
                source,
            }
        })?;
        filters.insert(device.name.clone(), filter);
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::channel::NoisePattern;
    use crate::error::TransportError;
    use crate::inventory::ConnectionDescriptor;
    use crate::transport::RemoteCommand;

    /// Never connects; prepare() tests do not reach the transport.
    struct Offline;

    impl Transport for Offline {
        async fn run(
            &self,
            _descriptor: &ConnectionDescriptor,
            _command: &str,
        ) -> Result<RemoteCommand, TransportError> {
            Err(TransportError::Disconnected)
        }
    }

    fn config(verification: bool) -> Config {
        let mut config = Config::default();
        config.verification.enabled = verification;
        config.routers = vec![
            DeviceProfile::new("r1", "huawei", ConnectionDescriptor::new("192.0.2.1", "lg", "pw"))
                .with_title("Router 1")
                .with_families(true, true),
            DeviceProfile::new("r2", "junos", ConnectionDescriptor::new("192.0.2.2", "lg", "pw"))
                .with_title("Router 2")
                .with_families(true, false),
        ];
        config
    }

    fn glass(verification: bool) -> (LookingGlass<Offline>, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let glass = LookingGlass::new(config(verification), Offline, audit.clone()).unwrap();
        (glass, audit)
    }

    #[test]
    fn test_summary_without_address() {
        let (glass, _) = glass(false);
        let (device, command) = glass
            .prepare(&ExecutionRequest::new("summary", "IPv6", "r1"))
            .unwrap();
        assert_eq!(device.name, "r1");
        assert_eq!(command.as_str(), "display bgp ipv6 peer");
    }

    #[test]
    fn test_validation_order() {
        let (glass, _) = glass(true);

        // The query name comes first, even with the address missing.
        let err = glass
            .prepare(&ExecutionRequest::new("whois", "IPv4", "nope"))
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownQuery("whois".into()));

        // Address is checked before verification and device lookup.
        let err = glass
            .prepare(&ExecutionRequest::new("ping", "IPv4", "nope"))
            .unwrap_err();
        assert!(matches!(err, QueryError::AddressRequired { .. }));

        let err = glass
            .prepare(&ExecutionRequest::new("ping", "IPv4", "nope").with_address("192.0.2.9"))
            .unwrap_err();
        assert_eq!(err, QueryError::VerificationFailed);

        let err = glass
            .prepare(
                &ExecutionRequest::new("ping", "IPv4", "nope")
                    .with_address("192.0.2.9")
                    .with_token("t"),
            )
            .unwrap_err();
        assert_eq!(err, QueryError::DeviceNotFound("nope".into()));

        let err = glass
            .prepare(
                &ExecutionRequest::new("ping", "IPv6", "r2")
                    .with_address("2001:db8::1")
                    .with_token("t"),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::FamilyDisabled { .. }));

        let err = glass
            .prepare(
                &ExecutionRequest::new("ping", "IPv4", "r2")
                    .with_address("2001:db8::1")
                    .with_token("t"),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidAddress { .. }));
    }

    #[test]
    fn test_unknown_dialect_is_unsupported() {
        let mut config = config(false);
        config.routers.push(DeviceProfile::new(
            "r3",
            "ios-xr",
            ConnectionDescriptor::new("192.0.2.3", "lg", "pw"),
        ));
        let glass = LookingGlass::new(config, Offline, Arc::new(MemoryAuditLog::new())).unwrap();
        let err = glass
            .prepare(&ExecutionRequest::new("summary", "IPv4", "r3"))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedCombination { .. }));
    }

    #[test]
    fn test_invalid_noise_pattern() {
        let mut config = config(false);
        config.routers[0].noise.push(NoisePattern::regex("(unclosed"));
        let err = LookingGlass::new(config, Offline, Arc::new(MemoryAuditLog::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidNoisePattern { device, .. } if device == "r1"));
    }

    #[test]
    fn test_rejected_request_is_not_audited() {
        let (glass, audit) = glass(false);
        let _ = glass.prepare(&ExecutionRequest::new("summary", "IPv4", "nope"));
        assert!(audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_is_audited() {
        let (glass, audit) = glass(false);
        let request = ExecutionRequest::new("summary", "IPv4", "r2").with_client("198.51.100.7");
        let err = glass.execute_buffered(&request).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client, "198.51.100.7");
        assert_eq!(records[0].device, "r2");
        assert_eq!(records[0].command, "show bgp summary");
        assert!(!records[0].success);
    }

    #[test]
    fn test_health() {
        let (glass, _) = glass(false);
        let health = glass.health();
        assert_eq!(health.status, "ok");
        assert_eq!(health.routers, 2);
        assert_eq!(health.algorithms, "legacyCompatible");
    }

    #[test]
    fn test_request_json() {
        let request: ExecutionRequest = serde_json::from_str(
            r#"{"query":"bgp","protocol":"IPv4","addr":"192.0.2.0/24","router":"r1","token":""}"#,
        )
        .unwrap();
        assert_eq!(request.address(), Some("192.0.2.0/24"));
        assert!(!request.has_token());
        assert_eq!(request.client, "");
    }
}

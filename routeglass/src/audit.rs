//! Audit trail of executed commands.
//!
//! Every execution that got as far as a translated command produces exactly
//! one [`AuditRecord`], whether it succeeded or not.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::Serialize;

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    /// Originating client (usually an IP address).
    pub client: String,
    pub device: String,
    pub command: String,
    pub success: bool,
}

impl AuditRecord {
    pub fn new(
        client: impl Into<String>,
        device: impl Into<String>,
        command: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            client: client.into(),
            device: device.into(),
            command: command.into(),
            success,
        }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - IP: {} - Router: {} - Command: {} - Success: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.client,
            self.device,
            self.command,
            self.success
        )
    }
}

/// Destination for audit records.
///
/// Shared by concurrent executions; implementations serialize writes
/// themselves.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Writes records to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!("{}", record);
    }
}

/// Appends one line per record to a file, and logs it.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditLog {
    /// Open (or create) the file for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, record: &AuditRecord) {
        info!("{}", record);

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{}", record) {
            warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps records in memory. Useful in tests and for embedding callers.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: &AuditRecord) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
    }
}

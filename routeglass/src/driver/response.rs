//! Result type for buffered execution.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::transport::ExitStatus;

/// Outcome of a buffered execution that produced a usable answer.
///
/// Hard failures are returned as errors instead; a result always has
/// `success == true`. `timed_out`, `exit_status`, and `warning` say how
/// complete the output is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,

    /// Display name of the device, filled in by the service layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,

    /// The command as translated (without paging suffix).
    pub command: String,

    /// Filtered output.
    pub output: String,

    /// RFC 3339 completion time.
    pub timestamp: String,

    /// The deadline expired; `output` is what arrived before it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<ExitStatus>,

    /// Set when the output is returned despite a timeout or failure status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Bytes received before filtering.
    #[serde(skip)]
    pub raw_len: usize,

    #[serde(skip)]
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub(crate) fn new(command: impl Into<String>, output: String, raw_len: usize) -> Self {
        Self {
            success: true,
            router: None,
            command: command.into(),
            output,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            timed_out: false,
            exit_status: None,
            warning: None,
            raw_len,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the output is known to be complete.
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.exit_status.as_ref().is_some_and(ExitStatus::success)
    }

    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }
}

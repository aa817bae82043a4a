//! Query model and command translation.
//!
//! A [`Query`] names what the operator wants to know; the
//! [`CommandTranslator`] turns it into the exact [`Command`] a device of a
//! given dialect understands.

mod query;
mod target;
mod translator;

pub use query::{AddressFamily, QueryKind};
pub use target::Target;
pub use translator::CommandTranslator;

use std::fmt;

use crate::error::QueryError;

/// A diagnostic query as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: QueryKind,
    pub family: AddressFamily,
    pub address: Option<String>,
}

impl Query {
    pub fn new(kind: QueryKind, family: AddressFamily) -> Self {
        Self {
            kind,
            family,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// The address, treating an empty string as absent.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref().filter(|a| !a.trim().is_empty())
    }
}

/// One command line to submit to a device.
///
/// Never empty and never contains line breaks or other control characters,
/// so it is always exactly one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    probe: bool,
    paging_suffix: Option<String>,
}

impl Command {
    /// Create a command from raw text.
    ///
    /// Whether the command is a reachability probe is inferred from its
    /// first word (`ping`, `traceroute`, `tracert`).
    pub fn new(text: impl Into<String>) -> Result<Self, QueryError> {
        let text = text.into();
        Self::validate(&text)?;
        let probe = text
            .split_whitespace()
            .next()
            .is_some_and(|verb| verb == "ping" || verb.starts_with("trace"));
        Ok(Self {
            text,
            probe,
            paging_suffix: None,
        })
    }

    pub(crate) fn translated(
        text: String,
        probe: bool,
        paging_suffix: Option<String>,
    ) -> Result<Self, QueryError> {
        Self::validate(&text)?;
        Ok(Self {
            text,
            probe,
            paging_suffix,
        })
    }

    fn validate(text: &str) -> Result<(), QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::InvalidCommand("command is empty".into()));
        }
        if text.chars().any(char::is_control) {
            return Err(QueryError::InvalidCommand(
                "command contains control characters".into(),
            ));
        }
        Ok(())
    }

    /// Set the paging-disable suffix used by buffered execution.
    pub fn with_paging_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.paging_suffix = Some(suffix.into());
        self
    }

    /// The command text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether this is a ping or traceroute.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// The paging-disable suffix for this command's dialect, if known.
    pub fn paging_suffix(&self) -> Option<&str> {
        self.paging_suffix.as_deref()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

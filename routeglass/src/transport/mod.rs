//! SSH transport layer wrapping russh.
//!
//! A [`Transport`] turns a [`ConnectionDescriptor`] and a command line into a
//! started [`RemoteCommand`]. [`SshConnector`] is the production
//! implementation; anything that can produce a `RemoteCommand` (see
//! [`RemoteCommand::channel`]) can stand in for it.

pub mod algorithms;
mod config;
mod remote;
mod ssh;

pub use config::{HostKeyVerification, HostKeyVerifier, SecurityLevel, SshOptions};
pub use remote::{
    Control, ExitStatus, ExitWaiter, OutputStream, ProcessControl, RemoteCommand, RemoteHandle,
};
pub use ssh::{SshConnector, SshSession};

use std::future::Future;

use crate::error::TransportError;
use crate::inventory::ConnectionDescriptor;

/// Opens a session to a device and starts one command on it.
pub trait Transport: Send + Sync + 'static {
    /// Connect, authenticate, and start `command`.
    ///
    /// Resolves once the device has confirmed the command started. The
    /// session lives until every part of the returned [`RemoteCommand`] is
    /// dropped.
    fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        command: &str,
    ) -> impl Future<Output = Result<RemoteCommand, TransportError>> + Send;
}

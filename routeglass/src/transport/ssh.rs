//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{HashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect, Sig};
use secrecy::ExposeSecret;

use super::Transport;
use super::config::{HostKeyVerification, SshOptions};
use super::remote::{Control, ExitStatus, RemoteCommand, RemoteHandle};
use crate::error::TransportError;
use crate::inventory::ConnectionDescriptor;

/// Opens SSH sessions with a fixed set of [`SshOptions`].
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }

    /// Connect to the device and authenticate.
    ///
    /// Handshake and authentication together are bounded by the
    /// descriptor's connect timeout.
    pub async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<SshSession, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: self.options.inactivity_timeout,
            preferred: self.options.security.preferred(),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: descriptor.host.clone(),
            port: descriptor.port,
            host_key_verification: self.options.host_key_verification.clone(),
            known_hosts_path: self.options.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!(
            "Connecting to {}@{}:{} ({})",
            descriptor.username,
            descriptor.host,
            descriptor.port,
            self.options.security.as_str()
        );

        let connect = async {
            let mut handle = client::connect(
                ssh_config,
                (descriptor.host.as_str(), descriptor.port),
                handler,
            )
            .await
            .map_err(|e| {
                // If check_server_key stored a detailed error, use that instead
                // of the generic russh::Error::UnknownKey
                take_host_key_error(&host_key_error).unwrap_or(TransportError::ConnectionFailed {
                    host: descriptor.host.clone(),
                    port: descriptor.port,
                    source: e,
                })
            })?;

            Self::authenticate(&mut handle, descriptor).await?;
            Ok::<_, TransportError>(handle)
        };

        let handle = tokio::time::timeout(descriptor.timeout, connect)
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                host: descriptor.host.clone(),
                port: descriptor.port,
                timeout: descriptor.timeout,
            })??;

        debug!("Connected to {}:{}", descriptor.host, descriptor.port);

        Ok(SshSession {
            handle,
            host: descriptor.host.clone(),
            port: descriptor.port,
            start_timeout: descriptor.timeout,
        })
    }

    async fn authenticate(
        handle: &mut Handle<SshHandler>,
        descriptor: &ConnectionDescriptor,
    ) -> Result<(), TransportError> {
        let connection_failed = |e| TransportError::ConnectionFailed {
            host: descriptor.host.clone(),
            port: descriptor.port,
            source: e,
        };

        let success = handle
            .authenticate_password(
                descriptor.username.as_str(),
                descriptor.password.expose_secret(),
            )
            .await
            .map_err(connection_failed)?
            .success();

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: descriptor.username.clone(),
            });
        }

        Ok(())
    }
}

impl Transport for SshConnector {
    async fn run(
        &self,
        descriptor: &ConnectionDescriptor,
        command: &str,
    ) -> Result<RemoteCommand, TransportError> {
        let session = self.open(descriptor).await?;
        session.run(command).await
    }
}

/// An authenticated SSH connection, ready to run one command.
pub struct SshSession {
    handle: Handle<SshHandler>,
    host: String,
    port: u16,
    start_timeout: Duration,
}

impl SshSession {
    /// Start `command` on an exec channel.
    ///
    /// Returns once the device has confirmed the command started. The
    /// session is consumed: it is released when the returned
    /// [`RemoteCommand`] is dropped, or immediately if starting fails.
    pub async fn run(self, command: &str) -> Result<RemoteCommand, TransportError> {
        let opened = self.handle.channel_open_session().await;
        let mut channel = match opened {
            Ok(channel) => channel,
            Err(e) => {
                self.close().await;
                return Err(TransportError::SessionFailed(e));
            }
        };

        if let Err(e) = channel.exec(true, command).await {
            self.close().await;
            return Err(TransportError::PipeFailed(e));
        }

        let early = match tokio::time::timeout(self.start_timeout, await_start(&mut channel)).await
        {
            Ok(Ok(early)) => early,
            Ok(Err(e)) => {
                self.close().await;
                return Err(e);
            }
            Err(_) => {
                let start_timeout = self.start_timeout;
                self.close().await;
                return Err(TransportError::StartFailed {
                    reason: format!("no reply to exec request after {:?}", start_timeout),
                });
            }
        };

        debug!("Started on {}:{}: {}", self.host, self.port, command);

        let (remote, io) = RemoteCommand::channel();
        tokio::spawn(pump(channel, self, early, io));
        Ok(remote)
    }

    /// Disconnect, logging rather than returning failures.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("Disconnect from {}:{} failed: {}", self.host, self.port, e);
        }
    }
}

/// Wait for the reply to the exec request.
///
/// Messages that race ahead of the reply are returned so they can be
/// delivered in order.
async fn await_start(channel: &mut Channel<Msg>) -> Result<Vec<ChannelMsg>, TransportError> {
    let mut early = Vec::new();
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(early),
            Some(ChannelMsg::Failure) => {
                return Err(TransportError::StartFailed {
                    reason: "exec request refused by device".into(),
                });
            }
            Some(msg) => early.push(msg),
            None => {
                return Err(TransportError::StartFailed {
                    reason: "channel closed before the command started".into(),
                });
            }
        }
    }
}

/// Output side of a running command.
struct Pipes {
    stdout: Option<tokio::sync::mpsc::UnboundedSender<Bytes>>,
    stderr: Option<tokio::sync::mpsc::UnboundedSender<Bytes>>,
    exit: Option<tokio::sync::oneshot::Sender<ExitStatus>>,
}

impl Pipes {
    /// Route one channel message. Returns `false` once the channel is done.
    fn dispatch(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => {
                if let Some(tx) = &self.stdout {
                    let _ = tx.send(Bytes::copy_from_slice(&data));
                }
            }
            ChannelMsg::ExtendedData { data, ext: 1 } => {
                if let Some(tx) = &self.stderr {
                    let _ = tx.send(Bytes::copy_from_slice(&data));
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                self.report_exit(ExitStatus::Code(exit_status));
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                self.report_exit(ExitStatus::Signal(signal_label(&signal_name)));
            }
            ChannelMsg::Eof => {
                self.stdout = None;
                self.stderr = None;
            }
            ChannelMsg::Close => return false,
            other => trace!("Ignoring channel message: {:?}", other),
        }
        true
    }

    fn report_exit(&mut self, status: ExitStatus) {
        match self.exit.take() {
            Some(tx) => {
                debug!("Remote command finished: {}", status);
                let _ = tx.send(status);
            }
            None => warn!("Ignoring duplicate exit report: {}", status),
        }
    }
}

/// Moves channel traffic into the [`RemoteCommand`] streams until the
/// channel closes or the command handle is dropped, then releases the
/// session.
async fn pump(
    mut channel: Channel<Msg>,
    session: SshSession,
    early: Vec<ChannelMsg>,
    io: RemoteHandle,
) {
    let RemoteHandle {
        stdout,
        stderr,
        exit,
        mut control,
    } = io;
    let mut pipes = Pipes {
        stdout: Some(stdout),
        stderr: Some(stderr),
        exit: Some(exit),
    };

    let mut open = early.into_iter().all(|msg| pipes.dispatch(msg));

    while open {
        tokio::select! {
            ctl = control.recv() => match ctl {
                Some(Control::Terminate) => {
                    debug!("Sending SIGTERM on {}:{}", session.host, session.port);
                    if let Err(e) = channel.signal(Sig::TERM).await {
                        debug!("Signal failed: {}", e);
                    }
                }
                None => {
                    trace!("Command handle dropped");
                    open = false;
                }
            },
            msg = channel.wait() => match msg {
                Some(msg) => open = pipes.dispatch(msg),
                None => open = false,
            },
        }
    }

    drop(pipes);
    if let Err(e) = channel.close().await {
        trace!("Channel close failed: {}", e);
    }
    session.close().await;
}

fn signal_label(signal: &Sig) -> String {
    match signal {
        Sig::ABRT => "ABRT".into(),
        Sig::ALRM => "ALRM".into(),
        Sig::FPE => "FPE".into(),
        Sig::HUP => "HUP".into(),
        Sig::ILL => "ILL".into(),
        Sig::INT => "INT".into(),
        Sig::KILL => "KILL".into(),
        Sig::PIPE => "PIPE".into(),
        Sig::QUIT => "QUIT".into(),
        Sig::SEGV => "SEGV".into(),
        Sig::TERM => "TERM".into(),
        Sig::USR1 => "USR1".into(),
        Sig::Custom(name) => name.clone(),
    }
}

fn take_host_key_error(slot: &Mutex<Option<TransportError>>) -> Option<TransportError> {
    slot.lock().ok().and_then(|mut guard| guard.take())
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so open() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        debug!("Rejecting host key for {}:{}: {}", self.host, self.port, error);
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }

    fn rejected_fingerprint(&self, pubkey: &PublicKey) -> TransportError {
        TransportError::HostKeyRejected {
            host: self.host.clone(),
            port: self.port,
            fingerprint: pubkey.fingerprint(HashAlg::Sha256).to_string(),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = match &self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    // Unknown host, learn the key
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Pinned(fingerprints) => {
                let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
                if fingerprints.iter().any(|f| f.trim() == fingerprint) {
                    true
                } else {
                    let error = self.rejected_fingerprint(server_public_key);
                    self.reject(error)
                }
            }

            HostKeyVerification::Custom(verifier) => {
                if verifier.verify(&self.host, self.port, server_public_key) {
                    true
                } else {
                    let error = self.rejected_fingerprint(server_public_key);
                    self.reject(error)
                }
            }
        };
        Ok(accepted)
    }
}

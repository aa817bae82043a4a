//! Handle to a command running on a remote device.
//!
//! A [`RemoteCommand`] is transport-agnostic: the SSH session feeds it from
//! its channel task, and tests feed it through the [`RemoteHandle`] half
//! returned by [`RemoteCommand::channel`].

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// How a remote process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExitStatus {
    /// Exited with a status code.
    Code(u32),
    /// Killed by a signal.
    Signal(String),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit status {code}"),
            ExitStatus::Signal(signal) => write!(f, "killed by signal {signal}"),
        }
    }
}

/// Requests sent from the caller to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Ask the process to terminate (SIGTERM).
    Terminate,
}

/// One of the command's output streams.
///
/// Yields chunks as the device sends them and ends when the stream is
/// closed by the remote side or the session ends.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl OutputStream {
    /// Receive the next chunk, or `None` once the stream is closed.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Stream for OutputStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

/// Resolves once with the process exit status.
#[derive(Debug)]
pub struct ExitWaiter {
    rx: oneshot::Receiver<ExitStatus>,
}

impl ExitWaiter {
    /// Wait for the process to exit.
    ///
    /// Returns `None` if the session ended without reporting a status.
    pub async fn wait(self) -> Option<ExitStatus> {
        self.rx.await.ok()
    }
}

/// Sends control requests to the running process.
#[derive(Debug, Clone)]
pub struct ProcessControl {
    tx: mpsc::Sender<Control>,
}

impl ProcessControl {
    /// Request termination without waiting for it to take effect.
    ///
    /// Returns `false` if the session is already gone.
    pub fn terminate(&self) -> bool {
        self.tx.try_send(Control::Terminate).is_ok()
    }

    /// Whether the session side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A started remote command: two byte streams, an exit signal, and a
/// control handle.
///
/// Dropping every part releases the underlying session.
#[derive(Debug)]
pub struct RemoteCommand {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub exit: ExitWaiter,
    pub control: ProcessControl,
}

/// The producing half of a [`RemoteCommand`].
#[derive(Debug)]
pub struct RemoteHandle {
    pub stdout: mpsc::UnboundedSender<Bytes>,
    pub stderr: mpsc::UnboundedSender<Bytes>,
    pub exit: oneshot::Sender<ExitStatus>,
    pub control: mpsc::Receiver<Control>,
}

impl RemoteCommand {
    /// Create a connected command/handle pair.
    pub fn channel() -> (RemoteCommand, RemoteHandle) {
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (control_tx, control_rx) = mpsc::channel(4);

        let command = RemoteCommand {
            stdout: OutputStream { rx: stdout_rx },
            stderr: OutputStream { rx: stderr_rx },
            exit: ExitWaiter { rx: exit_rx },
            control: ProcessControl { tx: control_tx },
        };
        let handle = RemoteHandle {
            stdout: stdout_tx,
            stderr: stderr_tx,
            exit: exit_tx,
            control: control_rx,
        };
        (command, handle)
    }
}

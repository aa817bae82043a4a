//! One-shot execution: collect everything, filter once, return.

use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::{debug, info, warn};
use tokio::time::{sleep_until, timeout_at};

use super::response::ExecutionResult;
use crate::channel::OutputFilter;
use crate::command::Command;
use crate::error::{Error, ExecutionError, TransportError};
use crate::inventory::ConnectionDescriptor;
use crate::transport::{ExitStatus, RemoteCommand, Transport};

/// Default deadline for a buffered execution.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a command to completion and returns its filtered output.
///
/// Standard output and standard error are collected into one buffer in
/// arrival order. Partial output is preferred over failure: if the deadline
/// expires or the command exits with a failure status after producing
/// output, that output is returned with a warning. Only a failure with zero
/// captured bytes is an error.
#[derive(Debug)]
pub struct BufferedExecutor<T> {
    transport: Arc<T>,
    timeout: Duration,
}

impl<T> Clone for BufferedExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport> BufferedExecutor<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The line actually sent: the command plus its paging suffix, unless
    /// it is a probe.
    pub fn command_line(command: &Command) -> String {
        match command.paging_suffix() {
            Some(suffix) if !command.is_probe() => format!("{}{}", command.as_str(), suffix),
            _ => command.as_str().to_string(),
        }
    }

    /// Run `command` on the device and wait for it to finish.
    pub async fn execute(
        &self,
        descriptor: &ConnectionDescriptor,
        command: &Command,
        filter: &OutputFilter,
    ) -> Result<ExecutionResult, Error> {
        let line = Self::command_line(command);
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        info!("Executing on {}: {}", descriptor.socket_addr(), line);

        let remote = timeout_at(deadline, self.transport.run(descriptor, &line))
            .await
            .map_err(|_| ExecutionError::Timeout(self.timeout))??;

        let collected = collect(remote, deadline).await;
        let raw_len = collected.output.len();

        let mut result = ExecutionResult::new(
            command.as_str(),
            filter.filter_text(&collected.output),
            raw_len,
        );
        result.elapsed = started.elapsed();
        result.exit_status = collected.status.clone();

        if collected.timed_out {
            if raw_len == 0 {
                warn!("Command timed out with no output after {:?}", self.timeout);
                return Err(ExecutionError::Timeout(self.timeout).into());
            }
            warn!(
                "Command timed out after {:?}, returning {} bytes of partial output",
                self.timeout, raw_len
            );
            result.timed_out = true;
            result.warning = Some(format!(
                "command timed out after {}s; output may be incomplete",
                self.timeout.as_secs()
            ));
            return Ok(result);
        }

        match collected.status {
            Some(status) if !status.success() => {
                if raw_len == 0 {
                    return Err(ExecutionError::CommandFailed { status }.into());
                }
                debug!("Returning partial output despite {}", status);
                result.warning = Some(format!("command finished with {}", status));
            }
            Some(_) => {}
            None => {
                if raw_len == 0 {
                    return Err(TransportError::Disconnected.into());
                }
                result.warning = Some("session closed without an exit status".to_string());
            }
        }

        info!(
            "Command completed, {} bytes output in {:?}",
            raw_len, result.elapsed
        );
        Ok(result)
    }
}

struct Collected {
    output: BytesMut,
    status: Option<ExitStatus>,
    timed_out: bool,
}

/// Read both streams and the exit status until all three are done or the
/// deadline passes. On timeout the process is asked to terminate.
async fn collect(remote: RemoteCommand, deadline: tokio::time::Instant) -> Collected {
    let RemoteCommand {
        mut stdout,
        mut stderr,
        exit,
        control,
    } = remote;

    let mut output = BytesMut::new();
    let mut status = None;
    let mut exit = pin!(exit.wait());
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut exited = false;
    let mut expired = pin!(sleep_until(deadline));

    let timed_out = loop {
        if !stdout_open && !stderr_open && exited {
            break false;
        }
        tokio::select! {
            _ = &mut expired => break true,
            chunk = stdout.next_chunk(), if stdout_open => match chunk {
                Some(chunk) => output.extend_from_slice(&chunk),
                None => stdout_open = false,
            },
            chunk = stderr.next_chunk(), if stderr_open => match chunk {
                Some(chunk) => output.extend_from_slice(&chunk),
                None => stderr_open = false,
            },
            reported = &mut exit, if !exited => {
                status = reported;
                exited = true;
            }
        }
    };

    if timed_out {
        control.terminate();
    }

    Collected {
        output,
        status,
        timed_out,
    }
}

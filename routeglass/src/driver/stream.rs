//! Streaming execution: filtered lines are forwarded as they arrive.
//!
//! Two reader tasks (stdout, stderr) split their stream into lines, filter
//! each line, and pass survivors to the executor over one channel. The
//! executor is the only writer to the sink, so events never interleave
//! mid-line. Lines from one stream keep their order; the relative order of
//! stdout and stderr lines is whatever order they were read in.
//!
//! The execution is complete when both readers have finished (the line
//! channel closes only after both have dropped their senders) *and* the
//! process has reported its exit, or the session has ended without one.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout_at};

use super::event::ExecutionEvent;
use super::sink::EventSink;
use crate::channel::{LineSplitter, OutputFilter};
use crate::command::Command;
use crate::error::ExecutionError;
use crate::inventory::ConnectionDescriptor;
use crate::transport::{ExitStatus, OutputStream, RemoteCommand, Transport};

/// Default deadline for a streaming execution.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Lines buffered between the readers and the sink.
const LINE_BUFFER: usize = 256;

/// How a streaming execution ended.
///
/// The sink has already been told; this is for the caller's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `Complete` was delivered.
    Completed {
        exit_status: Option<ExitStatus>,
        lines: usize,
    },
    /// An `Error` was delivered (connection failure or timeout).
    Failed(String),
    /// The sink stopped accepting events.
    SinkClosed,
}

impl StreamOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StreamOutcome::Completed { .. })
    }
}

/// Runs a command and forwards its output line by line.
#[derive(Debug)]
pub struct StreamingExecutor<T> {
    transport: Arc<T>,
    timeout: Duration,
}

impl<T> Clone for StreamingExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport> StreamingExecutor<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` and send its events to `sink`.
    ///
    /// The sink receives `Start` only once the device has confirmed the
    /// command started, then `Data` per filtered line, then exactly one
    /// terminal event. Nothing here waits past the deadline: on expiry an
    /// `Error` is emitted, the process is sent a termination request, and
    /// the readers are abandoned.
    ///
    /// The deadline also bounds every `emit`. A sink that is ready at the
    /// deadline still receives the terminal event, but one that is blocked
    /// (a full bounded channel, a stalled writer) does not, and the
    /// sequence ends without one. The returned [`StreamOutcome`] is
    /// authoritative in that case.
    pub async fn execute<S: EventSink>(
        &self,
        descriptor: &ConnectionDescriptor,
        command: &Command,
        filter: &OutputFilter,
        mut sink: S,
    ) -> StreamOutcome {
        let deadline = Instant::now() + self.timeout;
        let timeout_message = || ExecutionError::Timeout(self.timeout).to_string();

        info!(
            "Streaming on {}: {}",
            descriptor.socket_addr(),
            command.as_str()
        );

        let remote = match timeout_at(deadline, self.transport.run(descriptor, command.as_str()))
            .await
        {
            Ok(Ok(remote)) => remote,
            Ok(Err(e)) => {
                warn!("Streaming execution failed to start: {}", e);
                return fail(&mut sink, deadline, e.to_string()).await;
            }
            Err(_) => return fail(&mut sink, deadline, timeout_message()).await,
        };

        let RemoteCommand {
            stdout,
            stderr,
            exit,
            control,
        } = remote;

        let start = ExecutionEvent::Start {
            command: command.as_str().to_string(),
        };
        if !deliver(&mut sink, deadline, start).await {
            control.terminate();
            return StreamOutcome::SinkClosed;
        }

        let (line_tx, mut line_rx) = mpsc::channel(LINE_BUFFER);
        let readers = [
            spawn_reader("stdout", stdout, filter.clone(), line_tx.clone()),
            spawn_reader("stderr", stderr, filter.clone(), line_tx),
        ];

        let mut exit = pin!(exit.wait());
        let mut expired = pin!(sleep_until(deadline));
        let mut readers_done = false;
        let mut exited = false;
        let mut exit_status = None;
        let mut lines = 0usize;

        enum Stop {
            Finished,
            Deadline,
            SinkClosed,
        }

        let stop = loop {
            if readers_done && exited {
                break Stop::Finished;
            }
            tokio::select! {
                _ = &mut expired => break Stop::Deadline,
                line = line_rx.recv(), if !readers_done => match line {
                    Some(data) => {
                        match timeout_at(deadline, sink.emit(ExecutionEvent::Data { data })).await {
                            Ok(Ok(())) => lines += 1,
                            Ok(Err(_)) => break Stop::SinkClosed,
                            Err(_) => break Stop::Deadline,
                        }
                    }
                    None => {
                        trace!("Both output streams closed");
                        readers_done = true;
                    }
                },
                reported = &mut exit, if !exited => {
                    debug!("Process exit observed: {:?}", reported);
                    exit_status = reported;
                    exited = true;
                }
            }
        };

        match stop {
            Stop::Finished => {
                info!("Streaming command completed, {} lines", lines);
                let complete = ExecutionEvent::Complete {
                    exit_status: exit_status.clone(),
                };
                if deliver(&mut sink, deadline, complete).await {
                    StreamOutcome::Completed { exit_status, lines }
                } else {
                    StreamOutcome::SinkClosed
                }
            }
            Stop::Deadline => {
                warn!("Streaming command timed out after {:?}", self.timeout);
                abandon(&readers);
                control.terminate();
                fail(&mut sink, deadline, timeout_message()).await
            }
            Stop::SinkClosed => {
                debug!("Event sink closed, terminating remote command");
                abandon(&readers);
                control.terminate();
                StreamOutcome::SinkClosed
            }
        }
    }
}

/// Send one event unless the deadline has passed first.
///
/// An event that can be delivered without waiting is still delivered at the
/// deadline, so the terminal event after a timeout gets through.
async fn deliver<S: EventSink>(sink: &mut S, deadline: Instant, event: ExecutionEvent) -> bool {
    matches!(timeout_at(deadline, sink.emit(event)).await, Ok(Ok(())))
}

/// Send the terminal `Error`.
///
/// A sink that is still applying backpressure at the deadline misses the
/// event; the execution is reported as failed all the same.
async fn fail<S: EventSink>(sink: &mut S, deadline: Instant, error: String) -> StreamOutcome {
    let event = ExecutionEvent::Error {
        error: error.clone(),
    };
    match timeout_at(deadline, sink.emit(event)).await {
        Ok(Ok(())) => StreamOutcome::Failed(error),
        Ok(Err(_)) => StreamOutcome::SinkClosed,
        Err(_) => {
            warn!("Event sink not ready at deadline, dropping error event: {}", error);
            StreamOutcome::Failed(error)
        }
    }
}

fn abandon(readers: &[JoinHandle<()>]) {
    for reader in readers {
        reader.abort();
    }
}

fn spawn_reader(
    name: &'static str,
    mut stream: OutputStream,
    filter: OutputFilter,
    lines: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut splitter = LineSplitter::new();
        let mut forwarded = 0usize;

        while let Some(chunk) = stream.next_chunk().await {
            for line in splitter.push(&chunk) {
                if let Some(clean) = filter.filter_line(&line) {
                    if lines.send(clean).await.is_err() {
                        return;
                    }
                    forwarded += 1;
                }
            }
        }

        if let Some(rest) = splitter.finish() {
            if let Some(clean) = filter.filter_line(&rest) {
                if lines.send(clean).await.is_err() {
                    return;
                }
                forwarded += 1;
            }
        }

        trace!("{} closed after {} lines", name, forwarded);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NoisePattern;
    use crate::error::TransportError;
    use crate::transport::{Control, RemoteHandle};
    use std::sync::Mutex;

    struct ScriptedTransport {
        script: Box<dyn Fn(RemoteHandle) + Send + Sync>,
    }

    impl ScriptedTransport {
        fn new(script: impl Fn(RemoteHandle) + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                script: Box::new(script),
            })
        }
    }

    impl Transport for ScriptedTransport {
        async fn run(
            &self,
            _descriptor: &ConnectionDescriptor,
            _command: &str,
        ) -> Result<RemoteCommand, TransportError> {
            let (remote, handle) = RemoteCommand::channel();
            (self.script)(handle);
            Ok(remote)
        }
    }

    struct Refused;

    impl Transport for Refused {
        async fn run(
            &self,
            _descriptor: &ConnectionDescriptor,
            _command: &str,
        ) -> Result<RemoteCommand, TransportError> {
            Err(TransportError::StartFailed {
                reason: "exec request refused by device".into(),
            })
        }
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::new("192.0.2.1", "lg", "pw")
    }

    fn ping() -> Command {
        Command::new("ping 192.0.2.1").unwrap()
    }

    fn data(events: &[ExecutionEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::Data { data } => Some(data.as_str()),
                _ => None,
            })
            .collect()
    }

    fn assert_well_formed(events: &[ExecutionEvent]) {
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1, "{events:?}");
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let transport = ScriptedTransport::new(|h| {
            h.stdout.send("PING 192.0.2.1: 56 data bytes\r\n".into()).unwrap();
            h.stdout.send("64 bytes from 192.0.2.1: icmp_seq=0\r".into()).unwrap();
            h.stdout.send("\n\r\n--- ping statistics ---".into()).unwrap();
            h.stderr.send("\x1b[31mwarning\x1b[0m\n".into()).unwrap();
            h.exit.send(ExitStatus::Code(0)).unwrap();
        });
        let mut events = Vec::new();
        let outcome = StreamingExecutor::new(transport)
            .execute(&descriptor(), &ping(), &OutputFilter::default(), &mut events)
            .await;

        assert_eq!(
            events[0],
            ExecutionEvent::Start {
                command: "ping 192.0.2.1".into()
            }
        );
        assert_well_formed(&events);
        assert_eq!(
            events.last(),
            Some(&ExecutionEvent::Complete {
                exit_status: Some(ExitStatus::Code(0))
            })
        );

        let stdout: Vec<_> = data(&events)
            .into_iter()
            .filter(|l| *l != "warning")
            .collect();
        assert_eq!(
            stdout,
            [
                "PING 192.0.2.1: 56 data bytes",
                "64 bytes from 192.0.2.1: icmp_seq=0",
                "--- ping statistics ---",
            ]
        );
        assert!(data(&events).contains(&"warning"));
        assert_eq!(
            outcome,
            StreamOutcome::Completed {
                exit_status: Some(ExitStatus::Code(0)),
                lines: 4
            }
        );
    }

    #[tokio::test]
    async fn test_noise_is_dropped_per_line() {
        let transport = ScriptedTransport::new(|h| {
            h.stdout
                .send("Info: user logged in through SSH\n192.0.2.1   65001   Active\n".into())
                .unwrap();
            h.exit.send(ExitStatus::Code(0)).unwrap();
        });
        let filter = OutputFilter::new(&[NoisePattern::contains("through SSH")]).unwrap();
        let mut events = Vec::new();
        StreamingExecutor::new(transport)
            .execute(&descriptor(), &ping(), &filter, &mut events)
            .await;
        assert_eq!(data(&events), ["192.0.2.1   65001   Active"]);
    }

    #[tokio::test]
    async fn test_waits_for_both_streams_after_exit() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Mutex::new(Some(release_rx));
        let transport = ScriptedTransport::new(move |h| {
            let RemoteHandle {
                stdout,
                stderr,
                exit,
                control,
            } = h;
            exit.send(ExitStatus::Code(0)).unwrap();
            drop(stderr);
            let release = release_rx.lock().unwrap().take();
            tokio::spawn(async move {
                let _control = control;
                if let Some(release) = release {
                    let _ = release.await;
                }
                stdout.send("late line\n".into()).unwrap();
            });
        });

        let executor = StreamingExecutor::new(transport);
        let task = tokio::spawn(async move {
            let mut events = Vec::new();
            executor
                .execute(&descriptor(), &ping(), &OutputFilter::default(), &mut events)
                .await;
            events
        });

        tokio::task::yield_now().await;
        release_tx.send(()).unwrap();
        let events = task.await.unwrap();

        assert_well_formed(&events);
        assert_eq!(data(&events), ["late line"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let (terminated_tx, terminated_rx) = tokio::sync::oneshot::channel();
        let terminated_tx = Mutex::new(Some(terminated_tx));
        let transport = ScriptedTransport::new(move |mut h| {
            h.stdout.send("1  192.0.2.254  1.2 ms\n".into()).unwrap();
            let tx = terminated_tx.lock().unwrap().take();
            tokio::spawn(async move {
                let control = h.control.recv().await;
                if let Some(tx) = tx {
                    let _ = tx.send(control);
                }
                drop(h);
            });
        });

        let start = Instant::now();
        let mut events = Vec::new();
        let outcome = StreamingExecutor::new(transport)
            .with_timeout(Duration::from_secs(30))
            .execute(&descriptor(), &ping(), &OutputFilter::default(), &mut events)
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_well_formed(&events);
        assert_eq!(data(&events), ["1  192.0.2.254  1.2 ms"]);
        assert_eq!(
            events.last(),
            Some(&ExecutionEvent::Error {
                error: "Command timeout after 30s".into()
            })
        );
        assert!(matches!(outcome, StreamOutcome::Failed(_)));
        assert_eq!(terminated_rx.await.unwrap(), Some(Control::Terminate));
    }

    #[tokio::test]
    async fn test_start_failure_emits_only_error() {
        let mut events = Vec::new();
        let outcome = StreamingExecutor::new(Arc::new(Refused))
            .execute(&descriptor(), &ping(), &OutputFilter::default(), &mut events)
            .await;
        assert_eq!(
            events,
            [ExecutionEvent::Error {
                error: "Command start failed: exec request refused by device".into()
            }]
        );
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_closed_sink_terminates_command() {
        let (terminated_tx, terminated_rx) = tokio::sync::oneshot::channel();
        let terminated_tx = Mutex::new(Some(terminated_tx));
        let transport = ScriptedTransport::new(move |mut h| {
            let tx = terminated_tx.lock().unwrap().take();
            tokio::spawn(async move {
                for i in 0..1000 {
                    if h.stdout.send(format!("line {i}\n").into()).is_err() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                let control = h.control.recv().await;
                if let Some(tx) = tx {
                    let _ = tx.send(control);
                }
            });
        });

        let (sink, mut rx) = mpsc::channel::<ExecutionEvent>(4);
        let consumer = tokio::spawn(async move {
            // Take a couple of events, then hang up.
            let first = rx.recv().await;
            let _ = rx.recv().await;
            drop(rx);
            first
        });

        let outcome = StreamingExecutor::new(transport)
            .execute(&descriptor(), &ping(), &OutputFilter::default(), sink)
            .await;

        assert_eq!(outcome, StreamOutcome::SinkClosed);
        assert!(matches!(
            consumer.await.unwrap(),
            Some(ExecutionEvent::Start { .. })
        ));
        assert_eq!(terminated_rx.await.unwrap(), Some(Control::Terminate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_sink_does_not_extend_deadline() {
        let transport = ScriptedTransport::new(|h| {
            h.stdout.send("1  192.0.2.254  1.2 ms\n".into()).unwrap();
            h.exit.send(ExitStatus::Code(0)).unwrap();
        });

        // Room for `Start` only; nobody reads.
        let (tx, mut rx) = mpsc::channel::<ExecutionEvent>(1);
        let start = Instant::now();
        let outcome = StreamingExecutor::new(transport)
            .with_timeout(Duration::from_secs(10))
            .execute(&descriptor(), &ping(), &OutputFilter::default(), tx)
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            outcome,
            StreamOutcome::Failed("Command timeout after 10s".into())
        );
        assert!(matches!(rx.recv().await, Some(ExecutionEvent::Start { .. })));
        assert_eq!(rx.recv().await, None);
    }
}

//! Destinations for streaming execution events.

use std::future::Future;

use log::debug;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::event::ExecutionEvent;

/// The consumer of an event stream has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Receives [`ExecutionEvent`]s as a streaming execution produces them.
///
/// `emit` may apply backpressure, but not past the execution deadline: a
/// sink still blocked when the deadline expires never sees the terminal
/// `Error`. Sinks that must always observe a terminal event should accept
/// events without waiting (an unbounded channel or a `Vec`).
pub trait EventSink: Send {
    /// Deliver one event.
    ///
    /// An error means nobody is listening any more; the executor stops the
    /// remote command.
    fn emit(&mut self, event: ExecutionEvent) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

impl<S: EventSink> EventSink for &mut S {
    fn emit(&mut self, event: ExecutionEvent) -> impl Future<Output = Result<(), SinkClosed>> + Send {
        (**self).emit(event)
    }
}

impl EventSink for mpsc::Sender<ExecutionEvent> {
    async fn emit(&mut self, event: ExecutionEvent) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }
}

impl EventSink for mpsc::UnboundedSender<ExecutionEvent> {
    async fn emit(&mut self, event: ExecutionEvent) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

impl EventSink for Vec<ExecutionEvent> {
    async fn emit(&mut self, event: ExecutionEvent) -> Result<(), SinkClosed> {
        self.push(event);
        Ok(())
    }
}

/// Writes each event as one line of JSON and flushes after every event.
///
/// This is the line-delimited format HTTP front ends forward to browsers.
#[derive(Debug)]
pub struct JsonLines<W> {
    writer: W,
}

impl<W> JsonLines<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> EventSink for JsonLines<W> {
    async fn emit(&mut self, event: ExecutionEvent) -> Result<(), SinkClosed> {
        let mut line = serde_json::to_vec(&event).map_err(|e| {
            debug!("Failed to encode event: {}", e);
            SinkClosed
        })?;
        line.push(b'\n');

        let written = async {
            self.writer.write_all(&line).await?;
            self.writer.flush().await
        };
        written.await.map_err(|e| {
            debug!("Event writer failed: {}", e);
            SinkClosed
        })
    }
}

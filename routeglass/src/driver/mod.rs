//! Command execution.
//!
//! Two executors share one [`Transport`](crate::transport::Transport):
//!
//! - [`BufferedExecutor`] collects all output, filters it once, and returns
//!   an [`ExecutionResult`].
//! - [`StreamingExecutor`] filters line by line and forwards
//!   [`ExecutionEvent`]s to an [`EventSink`] as output arrives.

mod buffered;
mod event;
mod response;
mod sink;
mod stream;

pub use buffered::{BufferedExecutor, DEFAULT_COMMAND_TIMEOUT};
pub use event::ExecutionEvent;
pub use response::ExecutionResult;
pub use sink::{EventSink, JsonLines, SinkClosed};
pub use stream::{DEFAULT_STREAM_TIMEOUT, StreamOutcome, StreamingExecutor};

//! # Routeglass
//!
//! Looking-glass command engine for network routers.
//!
//! Routeglass turns a small vocabulary of diagnostic queries (BGP route
//! lookup, ping, traceroute, neighbor summaries) into the CLI commands of a
//! router's operating system, runs them over SSH, and hands back output with
//! the device's banner and prompt noise removed.
//!
//! ## Features
//!
//! - Async SSH exec sessions via russh, including legacy key exchange and
//!   ciphers for old router firmware
//! - Injection-safe translation: targets must parse as IP literals
//! - Buffered execution with partial output on timeout
//! - Streaming execution emitting `start`/`data`/`error`/`complete` events
//! - Per-device noise filtering and an append-only audit log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use routeglass::{Config, ExecutionRequest, LookingGlass};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), routeglass::Error> {
//!     let glass = LookingGlass::from_config(Config::from_path("config.json")?)?;
//!
//!     let request = ExecutionRequest::new("ping", "IPv4", "r1")
//!         .with_address("192.0.2.1")
//!         .with_client("198.51.100.7");
//!
//!     let result = glass.execute_buffered(&request).await?;
//!     println!("{}", result.output);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod channel;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod platform;
pub mod service;
pub mod transport;

// Re-export main types for convenience
pub use command::{AddressFamily, Command, CommandTranslator, Query, QueryKind};
pub use config::Config;
pub use driver::{
    BufferedExecutor, EventSink, ExecutionEvent, ExecutionResult, StreamOutcome,
    StreamingExecutor,
};
pub use error::{Error, Result};
pub use inventory::{ConnectionDescriptor, DeviceProfile, Inventory};
pub use service::{ExecutionRequest, LookingGlass};
pub use transport::{SecurityLevel, SshConnector, SshOptions, Transport};

//! Dialect definitions for multi-vendor support.
//!
//! A dialect is the CLI syntax family a device speaks. Dialects differ only
//! in command syntax (verb, flag placement, IPv6 marker position); what each
//! query means is the same everywhere.

mod definition;
mod registry;
pub mod vendors;

pub use definition::{DialectDefinition, TARGET_PLACEHOLDER};
pub use registry::DialectRegistry;

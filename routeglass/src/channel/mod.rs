//! Channel layer for output cleaning.
//!
//! This module turns raw bytes read from a remote command into clean lines:
//! line-break normalisation, ANSI stripping, and device noise filtering.

mod filter;
mod lines;

pub use filter::{NoisePattern, OutputFilter, strip_ansi};
pub use lines::LineSplitter;
